//! Signal detection over an extracted snapshot.
//!
//! Detectors are side-effect free: they read the snapshot's file tree and
//! return signals, never touching storage. One operation per signal category.

pub mod pattern;
pub mod rules;
pub mod walker;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::errors::AttestorError;
use crate::models::{AnalysisDepth, CodeSignal};

pub use pattern::PatternDetector;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 32;

pub fn default_exclude_dirs() -> Vec<String> {
    [
        ".git", "node_modules", "target", "vendor", "dist", "build", "__pycache__", ".venv", "venv",
        ".tox", ".pytest_cache", ".next", "coverage",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// What the detectors are allowed to read.
#[derive(Debug, Clone)]
pub struct ScanScope {
    pub depth: AnalysisDepth,
    pub max_file_size: u64,
    pub max_depth: usize,
    /// Directory names (glob patterns) that are never descended into.
    pub exclude_dirs: Vec<String>,
}

impl ScanScope {
    pub fn new(depth: AnalysisDepth) -> Self {
        Self {
            depth,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            exclude_dirs: default_exclude_dirs(),
        }
    }
}

impl Default for ScanScope {
    fn default() -> Self {
        Self::new(AnalysisDepth::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    pub signals: Vec<CodeSignal>,
    pub files_scanned: u64,
    pub files_skipped: u64,
}

impl DetectionReport {
    pub fn merge(&mut self, other: DetectionReport) {
        self.signals.extend(other.signals);
        self.files_scanned = self.files_scanned.max(other.files_scanned);
        self.files_skipped = self.files_skipped.max(other.files_skipped);
    }
}

/// File tree statistics gathered by the Overview phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotOverview {
    pub total_files: u64,
    pub total_bytes: u64,
    pub files_by_language: BTreeMap<String, u64>,
}

#[async_trait]
pub trait SignalDetector: Send + Sync {
    async fn survey(
        &self,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<SnapshotOverview, AttestorError>;

    async fn detect_cicd(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError>;

    /// Severity-graded exposure warnings. Matched values are never returned.
    async fn scan_secrets(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError>;

    async fn detect_auth(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError>;

    async fn detect_access_control(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError>;

    async fn detect_encryption(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError>;

    async fn detect_logging(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError>;
}
