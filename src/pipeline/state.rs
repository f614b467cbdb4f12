use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::detector::{default_exclude_dirs, DetectionReport, ScanScope, SnapshotOverview, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILE_SIZE};
use crate::mapper::SignalSet;
use crate::models::{AnalysisDepth, CodeSignal, Framework, RunMetrics};

pub const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseName {
    Overview,
    BuildCicd,
    ConfigurationSecrets,
    AuthenticationAuthorization,
    DataHandling,
    OperationalControls,
    GapIdentification,
}

impl PhaseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::BuildCicd => "build-cicd",
            Self::ConfigurationSecrets => "configuration-secrets",
            Self::AuthenticationAuthorization => "authentication-authorization",
            Self::DataHandling => "data-handling",
            Self::OperationalControls => "operational-controls",
            Self::GapIdentification => "gap-identification",
        }
    }

    /// Name stored on the run and snapshot rows.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::BuildCicd => "Build/CI-CD",
            Self::ConfigurationSecrets => "Configuration & Secrets",
            Self::AuthenticationAuthorization => "Authentication & Authorization",
            Self::DataHandling => "Data Handling",
            Self::OperationalControls => "Operational Controls",
            Self::GapIdentification => "Gap Identification",
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs for phase execution and the file walker.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub phase_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub max_file_size: u64,
    pub max_depth: usize,
    pub exclude_dirs: Vec<String>,
}

impl PipelineSettings {
    pub fn scope(&self, depth: AnalysisDepth) -> ScanScope {
        ScanScope {
            depth,
            max_file_size: self.max_file_size,
            max_depth: self.max_depth,
            exclude_dirs: self.exclude_dirs.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            phase_timeout: DEFAULT_PHASE_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            exclude_dirs: default_exclude_dirs(),
        }
    }
}

/// Working state of one run. Owned by the task executing the run and lent
/// to each phase in turn; nothing else holds a reference to it.
#[derive(Debug)]
pub struct AnalysisContext {
    pub run_id: String,
    pub snapshot_id: String,
    pub organization_id: String,
    pub user_id: String,
    pub root: PathBuf,
    pub frameworks: Vec<Framework>,
    pub scope: ScanScope,
    pub overview: Option<SnapshotOverview>,
    pub signals: Vec<CodeSignal>,
    pub metrics: RunMetrics,
    pub cancel: CancellationToken,
}

impl AnalysisContext {
    /// Fold one detector report into the context. File counters keep the
    /// largest walk seen since every detector walks the same tree.
    pub fn absorb(&mut self, report: DetectionReport) {
        self.metrics.files_analyzed = self.metrics.files_analyzed.max(report.files_scanned);
        self.metrics.files_skipped = self.metrics.files_skipped.max(report.files_skipped);
        self.signals.extend(report.signals);
        self.metrics.signals_detected = self.signals.len() as u64;
    }

    pub fn signal_set(&self) -> SignalSet {
        SignalSet {
            signals: self.signals.clone(),
            files_scanned: self.metrics.files_analyzed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthPattern, Confidence, SignalKind};

    fn context() -> AnalysisContext {
        AnalysisContext {
            run_id: "r-1".into(),
            snapshot_id: "s-1".into(),
            organization_id: "org-1".into(),
            user_id: "u-1".into(),
            root: PathBuf::from("/tmp/snap"),
            frameworks: vec![Framework::Soc2],
            scope: ScanScope::default(),
            overview: None,
            signals: Vec::new(),
            metrics: RunMetrics::default(),
            cancel: CancellationToken::new(),
        }
    }

    fn report(files_scanned: u64, signals: usize) -> DetectionReport {
        DetectionReport {
            signals: (0..signals)
                .map(|i| CodeSignal {
                    kind: SignalKind::Auth { pattern: AuthPattern::PasswordHashing },
                    file: format!("src/auth_{}.rs", i),
                    line: Some(1),
                    confidence: Confidence::High,
                })
                .collect(),
            files_scanned,
            files_skipped: 1,
        }
    }

    #[test]
    fn test_absorb_accumulates_signals() {
        let mut ctx = context();
        ctx.absorb(report(10, 2));
        ctx.absorb(report(12, 1));
        assert_eq!(ctx.signals.len(), 3);
        assert_eq!(ctx.metrics.signals_detected, 3);
        assert_eq!(ctx.metrics.files_analyzed, 12);
        assert_eq!(ctx.metrics.files_skipped, 1);

        let set = ctx.signal_set();
        assert_eq!(set.files_scanned, 12);
        assert_eq!(set.signals.len(), 3);
    }

    #[test]
    fn test_phase_display_names() {
        assert_eq!(PhaseName::BuildCicd.display_name(), "Build/CI-CD");
        assert_eq!(PhaseName::AuthenticationAuthorization.to_string(), "authentication-authorization");
    }

    #[test]
    fn test_settings_scope() {
        let settings = PipelineSettings { max_file_size: 10, ..Default::default() };
        let scope = settings.scope(AnalysisDepth::Full);
        assert_eq!(scope.depth, AnalysisDepth::Full);
        assert_eq!(scope.max_file_size, 10);
    }
}
