use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detector::{default_exclude_dirs, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILE_SIZE};
use crate::models::AnalysisDepth;
use crate::pipeline::PipelineSettings;

pub const DEFAULT_DATABASE_PATH: &str = "attestor.db";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_API_TOKEN_ENV: &str = "ATTESTOR_API_TOKEN";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AttestorConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub scanner: ScannerConfig,
    pub analysis: AnalysisConfig,
}

impl AttestorConfig {
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            phase_timeout: Duration::from_secs(self.pipeline.phase_timeout_secs),
            heartbeat_interval: Duration::from_secs(self.pipeline.heartbeat_interval_secs),
            max_file_size: self.scanner.max_file_size,
            max_depth: self.scanner.max_depth,
            exclude_dirs: self.scanner.exclude_dirs.clone(),
        }
    }

    pub fn stale_run_threshold(&self) -> Duration {
        Duration::from_secs(self.pipeline.stale_run_threshold_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.pipeline.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DATABASE_PATH.to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Environment variable holding the bearer token. Auth is off when unset.
    pub api_token_env: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_token_env: Some(DEFAULT_API_TOKEN_ENV.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub phase_timeout_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub stale_run_threshold_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            phase_timeout_secs: 600,
            heartbeat_interval_secs: 30,
            stale_run_threshold_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub max_file_size: u64,
    pub max_depth: usize,
    pub exclude_dirs: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            exclude_dirs: default_exclude_dirs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub default_frameworks: Vec<String>,
    pub default_depth: AnalysisDepth,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_frameworks: vec!["soc2".to_string()],
            default_depth: AnalysisDepth::default(),
        }
    }
}
