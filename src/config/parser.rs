use std::path::Path;

use tracing::warn;

use super::schema::CONFIG_SCHEMA;
use super::security::validate_security_patterns;
use super::types::AttestorConfig;
use crate::errors::AttestorError;
use crate::models::Framework;

const MAX_CONFIG_SIZE: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<AttestorConfig, AttestorError> {
    if !path.exists() {
        return Err(AttestorError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_SIZE {
        return Err(AttestorError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

pub fn parse_config_str(content: &str) -> Result<AttestorConfig, AttestorError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    // An empty file is a valid, all-defaults config.
    let yaml = match yaml {
        serde_yaml::Value::Null => serde_yaml::Value::Mapping(Default::default()),
        other => other,
    };

    validate_security_patterns(&yaml)?;
    validate_schema(&yaml)?;

    let config: AttestorConfig = serde_yaml::from_value(yaml)?;
    validate_conflicts(&config)?;
    Ok(config)
}

/// Validate config against the JSON schema. Advisory: violations are logged.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), AttestorError> {
    let json_str = serde_json::to_string(yaml)
        .map_err(|e| AttestorError::Config(format!("Config conversion error: {}", e)))?;
    let json_value: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|e| AttestorError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| AttestorError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

/// Reject settings that parse but cannot work together.
fn validate_conflicts(config: &AttestorConfig) -> Result<(), AttestorError> {
    let pipeline = &config.pipeline;
    for (name, value) in [
        ("pipeline.phase_timeout_secs", pipeline.phase_timeout_secs),
        ("pipeline.heartbeat_interval_secs", pipeline.heartbeat_interval_secs),
        ("pipeline.stale_run_threshold_secs", pipeline.stale_run_threshold_secs),
        ("pipeline.sweep_interval_secs", pipeline.sweep_interval_secs),
    ] {
        if value == 0 {
            return Err(AttestorError::Config(format!("{} must be greater than zero", name)));
        }
    }

    if pipeline.heartbeat_interval_secs >= pipeline.stale_run_threshold_secs {
        return Err(AttestorError::Config(format!(
            "pipeline.heartbeat_interval_secs ({}) must be below pipeline.stale_run_threshold_secs ({}) or live runs get swept",
            pipeline.heartbeat_interval_secs, pipeline.stale_run_threshold_secs
        )));
    }

    if config.scanner.max_file_size == 0 {
        return Err(AttestorError::Config("scanner.max_file_size must be greater than zero".into()));
    }

    for name in &config.analysis.default_frameworks {
        if let Err(e) = name.parse::<Framework>() {
            return Err(AttestorError::Config(format!("analysis.default_frameworks: {}", e)));
        }
    }

    if config.server.api_token_env.is_none() {
        warn!("No API token variable configured; the HTTP API will accept unauthenticated requests");
    }

    Ok(())
}
