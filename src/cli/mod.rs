pub mod analyze;
pub mod commands;
pub mod findings;
pub mod serve;
pub mod status;
pub mod sweep;

pub use commands::{Cli, Commands};

use std::path::Path;

use tracing::debug;

use crate::config::{parse_config, AttestorConfig};
use crate::errors::AttestorError;

const DEFAULT_CONFIG_FILE: &str = "attestor.yaml";

/// Load the explicit config file, else `./attestor.yaml` if present, else defaults.
pub async fn load_config(path: Option<&str>) -> Result<AttestorConfig, AttestorError> {
    match path {
        Some(path) => parse_config(Path::new(path)).await,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => parse_config(Path::new(DEFAULT_CONFIG_FILE)).await,
        None => {
            debug!("No config file found, using defaults");
            Ok(AttestorConfig::default())
        }
    }
}

pub async fn handle_validate(args: commands::ValidateArgs) -> Result<(), AttestorError> {
    let config = parse_config(Path::new(&args.config)).await?;
    println!("Configuration is valid: {}", args.config);
    println!("  database:  {}", config.database.path);
    println!("  server:    {}:{}", config.server.host, config.server.port);
    println!(
        "  pipeline:  phase timeout {}s, heartbeat {}s, stale after {}s",
        config.pipeline.phase_timeout_secs,
        config.pipeline.heartbeat_interval_secs,
        config.pipeline.stale_run_threshold_secs
    );
    Ok(())
}
