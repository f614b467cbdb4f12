use std::time::Duration;

use tracing::info;

use crate::api::auth::{ORGANIZATION_HEADER, USER_HEADER};
use crate::cli::commands::StatusArgs;
use crate::config::AttestorConfig;
use crate::errors::AttestorError;

pub async fn handle_status(args: StatusArgs, config: AttestorConfig) -> Result<(), AttestorError> {
    info!(run_id = %args.run_id, "Querying analysis status");

    let client = reqwest::Client::new();
    let url = format!("{}/api/analysis/{}", args.server.trim_end_matches('/'), args.run_id);
    let token = config
        .server
        .api_token_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .filter(|t| !t.is_empty());

    loop {
        let mut request = client
            .get(&url)
            .header(ORGANIZATION_HEADER, &args.org)
            .header(USER_HEADER, &args.user);
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await
            .map_err(|e| AttestorError::Internal(format!("Failed to query analysis: {}", e)))?;

        let http_status = resp.status();
        let body: serde_json::Value = resp.json().await
            .map_err(|e| AttestorError::Internal(format!("Invalid response: {}", e)))?;

        if http_status == reqwest::StatusCode::NOT_FOUND {
            return Err(AttestorError::not_found("Analysis run", &args.run_id));
        }
        if !http_status.is_success() {
            return Err(AttestorError::Internal(format!(
                "Server returned {}: {}",
                http_status,
                body["error"].as_str().unwrap_or("unknown error")
            )));
        }

        if args.json {
            println!("{}", serde_json::to_string_pretty(&body)?);
        } else {
            println!(
                "Status: {}  Phase: {}  Progress: {}%",
                body["phaseStatus"].as_str().unwrap_or("unknown"),
                body["phase"].as_str().unwrap_or("-"),
                body["progress"].as_u64().unwrap_or(0)
            );
            if let Some(error) = body["errorMessage"].as_str() {
                println!("Error: {}", error);
            }
        }

        let finished = body["completedAt"].is_string();
        if !args.follow || finished {
            break;
        }

        tokio::time::sleep(Duration::from_secs(args.interval.max(1))).await;
    }

    Ok(())
}
