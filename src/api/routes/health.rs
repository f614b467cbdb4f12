use axum::Json;
use serde_json::{json, Value};

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "attestor",
        "version": env!("CARGO_PKG_VERSION"),
        "gitHash": option_env!("GIT_HASH").unwrap_or("dev"),
        "builtAt": option_env!("BUILD_TIMESTAMP"),
    }))
}
