use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "database": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "minLength": 1 }
                }
            },
            "server": {
                "type": "object",
                "properties": {
                    "host": { "type": "string" },
                    "port": { "type": "integer", "minimum": 1, "maximum": 65535 },
                    "api_token_env": { "type": ["string", "null"] }
                }
            },
            "pipeline": {
                "type": "object",
                "properties": {
                    "phase_timeout_secs": { "type": "integer", "minimum": 1 },
                    "heartbeat_interval_secs": { "type": "integer", "minimum": 1 },
                    "stale_run_threshold_secs": { "type": "integer", "minimum": 1 },
                    "sweep_interval_secs": { "type": "integer", "minimum": 1 }
                }
            },
            "scanner": {
                "type": "object",
                "properties": {
                    "max_file_size": { "type": "integer", "minimum": 1 },
                    "max_depth": { "type": "integer", "minimum": 1 },
                    "exclude_dirs": { "type": "array", "items": { "type": "string" } }
                }
            },
            "analysis": {
                "type": "object",
                "properties": {
                    "default_frameworks": { "type": "array", "items": { "type": "string" } },
                    "default_depth": { "type": "string", "enum": ["structure_only", "security_relevant", "full"] }
                }
            }
        }
    })
});
