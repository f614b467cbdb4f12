use crate::errors::AttestorError;

/// Shell expansion has no business in any config value.
const SHELL_PATTERNS: &[&str] = &["$(", "${", "`"];

/// Rejected in `database.path` and `scanner.exclude_dirs` entries.
/// `file:` would switch SQLite into URI mode.
const PATH_PATTERNS: &[&str] = &["../", "..\\", "file:"];

/// Config keys whose values are filesystem paths or directory globs.
const PATH_KEYS: &[&str] = &["database.path", "scanner.exclude_dirs"];

pub fn validate_security_patterns(value: &serde_yaml::Value) -> Result<(), AttestorError> {
    let mut strings = Vec::new();
    collect_strings(value, String::new(), &mut strings);

    for (path, text) in strings {
        if text.contains('\0') {
            return Err(rejected("NUL byte", &path));
        }
        if let Some(pattern) = SHELL_PATTERNS.iter().find(|p| text.contains(*p)) {
            return Err(rejected(pattern, &path));
        }
        if is_path_key(&path) {
            let lower = text.to_lowercase();
            if let Some(pattern) = PATH_PATTERNS.iter().find(|p| lower.contains(*p)) {
                return Err(rejected(pattern, &path));
            }
        }
    }

    if let Some(name) = value
        .get("server")
        .and_then(|s| s.get("api_token_env"))
        .and_then(|v| v.as_str())
    {
        if !is_env_var_name(name) {
            return Err(AttestorError::Config(format!(
                "server.api_token_env must name an environment variable, got '{}'",
                name
            )));
        }
    }
    Ok(())
}

fn rejected(pattern: &str, path: &str) -> AttestorError {
    let path = if path.is_empty() { "root" } else { path };
    AttestorError::Config(format!("Dangerous pattern '{}' found at config path: {}", pattern, path))
}

/// Flatten every string leaf into `(dotted.path, value)`. Sequence items keep
/// their parent key so `scanner.exclude_dirs[2]` matches `scanner.exclude_dirs`.
fn collect_strings(value: &serde_yaml::Value, path: String, out: &mut Vec<(String, String)>) {
    match value {
        serde_yaml::Value::String(s) => out.push((path, s.clone())),
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key = k.as_str().unwrap_or("unknown");
                let child = if path.is_empty() { key.to_string() } else { format!("{}.{}", path, key) };
                collect_strings(v, child, out);
            }
        }
        serde_yaml::Value::Sequence(seq) => {
            for (i, v) in seq.iter().enumerate() {
                collect_strings(v, format!("{}[{}]", path, i), out);
            }
        }
        _ => {}
    }
}

fn is_path_key(path: &str) -> bool {
    let key = path.split('[').next().unwrap_or(path);
    PATH_KEYS.contains(&key)
}

fn is_env_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
