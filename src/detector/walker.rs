use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::ScanScope;
use crate::errors::AttestorError;

const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "o", "obj", "a", "lib", "jar", "war", "ear", "class", "zip", "tar",
    "gz", "bz2", "xz", "7z", "rar", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "jpg", "jpeg", "png",
    "gif", "bmp", "ico", "webp", "mp3", "mp4", "avi", "mov", "wmv", "flv", "mkv", "woff", "woff2", "ttf",
    "otf", "eot", "pyc", "wasm", "sqlite", "db",
];

const SECURITY_RELEVANT_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "mjs", "cjs", "ts", "jsx", "tsx", "go", "java", "kt", "scala", "rb", "php", "cs", "swift",
    "c", "cc", "cpp", "h", "hpp", "yml", "yaml", "json", "toml", "ini", "conf", "cfg", "properties", "xml",
    "tf", "hcl", "sh", "env", "pem", "key",
];

const SECURITY_RELEVANT_NAMES: &[&str] = &["Dockerfile", "Jenkinsfile", "Makefile", "Procfile", ".npmrc", ".pypirc"];

/// A file the walker handed out for scanning.
#[derive(Debug, Clone)]
pub struct ScanFile {
    pub path: PathBuf,
    /// Forward-slash path relative to the snapshot root.
    pub relative: String,
    pub size: u64,
}

#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub files: Vec<ScanFile>,
    pub skipped: u64,
}

pub fn ensure_root(root: &Path) -> Result<(), AttestorError> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(AttestorError::Detector(format!(
            "Snapshot root {} does not exist or is not a directory",
            root.display()
        )))
    }
}

pub fn cancelled() -> AttestorError {
    AttestorError::Cancelled("Analysis cancelled".to_string())
}

pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn is_excluded_dir(name: &str, patterns: &[glob::Pattern]) -> bool {
    patterns.iter().any(|p| p.matches(name))
}

pub fn is_likely_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return false;
        }
    }
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        let lower = name.to_lowercase();
        if lower.ends_with(".min.js") || lower.ends_with(".min.css") || lower.ends_with(".lock") {
            return false;
        }
    }
    true
}

/// Source, config, CI and infrastructure files.
pub fn is_security_relevant(relative: &str) -> bool {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    if SECURITY_RELEVANT_NAMES.contains(&name) || name.starts_with(".env") {
        return true;
    }
    if relative.starts_with(".github/") || relative.starts_with(".circleci/") {
        return true;
    }
    match name.rsplit_once('.') {
        Some((_, ext)) => SECURITY_RELEVANT_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Walk the snapshot and collect every file the scope allows reading.
/// Binary and oversized files count as skipped.
pub fn collect_files(
    root: &Path,
    scope: &ScanScope,
    cancel: &CancellationToken,
    relevant_only: bool,
) -> Result<WalkOutcome, AttestorError> {
    ensure_root(root)?;
    let patterns: Vec<glob::Pattern> = scope
        .exclude_dirs
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let mut outcome = WalkOutcome::default();
    let walker = WalkDir::new(root)
        .max_depth(scope.max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !e.file_name().to_str().is_some_and(|n| is_excluded_dir(n, &patterns))
        });

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                trace!(error = %e, "Skipping unreadable entry");
                outcome.skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = relative_path(root, path);
        if relevant_only && !is_security_relevant(&relative) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(_) => {
                outcome.skipped += 1;
                continue;
            }
        };
        if size > scope.max_file_size {
            trace!(file = %relative, size, "Skipping file - exceeds size limit");
            outcome.skipped += 1;
            continue;
        }
        if !is_likely_text_file(path) {
            trace!(file = %relative, "Skipping binary file");
            outcome.skipped += 1;
            continue;
        }

        outcome.files.push(ScanFile { path: path.to_path_buf(), relative, size });
    }

    debug!(
        root = %root.display(),
        files = outcome.files.len(),
        skipped = outcome.skipped,
        "Snapshot walk completed"
    );
    Ok(outcome)
}

/// Read a file as UTF-8. `None` for unreadable or non-text content.
pub fn read_text(file: &ScanFile) -> Option<String> {
    let bytes = std::fs::read(&file.path).ok()?;
    if bytes.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisDepth;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_missing_root_is_detector_error() {
        let err = collect_files(
            Path::new("/definitely/not/here"),
            &ScanScope::default(),
            &CancellationToken::new(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, AttestorError::Detector(_)));
    }

    #[test]
    fn test_excluded_dirs_and_binaries() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.rs", b"fn main() {}");
        write(dir.path(), "node_modules/pkg/index.js", b"module.exports = {}");
        write(dir.path(), "assets/logo.png", b"\x89PNG");

        let outcome =
            collect_files(dir.path(), &ScanScope::new(AnalysisDepth::Full), &CancellationToken::new(), false).unwrap();
        let names: Vec<_> = outcome.files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["src/main.rs"]);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_oversized_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.rs", &vec![b'a'; 2048]);
        let mut scope = ScanScope::new(AnalysisDepth::Full);
        scope.max_file_size = 1024;

        let outcome = collect_files(dir.path(), &scope, &CancellationToken::new(), false).unwrap();
        assert!(outcome.files.is_empty());
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_security_relevant_filter() {
        assert!(is_security_relevant("src/auth/login.ts"));
        assert!(is_security_relevant(".github/workflows/ci.yml"));
        assert!(is_security_relevant("deploy/Dockerfile"));
        assert!(is_security_relevant(".env.production"));
        assert!(!is_security_relevant("docs/README.md"));
        assert!(!is_security_relevant("LICENSE"));
    }

    #[test]
    fn test_cancelled_walk() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.rs", b"");
        let token = CancellationToken::new();
        token.cancel();
        let err = collect_files(dir.path(), &ScanScope::default(), &token, false).unwrap_err();
        assert!(matches!(err, AttestorError::Cancelled(_)));
    }

    #[test]
    fn test_read_text_rejects_binary_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "blob.txt", b"abc\0def");
        let file = ScanFile { path: dir.path().join("blob.txt"), relative: "blob.txt".into(), size: 7 };
        assert!(read_text(&file).is_none());
    }
}
