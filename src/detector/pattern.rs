use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use super::rules::{
    self, LineRule, ACCESS_CONTROL_RULES, AUTH_RULES, CI_PIPELINE_FILES, CI_PRACTICE_RULES, DEPENDENCY_BOT_FILES,
    ENCRYPTION_RULES, LOGGING_RULES, SECRET_RULES,
};
use super::walker::{self, cancelled, collect_files, ensure_root, read_text};
use super::{DetectionReport, ScanScope, SignalDetector, SnapshotOverview};
use crate::errors::AttestorError;
use crate::models::{CiPractice, CiProvider, CodeSignal, Confidence, SecretSeverity, SignalKind};

/// Signals per rule per file; beyond this a file adds no new evidence.
const MAX_HITS_PER_RULE: usize = 5;

const LANGUAGES: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("py", "python"),
    ("js", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("go", "go"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("scala", "scala"),
    ("rb", "ruby"),
    ("php", "php"),
    ("cs", "csharp"),
    ("swift", "swift"),
    ("c", "c"),
    ("h", "c"),
    ("cc", "cpp"),
    ("cpp", "cpp"),
    ("hpp", "cpp"),
    ("sh", "shell"),
    ("tf", "terraform"),
    ("hcl", "terraform"),
    ("yml", "yaml"),
    ("yaml", "yaml"),
    ("json", "json"),
    ("toml", "toml"),
    ("md", "markdown"),
];

fn language_of(relative: &str) -> &'static str {
    let ext = relative
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase());
    match ext {
        Some(ext) => LANGUAGES
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, lang)| *lang)
            .unwrap_or("other"),
        None => "other",
    }
}

fn glob_matches(pattern: &str, relative: &str) -> bool {
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    glob::Pattern::new(pattern)
        .map(|p| p.matches_with(relative, options))
        .unwrap_or(false)
}

fn ci_provider_for(relative: &str) -> Option<CiProvider> {
    CI_PIPELINE_FILES
        .iter()
        .find(|(pattern, _)| glob_matches(pattern, relative))
        .map(|(_, provider)| *provider)
}

/// Regex-driven detector over the snapshot's file tree.
#[derive(Debug, Clone, Default)]
pub struct PatternDetector;

impl PatternDetector {
    pub fn new() -> Self {
        Self
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, AttestorError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AttestorError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AttestorError::Internal(format!("Detector task failed: {}", e)))?
}

/// Run line rules over every readable file in scope.
fn scan_with_rules(
    root: &Path,
    scope: &ScanScope,
    cancel: &CancellationToken,
    rules: &[LineRule],
    path_rule: Option<fn(&str) -> Option<CodeSignal>>,
) -> Result<DetectionReport, AttestorError> {
    ensure_root(root)?;
    let mut report = DetectionReport::default();
    if !scope.depth.reads_contents() {
        return Ok(report);
    }

    let relevant_only = !matches!(scope.depth, crate::models::AnalysisDepth::Full);
    let walk = collect_files(root, scope, cancel, relevant_only)?;
    report.files_skipped = walk.skipped;

    for file in &walk.files {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        if let Some(signal) = path_rule.and_then(|rule| rule(&file.relative)) {
            report.signals.push(signal);
        }
        let Some(content) = read_text(file) else {
            report.files_skipped += 1;
            continue;
        };
        report.files_scanned += 1;

        for rule in rules {
            let hits = content
                .lines()
                .enumerate()
                .filter(|(_, line)| rule.regex.is_match(line))
                .take(MAX_HITS_PER_RULE);
            for (idx, _) in hits {
                report.signals.push(CodeSignal {
                    kind: rule.kind.clone(),
                    file: file.relative.clone(),
                    line: Some(idx as u32 + 1),
                    confidence: rule.confidence,
                });
            }
        }
    }
    Ok(report)
}

fn env_file_signal(relative: &str) -> Option<CodeSignal> {
    rules::is_committed_env_file(relative).then(|| CodeSignal {
        kind: SignalKind::SecretsWarning {
            severity: SecretSeverity::Medium,
            rule: rules::ENV_FILE_RULE.to_string(),
        },
        file: relative.to_string(),
        line: None,
        confidence: rules::secret_confidence(SecretSeverity::Medium),
    })
}

fn scan_cicd(root: &Path, scope: &ScanScope, cancel: &CancellationToken) -> Result<DetectionReport, AttestorError> {
    ensure_root(root)?;
    let mut report = DetectionReport::default();
    if !scope.depth.reads_contents() {
        return Ok(report);
    }

    let walk = collect_files(root, scope, cancel, true)?;
    report.files_skipped = walk.skipped;

    for file in &walk.files {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        if let Some((_, provider)) = DEPENDENCY_BOT_FILES.iter().find(|(p, _)| *p == file.relative) {
            report.signals.push(CodeSignal {
                kind: SignalKind::Cicd { provider: *provider, practice: CiPractice::DependencyAutomation },
                file: file.relative.clone(),
                line: None,
                confidence: Confidence::High,
            });
            continue;
        }
        let Some(provider) = ci_provider_for(&file.relative) else {
            continue;
        };

        report.signals.push(CodeSignal {
            kind: SignalKind::Cicd { provider, practice: CiPractice::PipelineDefined },
            file: file.relative.clone(),
            line: None,
            confidence: Confidence::High,
        });

        let Some(content) = read_text(file) else {
            report.files_skipped += 1;
            continue;
        };
        report.files_scanned += 1;

        for (practice, regex) in CI_PRACTICE_RULES.iter() {
            if let Some((idx, _)) = content.lines().enumerate().find(|(_, line)| regex.is_match(line)) {
                report.signals.push(CodeSignal {
                    kind: SignalKind::Cicd { provider, practice: *practice },
                    file: file.relative.clone(),
                    line: Some(idx as u32 + 1),
                    confidence: Confidence::Medium,
                });
            }
        }
    }
    Ok(report)
}

fn survey_tree(root: &Path, scope: &ScanScope, cancel: &CancellationToken) -> Result<SnapshotOverview, AttestorError> {
    ensure_root(root)?;
    let patterns: Vec<glob::Pattern> = scope
        .exclude_dirs
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let mut overview = SnapshotOverview::default();
    let mut by_language: BTreeMap<String, u64> = BTreeMap::new();
    let walker = WalkDir::new(root)
        .max_depth(scope.max_depth)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !e.file_name().to_str().is_some_and(|n| patterns.iter().any(|p| p.matches(n)))
        });

    for entry in walker.flatten() {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = walker::relative_path(root, entry.path());
        overview.total_files += 1;
        overview.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        *by_language.entry(language_of(&relative).to_string()).or_insert(0) += 1;
    }
    overview.files_by_language = by_language;
    Ok(overview)
}

impl PatternDetector {
    async fn detect_with(
        &self,
        category: &'static str,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
        rules: &'static [LineRule],
        path_rule: Option<fn(&str) -> Option<CodeSignal>>,
    ) -> Result<DetectionReport, AttestorError> {
        let root: PathBuf = root.to_path_buf();
        let scope = scope.clone();
        let cancel = cancel.clone();
        let report = run_blocking(move || scan_with_rules(&root, &scope, &cancel, rules, path_rule)).await?;
        debug!(
            snapshot_id = %snapshot_id,
            category,
            signals = report.signals.len(),
            files_scanned = report.files_scanned,
            files_skipped = report.files_skipped,
            "Detection finished"
        );
        Ok(report)
    }
}

#[async_trait]
impl SignalDetector for PatternDetector {
    async fn survey(
        &self,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<SnapshotOverview, AttestorError> {
        let root = root.to_path_buf();
        let scope = scope.clone();
        let cancel = cancel.clone();
        run_blocking(move || survey_tree(&root, &scope, &cancel)).await
    }

    async fn detect_cicd(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError> {
        let root = root.to_path_buf();
        let scope = scope.clone();
        let cancel = cancel.clone();
        let report = run_blocking(move || scan_cicd(&root, &scope, &cancel)).await?;
        debug!(snapshot_id = %snapshot_id, signals = report.signals.len(), "CI/CD detection finished");
        Ok(report)
    }

    async fn scan_secrets(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError> {
        self.detect_with("secrets", snapshot_id, root, scope, cancel, &SECRET_RULES, Some(env_file_signal))
            .await
    }

    async fn detect_auth(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError> {
        self.detect_with("auth", snapshot_id, root, scope, cancel, &AUTH_RULES, None).await
    }

    async fn detect_access_control(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError> {
        self.detect_with("access_control", snapshot_id, root, scope, cancel, &ACCESS_CONTROL_RULES, None)
            .await
    }

    async fn detect_encryption(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError> {
        self.detect_with("encryption", snapshot_id, root, scope, cancel, &ENCRYPTION_RULES, None).await
    }

    async fn detect_logging(
        &self,
        snapshot_id: &str,
        root: &Path,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> Result<DetectionReport, AttestorError> {
        self.detect_with("logging", snapshot_id, root, scope, cancel, &LOGGING_RULES, None).await
    }
}
