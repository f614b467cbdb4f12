//! Signal-to-control mapping.
//!
//! Turns the signals collected for a snapshot into one verdict per control
//! of a framework's catalog. Pure and deterministic: the same signals always
//! produce the same findings in the same order.

pub mod catalog;

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    CodeSignal, Confidence, ControlFinding, FindingStatus, Framework, Polarity, SecretSeverity, SignalCategory,
    SignalKind,
};
use catalog::{controls_for, ControlBasis, ControlDefinition};

pub const MAX_EVIDENCE: usize = 25;

/// Everything the detectors collected for one run.
#[derive(Debug, Clone, Default)]
pub struct SignalSet {
    pub signals: Vec<CodeSignal>,
    pub files_scanned: u64,
}

pub trait ControlMapper: Send + Sync {
    fn map_signals_to_controls(&self, signals: &SignalSet, framework: Framework) -> Vec<ControlFinding>;
}

/// Maps signals against the built-in framework catalogs.
#[derive(Debug, Clone, Default)]
pub struct CatalogMapper;

impl CatalogMapper {
    pub fn new() -> Self {
        Self
    }
}

impl ControlMapper for CatalogMapper {
    fn map_signals_to_controls(&self, signals: &SignalSet, framework: Framework) -> Vec<ControlFinding> {
        controls_for(framework)
            .iter()
            .map(|control| evaluate(control, framework, signals))
            .collect()
    }
}

struct Verdict<'a> {
    status: FindingStatus,
    confidence: Confidence,
    summary: String,
    justifying: Vec<&'a CodeSignal>,
}

fn evaluate(control: &ControlDefinition, framework: Framework, set: &SignalSet) -> ControlFinding {
    let verdict = match control.basis {
        ControlBasis::ManualReview => Verdict {
            status: FindingStatus::NeedsHuman,
            confidence: Confidence::Low,
            summary: format!("{} requires manual review; code cannot evidence it", control.title),
            justifying: Vec::new(),
        },
        ControlBasis::Signals(_) if set.files_scanned == 0 => Verdict {
            status: FindingStatus::NotObserved,
            confidence: Confidence::Low,
            summary: format!("No files were analyzed for {}", control.title),
            justifying: Vec::new(),
        },
        ControlBasis::Signals(SignalCategory::Secrets) => secrets_verdict(control, set),
        ControlBasis::Signals(category) => category_verdict(control, category, set),
    };

    let evidence: Vec<String> = verdict
        .justifying
        .iter()
        .map(|s| s.evidence_ref())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(MAX_EVIDENCE)
        .collect();

    ControlFinding {
        control_id: control.id.to_string(),
        framework,
        status: verdict.status,
        confidence: verdict.confidence,
        signal_type: control.basis.signal_type().to_string(),
        summary: verdict.summary,
        detail: describe(control, &verdict.justifying),
        evidence,
        recommendation: control.recommendation.to_string(),
    }
}

fn secrets_verdict<'a>(control: &ControlDefinition, set: &'a SignalSet) -> Verdict<'a> {
    let warnings: Vec<&CodeSignal> = set
        .signals
        .iter()
        .filter(|s| s.category() == SignalCategory::Secrets)
        .collect();
    let severe: Vec<&CodeSignal> = warnings
        .iter()
        .copied()
        .filter(|s| {
            matches!(
                s.kind,
                SignalKind::SecretsWarning { severity: SecretSeverity::Critical | SecretSeverity::High, .. }
            )
        })
        .collect();

    if !severe.is_empty() {
        Verdict {
            status: FindingStatus::Fail,
            confidence: Confidence::High,
            summary: format!("{}: {} critical or high severity secret exposure(s)", control.title, severe.len()),
            justifying: severe,
        }
    } else if !warnings.is_empty() {
        Verdict {
            status: FindingStatus::Partial,
            confidence: Confidence::Medium,
            summary: format!("{}: {} lower severity secret warning(s)", control.title, warnings.len()),
            justifying: warnings,
        }
    } else {
        Verdict {
            status: FindingStatus::Pass,
            confidence: Confidence::Medium,
            summary: format!("{}: no secret exposure detected", control.title),
            justifying: Vec::new(),
        }
    }
}

fn category_verdict<'a>(control: &ControlDefinition, category: SignalCategory, set: &'a SignalSet) -> Verdict<'a> {
    let (negatives, positives): (Vec<&CodeSignal>, Vec<&CodeSignal>) = set
        .signals
        .iter()
        .filter(|s| s.category() == category)
        .partition(|s| s.polarity() == Polarity::Negative);

    match (negatives.is_empty(), positives.is_empty()) {
        (false, true) => Verdict {
            status: FindingStatus::Fail,
            confidence: Confidence::High,
            summary: format!("{}: {} weak or unsafe pattern(s) and no compensating control", control.title, negatives.len()),
            justifying: negatives,
        },
        (false, false) => Verdict {
            status: FindingStatus::Partial,
            confidence: Confidence::Medium,
            summary: format!(
                "{}: controls present but {} weak or unsafe pattern(s) remain",
                control.title,
                negatives.len()
            ),
            justifying: negatives.into_iter().chain(positives).collect(),
        },
        (true, false) => {
            let files: BTreeSet<&str> = positives.iter().map(|s| s.file.as_str()).collect();
            let confidence = if files.len() >= 2 { Confidence::High } else { Confidence::Medium };
            Verdict {
                status: FindingStatus::Pass,
                confidence,
                summary: format!("{}: implemented in {} file(s)", control.title, files.len()),
                justifying: positives,
            }
        }
        (true, true) => Verdict {
            status: FindingStatus::NotObserved,
            confidence: Confidence::Low,
            summary: format!("{}: no {} signals found", control.title, category),
            justifying: Vec::new(),
        },
    }
}

fn describe(control: &ControlDefinition, signals: &[&CodeSignal]) -> String {
    if signals.is_empty() {
        return format!("{} ({}). No supporting signals.", control.title, control.id);
    }
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for signal in signals {
        *counts.entry(signal.kind.label()).or_insert(0) += 1;
    }
    let parts: Vec<String> = counts
        .into_iter()
        .map(|(label, n)| format!("{} ({})", label, n))
        .collect();
    format!("{} ({}). Signals: {}.", control.title, control.id, parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessMechanism, AuthPattern, EncryptionUsage};

    fn signal(kind: SignalKind, file: &str, line: u32) -> CodeSignal {
        CodeSignal { kind, file: file.to_string(), line: Some(line), confidence: Confidence::High }
    }

    fn set(signals: Vec<CodeSignal>) -> SignalSet {
        SignalSet { signals, files_scanned: 10 }
    }

    fn finding<'a>(findings: &'a [ControlFinding], id: &str) -> &'a ControlFinding {
        findings.iter().find(|f| f.control_id == id).unwrap()
    }

    #[test]
    fn test_one_finding_per_catalog_control_in_order() {
        let mapper = CatalogMapper::new();
        for framework in Framework::ALL {
            let findings = mapper.map_signals_to_controls(&set(vec![]), framework);
            let ids: Vec<_> = findings.iter().map(|f| f.control_id.as_str()).collect();
            let expected: Vec<_> = controls_for(framework).iter().map(|c| c.id).collect();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn test_critical_secret_fails_with_high_confidence() {
        let signals = set(vec![signal(
            SignalKind::SecretsWarning { severity: SecretSeverity::Critical, rule: "aws-access-key".into() },
            "config/prod.py",
            3,
        )]);
        let findings = CatalogMapper::new().map_signals_to_controls(&signals, Framework::Soc2);
        let cc66 = finding(&findings, "CC6.6");
        assert_eq!(cc66.status, FindingStatus::Fail);
        assert_eq!(cc66.confidence, Confidence::High);
        assert_eq!(cc66.evidence, vec!["config/prod.py:3"]);
        assert_eq!(cc66.signal_type, "secrets");
    }

    #[test]
    fn test_medium_secret_is_partial() {
        let signals = set(vec![signal(
            SignalKind::SecretsWarning { severity: SecretSeverity::Medium, rule: "committed-env-file".into() },
            ".env",
            1,
        )]);
        let findings = CatalogMapper::new().map_signals_to_controls(&signals, Framework::Gdpr);
        assert_eq!(finding(&findings, "Art.5(1)(f)").status, FindingStatus::Partial);
    }

    #[test]
    fn test_no_secrets_passes() {
        let findings = CatalogMapper::new().map_signals_to_controls(&set(vec![]), Framework::Hipaa);
        let control = finding(&findings, "164.308(a)(5)(ii)(D)");
        assert_eq!(control.status, FindingStatus::Pass);
        assert_eq!(control.confidence, Confidence::Medium);
    }

    #[test]
    fn test_positive_signals_in_two_files_pass_high() {
        let signals = set(vec![
            signal(SignalKind::Auth { pattern: AuthPattern::PasswordHashing }, "src/a.rs", 1),
            signal(SignalKind::Auth { pattern: AuthPattern::MultiFactor }, "src/b.rs", 9),
        ]);
        let findings = CatalogMapper::new().map_signals_to_controls(&signals, Framework::Soc2);
        let cc62 = finding(&findings, "CC6.2");
        assert_eq!(cc62.status, FindingStatus::Pass);
        assert_eq!(cc62.confidence, Confidence::High);
        assert_eq!(cc62.evidence, vec!["src/a.rs:1", "src/b.rs:9"]);
    }

    #[test]
    fn test_positive_signals_in_one_file_pass_medium() {
        let signals = set(vec![signal(
            SignalKind::AccessControl { mechanism: AccessMechanism::RoleCheck },
            "src/guard.rs",
            4,
        )]);
        let findings = CatalogMapper::new().map_signals_to_controls(&signals, Framework::Soc2);
        assert_eq!(finding(&findings, "CC6.1").confidence, Confidence::Medium);
    }

    #[test]
    fn test_mixed_signals_are_partial() {
        let signals = set(vec![
            signal(SignalKind::Encryption { usage: EncryptionUsage::Tls }, "src/server.rs", 2),
            signal(SignalKind::Encryption { usage: EncryptionUsage::TlsVerificationDisabled }, "src/client.rs", 7),
        ]);
        let findings = CatalogMapper::new().map_signals_to_controls(&signals, Framework::Soc2);
        let cc67 = finding(&findings, "CC6.7");
        assert_eq!(cc67.status, FindingStatus::Partial);
        assert_eq!(cc67.evidence.len(), 2);
    }

    #[test]
    fn test_negative_only_fails() {
        let signals = set(vec![signal(
            SignalKind::Auth { pattern: AuthPattern::WeakPasswordHash },
            "src/login.php",
            12,
        )]);
        let findings = CatalogMapper::new().map_signals_to_controls(&signals, Framework::Hipaa);
        let control = finding(&findings, "164.312(d)");
        assert_eq!(control.status, FindingStatus::Fail);
        assert_eq!(control.confidence, Confidence::High);
    }

    #[test]
    fn test_no_files_scanned_is_not_observed() {
        let empty = SignalSet { signals: vec![], files_scanned: 0 };
        let findings = CatalogMapper::new().map_signals_to_controls(&empty, Framework::Soc2);
        for f in &findings {
            if f.signal_type == "manual_review" {
                assert_eq!(f.status, FindingStatus::NeedsHuman);
            } else {
                assert_eq!(f.status, FindingStatus::NotObserved);
                assert_eq!(f.confidence, Confidence::Low);
            }
        }
    }

    #[test]
    fn test_evidence_capped_and_sorted() {
        let signals = set(
            (0..40)
                .map(|i| signal(SignalKind::Logging { practice: crate::models::LoggingPractice::AuditTrail }, "src/audit.rs", 40 - i))
                .collect(),
        );
        let findings = CatalogMapper::new().map_signals_to_controls(&signals, Framework::Soc2);
        let cc72 = finding(&findings, "CC7.2");
        assert_eq!(cc72.evidence.len(), MAX_EVIDENCE);
        let mut sorted = cc72.evidence.clone();
        sorted.sort();
        assert_eq!(cc72.evidence, sorted);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let signals = set(vec![
            signal(SignalKind::Auth { pattern: AuthPattern::OAuth }, "src/b.rs", 1),
            signal(SignalKind::Auth { pattern: AuthPattern::OAuth }, "src/a.rs", 1),
        ]);
        let mapper = CatalogMapper::new();
        assert_eq!(
            mapper.map_signals_to_controls(&signals, Framework::Iso27001),
            mapper.map_signals_to_controls(&signals, Framework::Iso27001)
        );
    }
}
