use serde::{Deserialize, Serialize};

use super::finding::Confidence;

/// Category a signal belongs to; one detector operation per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Auth,
    Encryption,
    Logging,
    AccessControl,
    Cicd,
    Secrets,
}

impl SignalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Encryption => "encryption",
            Self::Logging => "logging",
            Self::AccessControl => "access_control",
            Self::Cicd => "cicd",
            Self::Secrets => "secrets",
        }
    }
}

impl std::fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a signal is evidence for or against a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPattern {
    PasswordHashing,
    MultiFactor,
    TokenAuth,
    OAuth,
    SessionManagement,
    WeakPasswordHash,
    PlaintextPasswordCompare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMechanism {
    RoleCheck,
    PolicyEngine,
    AuthorizationMiddleware,
    PermissiveCors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionUsage {
    StrongCipher,
    Tls,
    KeyManagement,
    WeakAlgorithm,
    TlsVerificationDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingPractice {
    StructuredLogging,
    AuditTrail,
    Monitoring,
    SensitiveDataLogged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiProvider {
    GithubActions,
    GitlabCi,
    CircleCi,
    Jenkins,
    AzurePipelines,
    Bitbucket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiPractice {
    PipelineDefined,
    AutomatedTests,
    SecurityScanning,
    DependencyAutomation,
}

/// Severity of a secrets-exposure warning. These are warnings, not verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Category-specific payload of a detected signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum SignalKind {
    Auth { pattern: AuthPattern },
    Encryption { usage: EncryptionUsage },
    Logging { practice: LoggingPractice },
    AccessControl { mechanism: AccessMechanism },
    Cicd { provider: CiProvider, practice: CiPractice },
    SecretsWarning { severity: SecretSeverity, rule: String },
}

impl SignalKind {
    pub fn category(&self) -> SignalCategory {
        match self {
            Self::Auth { .. } => SignalCategory::Auth,
            Self::Encryption { .. } => SignalCategory::Encryption,
            Self::Logging { .. } => SignalCategory::Logging,
            Self::AccessControl { .. } => SignalCategory::AccessControl,
            Self::Cicd { .. } => SignalCategory::Cicd,
            Self::SecretsWarning { .. } => SignalCategory::Secrets,
        }
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            Self::Auth {
                pattern: AuthPattern::WeakPasswordHash | AuthPattern::PlaintextPasswordCompare,
            }
            | Self::Encryption {
                usage: EncryptionUsage::WeakAlgorithm | EncryptionUsage::TlsVerificationDisabled,
            }
            | Self::Logging {
                practice: LoggingPractice::SensitiveDataLogged,
            }
            | Self::AccessControl {
                mechanism: AccessMechanism::PermissiveCors,
            }
            | Self::SecretsWarning { .. } => Polarity::Negative,
            _ => Polarity::Positive,
        }
    }

    /// Short human label used in finding summaries.
    pub fn label(&self) -> String {
        match self {
            Self::Auth { pattern } => format!("auth:{}", enum_label(pattern)),
            Self::Encryption { usage } => format!("encryption:{}", enum_label(usage)),
            Self::Logging { practice } => format!("logging:{}", enum_label(practice)),
            Self::AccessControl { mechanism } => format!("access_control:{}", enum_label(mechanism)),
            Self::Cicd { provider, practice } => {
                format!("cicd:{}:{}", enum_label(provider), enum_label(practice))
            }
            Self::SecretsWarning { severity, rule } => {
                format!("secrets:{}:{}", enum_label(severity), rule)
            }
        }
    }
}

fn enum_label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// One detected pattern. Not persisted; lives in the run's analysis context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSignal {
    #[serde(flatten)]
    pub kind: SignalKind,
    /// Path relative to the snapshot root.
    pub file: String,
    pub line: Option<u32>,
    pub confidence: Confidence,
}

impl CodeSignal {
    pub fn category(&self) -> SignalCategory {
        self.kind.category()
    }

    pub fn polarity(&self) -> Polarity {
        self.kind.polarity()
    }

    pub fn evidence_ref(&self) -> String {
        match self.line {
            Some(line) => format!("{}:{}", self.file, line),
            None => self.file.clone(),
        }
    }
}
