use crate::models::{Framework, SignalCategory};

use ControlBasis::{ManualReview, Signals};
use SignalCategory::{AccessControl, Auth, Cicd, Encryption, Logging, Secrets};

/// What a control's verdict is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlBasis {
    Signals(SignalCategory),
    /// Policy or process controls that code cannot evidence.
    ManualReview,
}

impl ControlBasis {
    pub fn signal_type(&self) -> &'static str {
        match self {
            Self::Signals(category) => category.as_str(),
            Self::ManualReview => "manual_review",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ControlDefinition {
    pub id: &'static str,
    pub title: &'static str,
    pub basis: ControlBasis,
    pub recommendation: &'static str,
}

const fn control(
    id: &'static str,
    title: &'static str,
    basis: ControlBasis,
    recommendation: &'static str,
) -> ControlDefinition {
    ControlDefinition { id, title, basis, recommendation }
}

const ISO27001_CONTROLS: &[ControlDefinition] = &[
    control(
        "A.9.2.4",
        "Management of secret authentication information",
        Signals(Secrets),
        "Remove credentials from the repository, rotate any that were exposed and load secrets from a vault or environment at runtime.",
    ),
    control(
        "A.9.4.1",
        "Information access restriction",
        Signals(AccessControl),
        "Enforce authorization checks on every privileged route and restrict cross-origin access to known origins.",
    ),
    control(
        "A.9.4.2",
        "Secure log-on procedures",
        Signals(Auth),
        "Hash passwords with a slow adaptive function (argon2, bcrypt, scrypt) and offer multi-factor authentication.",
    ),
    control(
        "A.10.1.1",
        "Policy on the use of cryptographic controls",
        Signals(Encryption),
        "Use authenticated ciphers, keep TLS certificate verification enabled and manage keys through a KMS.",
    ),
    control(
        "A.12.4.1",
        "Event logging",
        Signals(Logging),
        "Emit structured logs and an audit trail for security-relevant events without recording credentials or personal data.",
    ),
    control(
        "A.12.1.2",
        "Change management",
        Signals(Cicd),
        "Define a CI pipeline so every change is built and tested before release.",
    ),
    control(
        "A.14.2.8",
        "System security testing",
        Signals(Cicd),
        "Add automated tests and security scanning (SAST, dependency audit) to the CI pipeline.",
    ),
    control(
        "A.18.1.4",
        "Privacy and protection of personally identifiable information",
        ManualReview,
        "Document which personal data the system processes and how it is protected.",
    ),
];

const SOC2_CONTROLS: &[ControlDefinition] = &[
    control(
        "CC6.1",
        "Logical access security software and infrastructure",
        Signals(AccessControl),
        "Centralize authorization in middleware or a policy engine and deny by default.",
    ),
    control(
        "CC6.2",
        "User registration and authentication",
        Signals(Auth),
        "Use adaptive password hashing and support multi-factor authentication for user accounts.",
    ),
    control(
        "CC6.6",
        "Protection of credentials against external threats",
        Signals(Secrets),
        "Move hardcoded credentials to a secrets manager and add secret scanning to CI.",
    ),
    control(
        "CC6.7",
        "Protection of data in transmission",
        Signals(Encryption),
        "Terminate all external traffic with TLS and never disable certificate verification.",
    ),
    control(
        "CC7.2",
        "System monitoring for anomalies",
        Signals(Logging),
        "Ship structured logs and metrics to a monitoring system and alert on security events.",
    ),
    control(
        "CC8.1",
        "Change management",
        Signals(Cicd),
        "Run automated tests and security checks on every change through a CI pipeline.",
    ),
    control(
        "CC1.4",
        "Commitment to competence",
        ManualReview,
        "Provide evidence of security training for engineering staff.",
    ),
];

const HIPAA_CONTROLS: &[ControlDefinition] = &[
    control(
        "164.312(a)(1)",
        "Access control",
        Signals(AccessControl),
        "Restrict access to ePHI through role or policy based authorization on every endpoint.",
    ),
    control(
        "164.312(a)(2)(iv)",
        "Encryption and decryption",
        Signals(Encryption),
        "Encrypt ePHI at rest with an authenticated cipher and keys held in a KMS.",
    ),
    control(
        "164.312(b)",
        "Audit controls",
        Signals(Logging),
        "Record an audit trail of access to ePHI and keep sensitive values out of logs.",
    ),
    control(
        "164.312(d)",
        "Person or entity authentication",
        Signals(Auth),
        "Verify user identity with strong password hashing and multi-factor authentication.",
    ),
    control(
        "164.312(e)(1)",
        "Transmission security",
        Signals(Encryption),
        "Protect ePHI in transit with TLS and keep certificate verification enabled.",
    ),
    control(
        "164.308(a)(5)(ii)(D)",
        "Password management",
        Signals(Secrets),
        "Never commit passwords or keys; rotate exposed credentials immediately.",
    ),
    control(
        "164.308(a)(1)(ii)(A)",
        "Risk analysis",
        ManualReview,
        "Perform and document a risk analysis covering systems that handle ePHI.",
    ),
];

const GDPR_CONTROLS: &[ControlDefinition] = &[
    control(
        "Art.5(1)(f)",
        "Integrity and confidentiality",
        Signals(Secrets),
        "Keep credentials that guard personal data out of source control.",
    ),
    control(
        "Art.25",
        "Data protection by design and by default",
        Signals(Auth),
        "Build strong authentication into every path that reaches personal data.",
    ),
    control(
        "Art.30",
        "Records of processing activities",
        Signals(Logging),
        "Maintain an audit trail of processing and avoid logging personal data.",
    ),
    control(
        "Art.32(1)(a)",
        "Pseudonymisation and encryption of personal data",
        Signals(Encryption),
        "Encrypt personal data at rest and in transit using current algorithms.",
    ),
    control(
        "Art.32(1)(b)",
        "Ongoing confidentiality of processing systems",
        Signals(AccessControl),
        "Limit access to personal data with explicit authorization checks.",
    ),
    control(
        "Art.32(1)(d)",
        "Regular testing of security measures",
        Signals(Cicd),
        "Test security measures continuously through automated tests and scanning in CI.",
    ),
    control(
        "Art.35",
        "Data protection impact assessment",
        ManualReview,
        "Carry out a DPIA for high-risk processing and keep it with the compliance record.",
    ),
];

pub fn controls_for(framework: Framework) -> &'static [ControlDefinition] {
    match framework {
        Framework::Iso27001 => ISO27001_CONTROLS,
        Framework::Soc2 => SOC2_CONTROLS,
        Framework::Hipaa => HIPAA_CONTROLS,
        Framework::Gdpr => GDPR_CONTROLS,
    }
}
