use async_trait::async_trait;

use super::state::{AnalysisContext, PhaseName};
use crate::errors::AttestorError;

pub struct PhaseDefinition {
    pub name: PhaseName,
    pub display_name: &'static str,
    pub description: &'static str,
}

/// Every run walks these in order. No phase is skipped or repeated.
pub static PHASES: &[PhaseDefinition] = &[
    PhaseDefinition {
        name: PhaseName::Overview,
        display_name: "Overview",
        description: "Survey the file tree: languages, file counts and sizes",
    },
    PhaseDefinition {
        name: PhaseName::BuildCicd,
        display_name: "Build/CI-CD",
        description: "Detect CI pipelines, automated tests and security scanning",
    },
    PhaseDefinition {
        name: PhaseName::ConfigurationSecrets,
        display_name: "Configuration & Secrets",
        description: "Scan for committed credentials and environment files",
    },
    PhaseDefinition {
        name: PhaseName::AuthenticationAuthorization,
        display_name: "Authentication & Authorization",
        description: "Detect authentication patterns and access control mechanisms",
    },
    PhaseDefinition {
        name: PhaseName::DataHandling,
        display_name: "Data Handling",
        description: "Detect encryption at rest and in transit",
    },
    PhaseDefinition {
        name: PhaseName::OperationalControls,
        display_name: "Operational Controls",
        description: "Detect logging, audit trails and monitoring",
    },
    PhaseDefinition {
        name: PhaseName::GapIdentification,
        display_name: "Gap Identification",
        description: "Map signals onto framework controls and persist findings",
    },
];

/// Progress reported when phase `index` starts.
pub fn phase_progress(index: usize) -> u8 {
    ((index as f64 / PHASES.len() as f64) * 100.0).round() as u8
}

/// Executes the body of a single phase against the run's context.
#[async_trait]
pub trait PhaseRunner: Send + Sync {
    async fn run_phase(&self, phase: PhaseName, ctx: &mut AnalysisContext) -> Result<(), AttestorError>;
}
