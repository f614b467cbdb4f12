//! Analysis orchestration: the fixed phase sequence, the per-run context,
//! heartbeats and the stale-run sweeper.

pub mod orchestrator;
pub mod phase;
pub mod runner;
pub mod state;
pub mod sweeper;

pub use orchestrator::{parse_frameworks, AnalysisOrchestrator, StartAnalysis, StartedAnalysis};
pub use phase::{PhaseDefinition, PhaseRunner, PHASES};
pub use runner::ScanPhases;
pub use state::{AnalysisContext, PhaseName, PipelineSettings};
pub use sweeper::spawn_sweeper;
