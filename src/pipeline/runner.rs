use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::phase::PhaseRunner;
use super::state::{AnalysisContext, PhaseName};
use crate::detector::{PatternDetector, SignalDetector};
use crate::errors::AttestorError;
use crate::findings::FindingsService;
use crate::mapper::{CatalogMapper, ControlMapper};

/// The production phase bodies: detectors feed the context, the final phase
/// maps and persists findings framework by framework.
pub struct ScanPhases {
    detector: Arc<dyn SignalDetector>,
    mapper: Arc<dyn ControlMapper>,
    findings: FindingsService,
}

impl ScanPhases {
    pub fn new(
        detector: Arc<dyn SignalDetector>,
        mapper: Arc<dyn ControlMapper>,
        findings: FindingsService,
    ) -> Self {
        Self { detector, mapper, findings }
    }

    /// Pattern detector plus the built-in control catalogs.
    pub fn standard(findings: FindingsService) -> Self {
        Self::new(Arc::new(PatternDetector::new()), Arc::new(CatalogMapper::new()), findings)
    }

    async fn gap_identification(&self, ctx: &mut AnalysisContext) -> Result<(), AttestorError> {
        let set = ctx.signal_set();
        for framework in ctx.frameworks.clone() {
            if ctx.cancel.is_cancelled() {
                return Err(AttestorError::Cancelled("Analysis cancelled".into()));
            }
            let control_findings = self.mapper.map_signals_to_controls(&set, framework);
            let created = self.findings.create_findings(
                &ctx.snapshot_id,
                &ctx.organization_id,
                &control_findings,
                &ctx.user_id,
            )?;
            ctx.metrics.findings_generated += created.findings.len() as u64;
            ctx.metrics.tasks_created += created.tasks_created;
            info!(
                run_id = %ctx.run_id,
                framework = %framework,
                findings = created.findings.len(),
                tasks = created.tasks_created,
                "Framework mapped"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl PhaseRunner for ScanPhases {
    async fn run_phase(&self, phase: PhaseName, ctx: &mut AnalysisContext) -> Result<(), AttestorError> {
        let detector = self.detector.as_ref();
        match phase {
            PhaseName::Overview => {
                let overview = detector.survey(&ctx.root, &ctx.scope, &ctx.cancel).await?;
                debug!(
                    run_id = %ctx.run_id,
                    files = overview.total_files,
                    bytes = overview.total_bytes,
                    languages = overview.files_by_language.len(),
                    "Snapshot surveyed"
                );
                ctx.overview = Some(overview);
            }
            PhaseName::BuildCicd => {
                let report = detector.detect_cicd(&ctx.snapshot_id, &ctx.root, &ctx.scope, &ctx.cancel).await?;
                ctx.absorb(report);
            }
            PhaseName::ConfigurationSecrets => {
                let report = detector.scan_secrets(&ctx.snapshot_id, &ctx.root, &ctx.scope, &ctx.cancel).await?;
                ctx.absorb(report);
            }
            PhaseName::AuthenticationAuthorization => {
                let auth = detector.detect_auth(&ctx.snapshot_id, &ctx.root, &ctx.scope, &ctx.cancel).await?;
                ctx.absorb(auth);
                let access = detector
                    .detect_access_control(&ctx.snapshot_id, &ctx.root, &ctx.scope, &ctx.cancel)
                    .await?;
                ctx.absorb(access);
            }
            PhaseName::DataHandling => {
                let report = detector
                    .detect_encryption(&ctx.snapshot_id, &ctx.root, &ctx.scope, &ctx.cancel)
                    .await?;
                ctx.absorb(report);
            }
            PhaseName::OperationalControls => {
                let report = detector.detect_logging(&ctx.snapshot_id, &ctx.root, &ctx.scope, &ctx.cancel).await?;
                ctx.absorb(report);
            }
            PhaseName::GapIdentification => self.gap_identification(ctx).await?,
        }
        Ok(())
    }
}
