use crate::cli::commands::FindingsArgs;
use crate::config::AttestorConfig;
use crate::db::Database;
use crate::errors::AttestorError;
use crate::findings::FindingsService;
use crate::models::FindingFilters;

pub async fn handle_findings(args: FindingsArgs, config: AttestorConfig) -> Result<(), AttestorError> {
    let db = Database::new(args.db.as_deref().unwrap_or(&config.database.path))?;
    let service = FindingsService::new(db);

    if args.summary {
        let summary = service.get_findings_summary(&args.snapshot_id, &args.org)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("Total: {}  Critical: {}", summary.total, summary.critical_count);
            for (status, count) in &summary.by_status {
                println!("  {:<14} {}", status, count);
            }
            for (framework, count) in &summary.by_framework {
                println!("  {:<14} {}", framework, count);
            }
        }
        return Ok(());
    }

    let filters = FindingFilters {
        framework: args.framework.clone(),
        status: args.status.clone(),
        confidence: args.confidence.clone(),
        signal_type: None,
        control_id: args.control.clone(),
        page: Some(args.page),
        limit: Some(args.limit),
    };
    let page = service.get_findings(&args.snapshot_id, &args.org, &filters)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    println!("{} findings (page {}, {} per page)", page.total, page.page, page.limit);
    for finding in &page.findings {
        let overridden = if finding.human_override.is_some() { " *" } else { "" };
        println!(
            "{:<10} {:<22} {:<13} {:<7} {}{}",
            finding.framework.as_str(),
            finding.control_id,
            finding.status.as_str(),
            finding.confidence.as_str(),
            finding.summary,
            overridden
        );
    }
    Ok(())
}
