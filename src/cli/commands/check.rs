//! Check command - report cached modules per target

use crate::cli::args::{CheckArgs, OutputFormat};
use crate::cli::commands::{build_deployment, current_dir, load_manifest};
use crate::config::Config;
use crate::deploy::PresenceReport;
use crate::error::{ExtsyncError, ExtsyncResult};
use crate::ui::{self, UiContext};

/// Execute the check command
pub async fn execute(args: CheckArgs, config: &Config) -> ExtsyncResult<()> {
    let cwd = current_dir()?;
    let manifest = load_manifest(&args.target, &cwd).await?;
    let deployment = build_deployment(&args.target, None, config, &cwd)?;

    let reports = deployment.check(&manifest).await?;
    let errors = reports.iter().filter(|r| r.present.is_err()).count();

    match args.format {
        OutputFormat::Json => print_json(&reports)?,
        OutputFormat::Plain => print_plain(&reports),
        OutputFormat::Table => print_table(&reports),
    }

    if errors > 0 {
        return Err(ExtsyncError::User(format!(
            "{} target(s) could not be checked",
            errors
        )));
    }
    Ok(())
}

fn status(report: &PresenceReport) -> String {
    match &report.present {
        Ok(true) => "present".to_string(),
        Ok(false) => "missing".to_string(),
        Err(e) => format!("error: {}", e),
    }
}

fn print_table(reports: &[PresenceReport]) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Cached externals");

    let mut current = None;
    for report in reports {
        if current != Some(report.module.as_str()) {
            current = Some(report.module.as_str());
            ui::section(&ctx, &format!("{} @ {}", report.module, report.identity));
        }
        ui::key_value_status(
            &ctx,
            &report.host,
            &status(report),
            matches!(report.present, Ok(true)),
        );
    }
}

fn print_plain(reports: &[PresenceReport]) {
    for report in reports {
        println!("{}\t{}\t{}", report.module, report.host, status(report));
    }
}

fn print_json(reports: &[PresenceReport]) -> ExtsyncResult<()> {
    let entries: Vec<serde_json::Value> = reports
        .iter()
        .map(|r| {
            serde_json::json!({
                "module": r.module,
                "identity": r.identity,
                "host": r.host,
                "destination": r.destination,
                "present": r.present.as_ref().ok(),
                "error": r.present.as_ref().err().map(|e| e.to_string()),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
