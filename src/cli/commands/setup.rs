//! Setup command - sync every external module and link it into the release

use crate::checkout::Outcome;
use crate::cli::args::{OutputFormat, SetupArgs};
use crate::cli::commands::{build_deployment, current_dir, load_manifest};
use crate::config::Config;
use crate::deploy::{DeploymentReport, ModuleReport};
use crate::error::ExtsyncResult;
use crate::journal::Journal;
use crate::ui::{self, TaskSpinner, UiContext};
use console::style;

/// Execute the setup command
pub async fn execute(args: SetupArgs, config: &Config) -> ExtsyncResult<()> {
    let cwd = current_dir()?;
    let manifest = load_manifest(&args.target, &cwd).await?;
    let journal = Journal::new(config);
    let deployment = build_deployment(&args.target, args.release.as_deref(), config, &cwd)?
        .with_journal(journal);

    let json = args.format == OutputFormat::Json;
    let ctx = UiContext::detect();
    if !json {
        ui::intro(&ctx, "extsync setup");
        if manifest.is_empty() {
            ui::step_info(&ctx, &format!("No modules in {}", manifest.path().display()));
        }
    }

    let mut report = DeploymentReport::default();
    for spec in manifest.modules() {
        let mut spinner = (!json).then(|| TaskSpinner::new(&ctx));
        if let Some(spinner) = spinner.as_mut() {
            spinner.start(&format!("Syncing {}...", spec.path));
        }

        let module = match deployment.setup_module(spec).await {
            Ok(module) => module,
            Err(e) => {
                if let Some(spinner) = spinner.as_mut() {
                    spinner.stop_error(&format!("{}: {}", spec.path, e));
                }
                return Err(e);
            }
        };

        if let Some(spinner) = spinner.as_mut() {
            if module.is_success() {
                spinner.stop(&summary(&module));
            } else {
                spinner.stop_error(&summary(&module));
                for line in module.failure_lines() {
                    ui::step_error(&ctx, &line);
                }
            }
        }
        report.modules.push(module);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else if report.is_success() {
        ui::outro_success(&ctx, &format!("{} module(s) ready", report.modules.len()));
    } else {
        ui::outro_error(&ctx, "Some machines need attention");
    }

    report.into_result().map(|_| ())
}

fn summary(module: &ModuleReport) -> String {
    let sync = &module.sync;
    let failed = sync.failures().count();
    let mut parts = vec![
        format!("{} completed", sync.completed()),
        format!("{} skipped", sync.skipped()),
    ];
    if failed > 0 {
        parts.push(format!("{} failed", failed));
    }
    format!(
        "{} {} ({})",
        sync.module,
        style(short_identity(sync.identity.as_str())).dim(),
        parts.join(", ")
    )
}

fn short_identity(identity: &str) -> &str {
    identity.get(..12).unwrap_or(identity)
}

fn report_json(report: &DeploymentReport) -> serde_json::Value {
    let modules: Vec<serde_json::Value> = report
        .modules
        .iter()
        .map(|module| {
            let checkouts: Vec<serde_json::Value> = module
                .sync
                .checkouts
                .iter()
                .map(|c| {
                    let (outcome, error) = match &c.outcome {
                        Outcome::Completed => ("completed", None),
                        Outcome::Skipped => ("skipped", None),
                        Outcome::Failed { step, error } => {
                            ("failed", Some(format!("{}: {}", step, error)))
                        }
                    };
                    serde_json::json!({
                        "host": c.host,
                        "destination": c.destination,
                        "outcome": outcome,
                        "history": c.history,
                        "error": error,
                    })
                })
                .collect();
            let activations: Vec<serde_json::Value> = module
                .activations
                .iter()
                .map(|a| {
                    serde_json::json!({
                        "host": a.host,
                        "link": a.link,
                        "error": a.error.as_ref().map(|e| e.to_string()),
                    })
                })
                .collect();
            serde_json::json!({
                "module": module.sync.module,
                "identity": module.sync.identity,
                "success": module.is_success(),
                "checkouts": checkouts,
                "activations": activations,
            })
        })
        .collect();

    serde_json::json!({
        "success": report.is_success(),
        "modules": modules,
    })
}
