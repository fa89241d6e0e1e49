//! Identify command - print a directory's content identity

use crate::cli::args::{IdentifyArgs, OutputFormat};
use crate::config::Config;
use crate::error::ExtsyncResult;
use crate::identity::identify_async;
use crate::ui::{self, UiContext};

/// Execute the identify command
pub async fn execute(args: IdentifyArgs, _config: &Config) -> ExtsyncResult<()> {
    let identity = identify_async(args.path.clone()).await?;

    match args.format {
        OutputFormat::Plain => println!("{}", identity),
        OutputFormat::Json => {
            let json = serde_json::json!({
                "path": args.path,
                "identity": identity,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::key_value(&ctx, "path", &args.path.display().to_string());
            ui::key_value(&ctx, "identity", identity.as_str());
        }
    }

    Ok(())
}
