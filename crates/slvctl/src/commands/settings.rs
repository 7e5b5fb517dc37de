//! Settings command handlers.

use serde_json::Value;

use slvctl_core::Session;

use crate::cli::{GlobalOpts, SettingsArgs, SettingsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

/// Aligned key/value lines for the top level of a settings object.
fn detail(settings: &Value) -> String {
    let Some(map) = settings.as_object() else {
        return settings.to_string();
    };
    let width = map.keys().map(String::len).max().unwrap_or(0);
    map.iter()
        .map(|(key, value)| {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{key:<width$}  {shown}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn handle(
    session: &Session,
    args: SettingsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SettingsCommand::Get => {
            let settings = session.get_settings().await?;
            let out = output::render_single(global.output(), &settings, detail, |_| {
                settings.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SettingsCommand::Set { from_file } => {
            let settings = util::read_json_file(&from_file)?;
            session.save_settings(&settings).await?;
            if !global.quiet {
                eprintln!("Settings saved");
            }
            Ok(())
        }
    }
}
