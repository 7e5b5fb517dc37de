//! Automation script command handlers.

use tabled::Tabled;

use slvctl_core::{AutomationScript, Session};

use crate::cli::{GlobalOpts, OutputFormat, ScriptsArgs, ScriptsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ScriptRow {
    #[tabled(rename = "Name")]
    name: String,
}

impl From<&AutomationScript> for ScriptRow {
    fn from(s: &AutomationScript) -> Self {
        Self {
            name: s.name.clone(),
        }
    }
}

pub async fn handle(
    session: &Session,
    args: ScriptsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ScriptsCommand::List => {
            let scripts = session.list_scripts().await?;
            let out = output::render_list(
                global.output(),
                &scripts,
                |s| ScriptRow::from(s),
                |s| s.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ScriptsCommand::Get { name } => {
            let script = session
                .get_script(&name)
                .await
                .map_err(|e| CliError::not_found_or(e, "script", &name))?;
            // Table and plain both print the raw source.
            let out = match global.output() {
                OutputFormat::Table | OutputFormat::Plain => {
                    script.code.clone().unwrap_or_default()
                }
                format => output::render_single(format, &script, |_| String::new(), |s| {
                    s.name.clone()
                }),
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ScriptsCommand::Create { name, file } => {
            let code = std::fs::read_to_string(&file)?;
            session.create_script(&name, &code).await?;
            if !global.quiet {
                eprintln!("Script '{name}' created");
            }
            Ok(())
        }

        ScriptsCommand::Update { name, file } => {
            let code = std::fs::read_to_string(&file)?;
            session
                .update_script(&name, &code)
                .await
                .map_err(|e| CliError::not_found_or(e, "script", &name))?;
            if !global.quiet {
                eprintln!("Script '{name}' updated");
            }
            Ok(())
        }

        ScriptsCommand::Delete { name } => {
            if !util::confirm(
                &format!("Delete script '{name}'?"),
                "scripts delete",
                global.yes,
            )? {
                return Ok(());
            }
            session
                .delete_script(&name)
                .await
                .map_err(|e| CliError::not_found_or(e, "script", &name))?;
            if !global.quiet {
                eprintln!("Script '{name}' deleted");
            }
            Ok(())
        }
    }
}
