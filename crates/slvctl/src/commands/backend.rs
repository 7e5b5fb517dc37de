//! Backend URL subcommand handlers. These never touch the network.

use slvctl_config::{BackendState, load_state, save_state};

use crate::cli::{BackendArgs, BackendCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

fn history_lines(state: &BackendState) -> String {
    state
        .backend_history
        .iter()
        .map(|url| {
            let marker = if state.backend_url() == Some(url.as_str()) {
                "*"
            } else {
                " "
            };
            format!("{marker} {url}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn handle(args: BackendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut state = load_state()?;

    match args.command {
        BackendCommand::Show => {
            match state.backend_url() {
                Some(url) => output::print_output(url, global.quiet),
                None if !global.quiet => eprintln!("No backend configured"),
                None => {}
            }
            Ok(())
        }

        BackendCommand::Set { url } => {
            state.set_backend_url(&url)?;
            save_state(&state)?;
            if !global.quiet {
                eprintln!("Backend set to {}", state.backend_url().unwrap_or_default());
            }
            Ok(())
        }

        BackendCommand::Clear => {
            state.clear_backend_url();
            save_state(&state)?;
            if !global.quiet {
                eprintln!("Backend cleared");
            }
            Ok(())
        }

        BackendCommand::History => {
            let out = output::render_single(
                global.output(),
                &state.backend_history,
                |_| history_lines(&state),
                |urls| urls.join("\n"),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn history_marks_the_active_url() {
        let mut state = BackendState::default();
        state.set_backend_url("http://a:1337").unwrap();
        state.set_backend_url("http://b:1337").unwrap();

        assert_eq!(history_lines(&state), "* http://b:1337\n  http://a:1337");
    }
}
