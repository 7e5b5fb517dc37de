//! Command dispatch: bridges CLI args -> session calls -> output formatting.

pub mod backend;
pub mod devices;
pub mod health;
pub mod scripts;
pub mod settings;
pub mod util;

use std::time::Duration;

use slvctl_core::{Session, SessionConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: SessionConfig,
    health_interval: Duration,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(config, args, global).await,
        Command::Health(args) => health::handle(config, health_interval, args, global).await,
        Command::Scripts(args) => {
            let session = Session::new(config)?;
            scripts::handle(&session, args, global).await
        }
        Command::Settings(args) => {
            let session = Session::new(config)?;
            settings::handle(&session, args, global).await
        }
        // Backend and Completions are handled before dispatch
        Command::Backend(_) | Command::Completions(_) => unreachable!(),
    }
}
