mod cli;
mod commands;
mod error;
mod output;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use slvctl_core::{SessionConfig, TlsMode};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let mut cli = Cli::parse();

    init_tracing(cli.global.verbose);

    let cfg = slvctl_config::load_config_or_default();
    cli.global.apply_defaults(&cfg.defaults);

    if let Err(err) = run(cli, &cfg).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, cfg: &slvctl_config::Config) -> Result<(), CliError> {
    match cli.command {
        // Backend commands only touch the state file
        Command::Backend(args) => commands::backend::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "slvctl", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let session_config = build_session_config(&cli.global, cfg)?;
            let health_interval = Duration::from_millis(cfg.defaults.health_interval_ms);

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, session_config, health_interval, &cli.global).await
        }
    }
}

/// Build a `SessionConfig` from the config file, the stored backend URL
/// and CLI overrides. `--backend` wins over the stored URL.
fn build_session_config(
    global: &GlobalOpts,
    cfg: &slvctl_config::Config,
) -> Result<SessionConfig, CliError> {
    let backend_url = match global.backend.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Some(url.to_owned()),
        _ => slvctl_config::load_state()?
            .backend_url()
            .map(str::to_owned),
    };

    let mut config = slvctl_config::session_config(cfg, backend_url);
    if global.insecure {
        config.tls = TlsMode::DangerAcceptInvalid;
    }
    config.timeout = global.timeout();
    Ok(config)
}
