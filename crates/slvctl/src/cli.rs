//! Command-line surface of `slvctl`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use slvctl_config::Defaults;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// slvctl -- command-line client for slvCtrl+ backends
#[derive(Debug, Parser)]
#[command(
    name = "slvctl",
    version,
    about = "Control slvCtrl+ devices from the command line",
    long_about = "Inspect and drive the devices attached to a slvCtrl+ backend.\n\n\
        Device state is loaded over HTTP; attribute writes and live updates\n\
        use the backend's Socket.IO channel.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend URL (overrides the stored one)
    #[arg(long, short = 'b', env = "SLVCTL_BACKEND", global = true)]
    pub backend: Option<String>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "SLVCTL_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Colorize device status
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print nothing on success
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Answer yes to confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "SLVCTL_INSECURE", global = true)]
    pub insecure: bool,

    /// HTTP timeout in seconds
    #[arg(long, env = "SLVCTL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    /// Fill unset flags from the config file's `[defaults]`.
    pub fn apply_defaults(&mut self, defaults: &Defaults) {
        if self.output.is_none() {
            self.output = OutputFormat::from_str(&defaults.output, true).ok();
        }
        if self.color.is_none() {
            self.color = ColorMode::from_str(&defaults.color, true).ok();
        }
        self.timeout.get_or_insert(defaults.timeout);
    }

    pub fn output(&self) -> OutputFormat {
        self.output.unwrap_or(OutputFormat::Table)
    }

    pub fn color(&self) -> ColorMode {
        self.color.unwrap_or(ColorMode::Auto)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(30))
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Bordered table or aligned key/value listing
    Table,
    /// Indented JSON
    Json,
    /// JSON on a single line
    JsonCompact,
    Yaml,
    /// Bare identifiers, one per line
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Color when stdout is a terminal and NO_COLOR is unset
    Auto,
    Always,
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect devices and write their attributes
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Manage automation scripts
    #[command(alias = "sc")]
    Scripts(ScriptsArgs),

    /// Read or replace backend settings
    Settings(SettingsArgs),

    /// Show backend process and host health
    Health(HealthArgs),

    /// Manage the stored backend URL
    Backend(BackendArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices
    #[command(alias = "ls")]
    List,

    /// Show one device with its attributes
    Get {
        /// Device ID
        device: String,
    },

    /// Write one or more attributes (attr=value)
    Set {
        /// Device ID
        device: String,

        /// Assignments such as `levelA=42` or `mode=Waves`
        #[arg(required = true, num_args = 1.., value_name = "ATTR=VALUE")]
        assignments: Vec<String>,
    },

    /// Follow live device updates
    Watch {
        /// Only show this device
        #[arg(long)]
        device: Option<String>,

        /// Stop after this long (e.g. `30s`, `5m`)
        #[arg(long, value_parser = humantime::parse_duration)]
        duration: Option<Duration>,
    },
}

// ── Scripts ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScriptsArgs {
    #[command(subcommand)]
    pub command: ScriptsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ScriptsCommand {
    /// List scripts
    #[command(alias = "ls")]
    List,

    /// Print a script's source
    Get { name: String },

    /// Create a script from a file
    Create {
        name: String,
        /// Source file
        #[arg(long, short = 'f')]
        file: PathBuf,
    },

    /// Replace a script's source from a file
    Update {
        name: String,
        /// Source file
        #[arg(long, short = 'f')]
        file: PathBuf,
    },

    /// Delete a script
    #[command(alias = "rm")]
    Delete { name: String },
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show current settings
    Get,

    /// Replace settings with the contents of a JSON file
    Set {
        #[arg(long)]
        from_file: PathBuf,
    },
}

// ── Health ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Keep polling and print one line per sample
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Poll interval for --watch (e.g. `500ms`, `2s`)
    #[arg(long, value_parser = parse_poll_interval, requires = "watch")]
    pub interval: Option<Duration>,

    /// Stop --watch after this many samples
    #[arg(long, requires = "watch")]
    pub count: Option<usize>,
}

fn parse_poll_interval(raw: &str) -> Result<Duration, String> {
    match humantime::parse_duration(raw) {
        Ok(d) if d.is_zero() => Err("interval must be greater than zero".into()),
        Ok(d) => Ok(d),
        Err(e) => Err(e.to_string()),
    }
}

// ── Backend ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct BackendArgs {
    #[command(subcommand)]
    pub command: BackendCommand,
}

#[derive(Debug, Subcommand)]
pub enum BackendCommand {
    /// Print the stored backend URL
    Show,

    /// Store a backend URL and add it to the history
    Set { url: String },

    /// Forget the stored URL (history is kept)
    Clear,

    /// List recently used backend URLs, newest first
    History,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
