//! Rendering for `--output`.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use slvctl_core::DeviceStatus;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

/// `auto` colors only an interactive stdout without `NO_COLOR`.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Device status text, colored by severity when `color` is set.
pub fn paint_status(status: DeviceStatus, color: bool) -> String {
    let text = status.to_string();
    if !color {
        return text;
    }
    match status {
        DeviceStatus::Ready => text.green().to_string(),
        DeviceStatus::Busy => text.yellow().to_string(),
        DeviceStatus::Error => text.red().to_string(),
        DeviceStatus::Unknown => text.dimmed().to_string(),
    }
}

/// JSON or YAML text for the serde formats, `None` for table and plain.
fn structured<T: serde::Serialize + ?Sized>(format: OutputFormat, data: &T) -> Option<String> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Table | OutputFormat::Plain => return None,
    };
    Some(text.unwrap_or_else(|e| format!("error: could not serialize output: {e}")))
}

/// A collection as a table of `row`s, or one `key` per line for plain.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    row: impl Fn(&T) -> R,
    key: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    if let Some(text) = structured(format, data) {
        return text;
    }
    if format == OutputFormat::Plain {
        return data.iter().map(key).collect::<Vec<_>>().join("\n");
    }
    render_table(&data.iter().map(row).collect::<Vec<_>>())
}

/// One item. Table output is whatever `detail` lays out.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail: impl Fn(&T) -> String,
    key: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize + ?Sized,
{
    structured(format, data).unwrap_or_else(|| match format {
        OutputFormat::Plain => key(data),
        _ => detail(data),
    })
}

/// Write to stdout unless `--quiet` or there is nothing to say.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let _ = writeln!(io::stdout().lock(), "{output}");
}

pub(crate) fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}
