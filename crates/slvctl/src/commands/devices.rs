//! Device command handlers.

use std::sync::Arc;
use std::time::Duration;

use tabled::Tabled;

use slvctl_core::{
    AttributeValue, CoreError, Device, DeviceAttribute, DeviceChange, Session, SessionConfig,
    WriteOutcome,
};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    dtype: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Attributes")]
    attributes: usize,
    #[tabled(rename = "Last Refresh")]
    last_refresh: String,
}

impl DeviceRow {
    fn new(d: &Arc<Device>, color: bool) -> Self {
        Self {
            id: d.device_id.clone(),
            name: d.device_name.clone().unwrap_or_default(),
            dtype: d.device_type.clone().unwrap_or_default(),
            state: output::paint_status(d.state, color),
            attributes: d.attributes.len(),
            last_refresh: d
                .last_refresh
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct AttributeRow {
    #[tabled(rename = "Attribute")]
    name: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Access")]
    modifier: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl From<&DeviceAttribute> for AttributeRow {
    fn from(a: &DeviceAttribute) -> Self {
        Self {
            name: a.name.clone(),
            label: a.display_label().to_owned(),
            kind: a.type_tag(),
            modifier: a.modifier.to_string(),
            value: a.display_value(),
        }
    }
}

fn detail(d: &Arc<Device>, color: bool) -> String {
    let mut lines = vec![
        format!("ID:        {}", d.device_id),
        format!("Name:      {}", d.device_name.as_deref().unwrap_or("-")),
        format!("Model:     {}", d.device_model.as_deref().unwrap_or("-")),
        format!("Type:      {}", d.device_type.as_deref().unwrap_or("-")),
        format!("State:     {}", output::paint_status(d.state, color)),
    ];
    if let Some(ref err) = d.error {
        lines.push(format!("Error:     {}", err.reason));
    }
    if let Some(since) = d.connected_since {
        lines.push(format!("Connected: {}", since.to_rfc3339()));
    }
    if let Some(at) = d.last_refresh {
        lines.push(format!("Refreshed: {}", at.to_rfc3339()));
    }
    if !d.attributes.is_empty() {
        let rows: Vec<AttributeRow> = d.attributes.values().map(AttributeRow::from).collect();
        lines.push(String::new());
        lines.push(output::render_table(&rows));
    }
    lines.join("\n")
}

/// One-line summary used by `devices watch`.
fn summary_line(d: &Device) -> String {
    let values = d
        .attributes
        .values()
        .map(|a| format!("{}={}", a.name, a.display_value()))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} [{}] {values}", d.device_id, d.state)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    config: SessionConfig,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color());

    match args.command {
        DevicesCommand::List => {
            let snap = Session::oneshot(config, |s| async move { Ok(s.devices_snapshot()) }).await?;
            let out = output::render_list(
                global.output(),
                &snap,
                |d| DeviceRow::new(d, color),
                |d| d.device_id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let id = device.clone();
            let found = Session::oneshot(config, |s| async move { Ok(s.device(&id)) })
                .await?
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "device".into(),
                    identifier: device,
                    list_command: "devices list".into(),
                })?;
            let out = output::render_single(
                global.output(),
                &found,
                |d| detail(d, color),
                |d| d.device_id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Set {
            device,
            assignments,
        } => set(config, &device, &assignments, global).await,

        DevicesCommand::Watch { device, duration } => {
            watch(config, device.as_deref(), duration, global).await
        }
    }
}

// ── Attribute writes ────────────────────────────────────────────────

/// Resolve `attr=value` pairs against the device's attributes, checking
/// each value the way a write would. An empty value resolves to `None`.
fn resolve_assignments(
    device: &Device,
    assignments: &[String],
) -> Result<Vec<(String, Option<AttributeValue>)>, CliError> {
    assignments
        .iter()
        .map(|raw| {
            let (name, value) = util::parse_assignment(raw)?;
            let attr = device
                .attribute(name)
                .ok_or_else(|| CoreError::AttributeNotFound {
                    device_id: device.device_id.clone(),
                    attribute: name.to_owned(),
                })?;
            let parsed = if value.is_empty() {
                None
            } else {
                let parsed = attr.parse_value(value)?;
                attr.check_write(&parsed)?;
                Some(parsed)
            };
            Ok((name.to_owned(), parsed))
        })
        .collect()
}

async fn set(
    config: SessionConfig,
    device_id: &str,
    assignments: &[String],
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let session = Session::new(config)?;
    session.connect().await?;
    let result = write_all(&session, device_id, assignments, global).await;
    session.disconnect().await;
    result
}

async fn write_all(
    session: &Session,
    device_id: &str,
    assignments: &[String],
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let device = session
        .device(device_id)
        .ok_or_else(|| CoreError::DeviceNotFound {
            device_id: device_id.to_owned(),
        })?;

    // Every value is checked before anything is sent.
    let writes = resolve_assignments(&device, assignments)?;
    session.wait_realtime(global.timeout()).await?;

    let mut done = Vec::with_capacity(writes.len());
    let mut failed = None;
    for (attribute, value) in writes {
        match session.set_attribute(device_id, &attribute, value).await {
            Ok(outcome) => done.push((attribute, outcome)),
            Err(e) => {
                failed = Some(e);
                break;
            }
        }
    }

    // Queued writes are lost on disconnect unless they are flushed first.
    let flushed = session.flush_writes(global.timeout()).await;
    if flushed.is_ok() && !global.quiet {
        for (attribute, outcome) in &done {
            match outcome {
                WriteOutcome::Sent => eprintln!("{device_id}.{attribute} updated"),
                WriteOutcome::Ignored => eprintln!("{device_id}.{attribute}: no value, skipped"),
            }
        }
    }

    if let Some(e) = failed {
        return Err(e.into());
    }
    flushed?;
    Ok(())
}

// ── Watch ───────────────────────────────────────────────────────────

async fn watch(
    config: SessionConfig,
    only: Option<&str>,
    duration: Option<Duration>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let session = Session::new(config)?;
    session.connect().await?;

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(deadline, interrupted);

    let mut stream = session.devices();
    let initial: Vec<DeviceChange> = stream
        .current()
        .iter()
        .map(|d| DeviceChange::Added(Arc::clone(d)))
        .collect();
    print_changes(&initial, only, global);

    loop {
        tokio::select! {
            () = &mut deadline => break,
            _ = &mut interrupted => break,
            changes = stream.next_changes() => {
                let Some(changes) = changes else { break };
                print_changes(&changes, only, global);
            }
        }
    }

    session.disconnect().await;
    Ok(())
}

fn print_changes(changes: &[DeviceChange], only: Option<&str>, global: &GlobalOpts) {
    for change in changes
        .iter()
        .filter(|c| only.is_none_or(|id| id == c.device_id()))
    {
        let line = match change {
            DeviceChange::Added(d) | DeviceChange::Changed(d) => watch_line(d, global.output()),
            DeviceChange::Removed(id) => format!("{id} removed"),
        };
        output::print_output(&line, global.quiet);
    }
}

fn watch_line(device: &Device, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            output::render_single(OutputFormat::JsonCompact, device, summary_line, |d| {
                d.device_id.clone()
            })
        }
        OutputFormat::Yaml => format!(
            "---\n{}",
            output::render_single(OutputFormat::Yaml, device, summary_line, |d| {
                d.device_id.clone()
            })
        ),
        OutputFormat::Table | OutputFormat::Plain => {
            format!("{} {}", chrono::Local::now().format("%H:%M:%S"), summary_line(device))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn et312() -> Device {
        let level: DeviceAttribute = serde_json::from_value(json!({
            "name": "levelA", "type": "range", "min": 0, "max": 99, "value": 10
        }))
        .unwrap();
        let mode: DeviceAttribute = serde_json::from_value(json!({
            "name": "mode", "type": "list",
            "values": [{ "key": 0, "value": "Waves" }, { "key": 1, "value": "Stroke" }],
            "value": 0
        }))
        .unwrap();
        Device::new("et312-1").with_attribute(level).with_attribute(mode)
    }

    #[test]
    fn assignments_resolve_by_attribute_type() {
        let writes = resolve_assignments(
            &et312(),
            &["levelA=42".into(), "mode=Stroke".into(), "levelA=".into()],
        )
        .unwrap();

        assert_eq!(
            writes,
            vec![
                ("levelA".to_owned(), Some(AttributeValue::Int(42))),
                ("mode".to_owned(), Some(AttributeValue::Int(1))),
                ("levelA".to_owned(), None),
            ]
        );
    }

    #[test]
    fn out_of_range_value_fails_before_any_write() {
        let err = resolve_assignments(
            &et312(),
            &["levelA=50".into(), "levelA=500".into()],
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "levelA"));
        assert_eq!(err.exit_code(), crate::error::exit_code::USAGE);
    }

    #[test]
    fn unknown_list_label_fails_before_any_write() {
        assert!(resolve_assignments(&et312(), &["mode=Pulse".into()]).is_err());
    }

    #[test]
    fn unknown_attribute_is_not_found() {
        let err = resolve_assignments(&et312(), &["levelB=1".into()]).unwrap_err();
        assert!(matches!(err, CliError::NotFound { .. }));
        assert_eq!(err.exit_code(), crate::error::exit_code::NOT_FOUND);
    }

    #[test]
    fn summary_shows_list_labels() {
        assert_eq!(
            summary_line(&et312()),
            "et312-1 [UNKNOWN] levelA=10 mode=Waves"
        );
    }
}
