//! Health command handler.

use std::time::Duration;

use slvctl_core::{HealthSample, Session, SessionConfig, SystemInfo};

use crate::cli::{GlobalOpts, HealthArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

fn detail(info: &SystemInfo) -> String {
    let sample = HealthSample::from_info(info, chrono::Utc::now());
    let host = &info.system;
    let mut lines = vec![
        format!("Host:      {}", or_dash(&host.hostname)),
        format!("OS:        {}", or_dash(&host.os.name)),
        format!("CPU:       {:.1}%", host.cpu.usage),
        format!(
            "Memory:    {:.0} / {:.0} MB ({:.1}%)",
            host.memory.used_mem_mb, host.memory.total_mem_mb, host.memory.used_mem_percentage
        ),
        format!("RSS:       {:.1} MB", sample.rss_mb),
        format!(
            "Heap:      {:.1} / {:.1} MB",
            sample.heap_used_mb, sample.heap_total_mb
        ),
    ];
    if let Some(uptime) = Duration::try_from_secs_f64(host.uptime)
        .ok()
        .filter(|d| !d.is_zero())
    {
        lines.push(format!(
            "Uptime:    {}",
            humantime::format_duration(Duration::from_secs(uptime.as_secs()))
        ));
    }
    lines.join("\n")
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

fn sample_line(sample: &HealthSample, peak_cpu: f64) -> String {
    format!(
        "{}  cpu {:>5.1}% (peak {:.1}%)  mem {:>5.1}%  rss {:>7.1} MB  heap {:>7.1} MB",
        sample.at.with_timezone(&chrono::Local).format("%H:%M:%S"),
        sample.cpu_percent,
        peak_cpu,
        sample.used_mem_percent,
        sample.rss_mb,
        sample.heap_used_mb,
    )
}

pub async fn handle(
    mut config: SessionConfig,
    default_interval: Duration,
    args: HealthArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !args.watch {
        let session = Session::new(config)?;
        let info = session.health().await?;
        let out = output::render_single(global.output(), &info, detail, |i| {
            format!("{:.1}", i.system.cpu.usage)
        });
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    config.realtime = false;
    config.health_interval = Some(args.interval.unwrap_or(default_interval));
    let session = Session::new(config)?;
    let mut updates = session.health_updates();
    session.connect().await?;

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    let mut printed = 0usize;

    loop {
        tokio::select! {
            _ = &mut interrupted => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let series = session.health_series().await;
                let Some(sample) = series.latest() else { continue };
                let out = match global.output() {
                    OutputFormat::Table | OutputFormat::Plain => {
                        sample_line(sample, series.peak_cpu().unwrap_or(sample.cpu_percent))
                    }
                    _ => output::render_single(
                        OutputFormat::JsonCompact,
                        sample,
                        |_| String::new(),
                        |_| String::new(),
                    ),
                };
                output::print_output(&out, global.quiet);

                printed += 1;
                if args.count.is_some_and(|n| printed >= n) {
                    break;
                }
            }
        }
    }

    session.disconnect().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sample_line_reports_peak() {
        let sample = HealthSample {
            at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).single().unwrap_or_default(),
            rss_mb: 48.0,
            heap_total_mb: 20.0,
            heap_used_mb: 12.5,
            cpu_percent: 3.0,
            used_mem_percent: 41.2,
        };
        let line = sample_line(&sample, 9.5);
        assert!(line.contains("cpu   3.0% (peak 9.5%)"), "{line}");
        assert!(line.contains("heap    12.5 MB"), "{line}");
    }

    #[test]
    fn detail_falls_back_to_dashes() {
        let out = detail(&SystemInfo::default());
        assert!(out.contains("Host:      -"));
        assert!(!out.contains("Uptime"));
    }
}
