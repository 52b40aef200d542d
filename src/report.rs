//! Rendering of a [`ScanResult`] as text, CSV, Markdown, HTML and JSON.
//!
//! Renderers are pure: the same result always renders to the same bytes.
//! Every format lists every device of the roster.

use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ReportError;
use crate::types::{DeviceCounts, DeviceRecord, ScanResult};

/// Placeholder for a missing hostname, MAC or vendor.
pub const UNKNOWN: &str = "unknown";
/// Placeholder for a missing response time or an empty port list.
pub const NONE: &str = "-";

pub const CSV_HEADER: [&str; 6] = [
    "address",
    "hostname",
    "mac",
    "responseTimeMs",
    "openPorts",
    "status",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    Text,
    Csv,
    Markdown,
    Html,
    Json,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 5] = [
        ReportFormat::Text,
        ReportFormat::Csv,
        ReportFormat::Markdown,
        ReportFormat::Html,
        ReportFormat::Json,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Csv => "csv",
            ReportFormat::Markdown => "md",
            ReportFormat::Html => "html",
            ReportFormat::Json => "json",
        }
    }

    /// File name used by [`write_reports`].
    pub fn file_name(self) -> String {
        format!("network-scan.{}", self.extension())
    }

    pub fn render(self, result: &ScanResult) -> Result<String, ReportError> {
        match self {
            ReportFormat::Text => Ok(render_text(result)),
            ReportFormat::Csv => render_csv(result),
            ReportFormat::Markdown => Ok(render_markdown(result)),
            ReportFormat::Html => Ok(render_html(result)),
            ReportFormat::Json => render_json(result),
        }
    }
}

fn status(d: &DeviceRecord) -> &'static str {
    if d.is_reachable() {
        "online"
    } else {
        "offline"
    }
}

fn or_unknown(v: Option<&str>) -> &str {
    v.unwrap_or(UNKNOWN)
}

fn response_time(d: &DeviceRecord) -> String {
    d.response_time_ms()
        .map(|ms| format!("{ms}ms"))
        .unwrap_or_else(|| NONE.to_string())
}

fn joined_ports(d: &DeviceRecord, sep: &str) -> String {
    d.open_ports()
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

fn ports_or_none(d: &DeviceRecord) -> String {
    if d.open_ports().is_empty() {
        NONE.to_string()
    } else {
        joined_ports(d, ", ")
    }
}

fn duration_secs(result: &ScanResult) -> String {
    format!("{:.2}", result.elapsed().as_secs_f64())
}

/// Plain-text report: header, summary block, then one line per device.
pub fn render_text(result: &ScanResult) -> String {
    let c = result.counts();
    let mut out = String::new();
    let _ = writeln!(out, "LAN scan report");
    let _ = writeln!(out, "{}\n", "=".repeat(50));
    let _ = writeln!(out, "Scan started: {}", result.started_at());
    let _ = writeln!(out, "Duration: {} s\n", duration_secs(result));

    let _ = writeln!(out, "Summary");
    let _ = writeln!(out, "{}", "-".repeat(30));
    let _ = writeln!(out, "Total addresses: {}", c.total);
    let _ = writeln!(out, "Online: {}", c.online);
    let _ = writeln!(out, "Offline: {}", c.offline);
    let _ = writeln!(out, "Online ratio: {:.1}%\n", c.online_ratio());

    let _ = writeln!(out, "Devices");
    let _ = writeln!(out, "{}", "-".repeat(30));
    for (i, d) in result.devices().iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. {:<15} {:<7} hostname={} mac={} vendor={} rtt={} ports={}",
            i + 1,
            d.address(),
            status(d),
            or_unknown(d.hostname()),
            or_unknown(d.mac_address()),
            or_unknown(d.vendor()),
            response_time(d),
            ports_or_none(d),
        );
    }
    out
}

/// CSV report with a fixed header; open ports are joined with `;`.
pub fn render_csv(result: &ScanResult) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(CSV_HEADER)?;
    for d in result.devices() {
        let rtt = d
            .response_time_ms()
            .map(|ms| ms.to_string())
            .unwrap_or_default();
        wtr.write_record([
            d.address(),
            or_unknown(d.hostname()),
            or_unknown(d.mac_address()),
            rtt.as_str(),
            joined_ports(d, ";").as_str(),
            status(d),
        ])?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| ReportError::Csv(csv::Error::from(e.into_error())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn md_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

/// Markdown report: summary table followed by a device table.
pub fn render_markdown(result: &ScanResult) -> String {
    let c = result.counts();
    let mut out = String::new();
    let _ = writeln!(out, "# LAN Scan Report\n");
    let _ = writeln!(out, "**Scan started**: {}\n", result.started_at());
    let _ = writeln!(out, "**Duration**: {} s\n", duration_secs(result));

    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|--------|-------|");
    let _ = writeln!(out, "| Total addresses | {} |", c.total);
    let _ = writeln!(out, "| Online | {} |", c.online);
    let _ = writeln!(out, "| Offline | {} |", c.offline);
    let _ = writeln!(out, "| Online ratio | {:.1}% |\n", c.online_ratio());

    let _ = writeln!(out, "## Devices\n");
    let _ = writeln!(
        out,
        "| # | Address | Hostname | MAC | Response time | Open ports | Status |"
    );
    let _ = writeln!(out, "|---|---------|----------|-----|---------------|------------|--------|");
    for (i, d) in result.devices().iter().enumerate() {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            i + 1,
            d.address(),
            md_cell(or_unknown(d.hostname())),
            md_cell(or_unknown(d.mac_address())),
            response_time(d),
            ports_or_none(d),
            status(d),
        );
    }
    out
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const HTML_STYLE: &str = r#"        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 20px; background: #f5f5f5; }
        .container { max-width: 1200px; margin: 0 auto; background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
        h1 { color: #333; border-bottom: 3px solid #007bff; padding-bottom: 10px; }
        h2 { color: #666; margin-top: 30px; }
        .stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 20px; margin: 20px 0; }
        .stat-card { background: #f8f9fa; padding: 20px; border-radius: 6px; text-align: center; }
        .stat-number { font-size: 2em; font-weight: bold; color: #007bff; }
        .stat-label { color: #666; margin-top: 5px; }
        table { width: 100%; border-collapse: collapse; margin: 20px 0; }
        th, td { padding: 12px; text-align: left; border-bottom: 1px solid #ddd; }
        th { background: #f8f9fa; font-weight: 600; }
        .status-online { color: #28a745; font-weight: bold; }
        .status-offline { color: #dc3545; }
        .ports { font-family: monospace; background: #f8f9fa; padding: 2px 6px; border-radius: 3px; }
"#;

/// Self-contained HTML document with inline styles, a stat grid and a device table.
pub fn render_html(result: &ScanResult) -> String {
    let c = result.counts();
    let mut out = String::new();
    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html lang=\"en\">");
    let _ = writeln!(out, "<head>");
    let _ = writeln!(out, "    <meta charset=\"UTF-8\">");
    let _ = writeln!(out, "    <title>LAN Scan Report</title>");
    let _ = write!(out, "    <style>\n{HTML_STYLE}    </style>\n");
    let _ = writeln!(out, "</head>");
    let _ = writeln!(out, "<body>");
    let _ = writeln!(out, "<div class=\"container\">");
    let _ = writeln!(out, "    <h1>LAN Scan Report</h1>");
    let _ = writeln!(
        out,
        "    <p><strong>Scan started:</strong> {}</p>",
        html_escape(result.started_at())
    );
    let _ = writeln!(
        out,
        "    <p><strong>Duration:</strong> {} s</p>",
        duration_secs(result)
    );

    let _ = writeln!(out, "    <h2>Summary</h2>");
    let _ = writeln!(out, "    <div class=\"stats\">");
    for (value, label) in [
        (c.total.to_string(), "Total addresses"),
        (c.online.to_string(), "Online"),
        (c.offline.to_string(), "Offline"),
        (format!("{:.1}%", c.online_ratio()), "Online ratio"),
    ] {
        let _ = writeln!(
            out,
            "        <div class=\"stat-card\"><div class=\"stat-number\">{value}</div><div class=\"stat-label\">{label}</div></div>"
        );
    }
    let _ = writeln!(out, "    </div>");

    let _ = writeln!(out, "    <h2>Devices</h2>");
    let _ = writeln!(out, "    <table>");
    let _ = writeln!(
        out,
        "        <thead><tr><th>#</th><th>Address</th><th>Hostname</th><th>MAC</th><th>Response time</th><th>Open ports</th><th>Status</th></tr></thead>"
    );
    let _ = writeln!(out, "        <tbody>");
    for (i, d) in result.devices().iter().enumerate() {
        let ports = if d.open_ports().is_empty() {
            NONE.to_string()
        } else {
            d.open_ports()
                .iter()
                .map(|p| format!("<span class=\"ports\">{p}</span>"))
                .collect::<Vec<_>>()
                .join(" ")
        };
        let _ = writeln!(
            out,
            "            <tr><td>{}</td><td><code>{}</code></td><td>{}</td><td><code>{}</code></td><td>{}</td><td>{}</td><td><span class=\"status-{s}\">{s}</span></td></tr>",
            i + 1,
            html_escape(d.address()),
            html_escape(or_unknown(d.hostname())),
            html_escape(or_unknown(d.mac_address())),
            response_time(d),
            ports,
            s = status(d),
        );
    }
    let _ = writeln!(out, "        </tbody>");
    let _ = writeln!(out, "    </table>");
    let _ = writeln!(out, "</div>");
    let _ = writeln!(out, "</body>");
    let _ = writeln!(out, "</html>");
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    scan_time: &'a str,
    scan_duration: f64,
    stats: DeviceCounts,
    devices: &'a [DeviceRecord],
}

/// Pretty JSON document: `{ scanTime, scanDuration, stats, devices }`.
pub fn render_json(result: &ScanResult) -> Result<String, ReportError> {
    let doc = JsonReport {
        scan_time: result.started_at(),
        scan_duration: result.elapsed().as_secs_f64(),
        stats: result.counts(),
        devices: result.devices(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Outcome of [`write_reports`]: files that were written and per-format failures.
#[derive(Debug, Default)]
pub struct WrittenReports {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(ReportFormat, ReportError)>,
}

impl WrittenReports {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Write every format into `dir` as `network-scan.<ext>`.
///
/// Each format is attempted independently; a failure is logged and recorded
/// without stopping the remaining formats.
pub fn write_reports(result: &ScanResult, dir: impl AsRef<Path>) -> WrittenReports {
    let dir = dir.as_ref();
    let mut outcome = WrittenReports::default();

    for format in ReportFormat::ALL {
        let path = dir.join(format.file_name());
        let res = format.render(result).and_then(|body| {
            fs::write(&path, body).map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })
        });
        match res {
            Ok(()) => {
                info!(path = %path.display(), "report written");
                outcome.written.push(path);
            }
            Err(e) => {
                warn!("{e}");
                outcome.failed.push((format, e));
            }
        }
    }
    outcome
}
