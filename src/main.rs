use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use lan_sweep::report::{self, render_json};
use lan_sweep::{ports, ScanConfig, ScanOptions, ScanResult, Scanner};

/// lan-sweep — find live hosts on a /24 and optionally probe their names, MACs and ports.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lan-sweep",
    version,
    about = "Find live hosts on a /24 and optionally probe their names, MACs and ports.",
    long_about = None
)]
struct Cli {
    /// Network to sweep, e.g. 192.168.1.0/24. If omitted, the local /24 is inferred.
    #[arg(long)]
    network: Option<String>,

    /// JSON file with scan options (network, timeoutMs, maxConcurrent, ports, deepScan).
    /// Command-line flags override values from the file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reachability probe timeout in milliseconds.
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Number of probes run together in one batch.
    #[arg(long = "max-concurrent")]
    max_concurrent: Option<usize>,

    /// Ports probed during a deep scan, e.g. "22,80,8000-8010".
    #[arg(long, conflicts_with = "ports_file")]
    ports: Option<String>,

    /// File with one port or range per line (`#` starts a comment).
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,

    /// Resolve hostnames and MAC addresses and probe ports of live hosts.
    #[arg(long, default_value_t = false)]
    deep: bool,

    /// Write text, CSV, Markdown, HTML and JSON reports into this directory.
    #[arg(long = "report-dir")]
    report_dir: Option<PathBuf>,

    /// Write the JSON report to this path.
    #[arg(long)]
    json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = build_config(&cli)?;
    println!("lan-sweep configuration:");
    println!(
        "  network        : {}",
        config
            .network()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "<infer local /24>".to_string())
    );
    println!("  timeout_ms     : {}", config.timeout().as_millis());
    println!("  max_concurrent : {}", config.max_concurrent());
    println!("  ports          : {:?}", config.ports());
    println!("  deep_scan      : {}", config.deep_scan());

    // Ctrl-C stops the scan before the next batch.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    let result = Scanner::new(config).with_cancellation(cancel).scan().await?;
    print_results_table(&result);

    if let Some(dir) = cli.report_dir.as_deref() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create report directory {}", dir.display()))?;
        let outcome = report::write_reports(&result, dir);
        for path in &outcome.written {
            println!("Wrote {}", path.display());
        }
        for (format, err) in &outcome.failed {
            eprintln!("Failed to write {:?} report: {err}", format);
        }
    }

    if let Some(path) = cli.json.as_deref() {
        match write_results_json(path, &result) {
            Ok(()) => println!("Wrote JSON results to {}", path.display()),
            Err(e) => eprintln!("Failed to write JSON to {}: {e:#}", path.display()),
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<ScanConfig> {
    let mut opts = match cli.config.as_deref() {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            serde_json::from_str::<ScanOptions>(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?
        }
        None => ScanOptions::default(),
    };

    if cli.network.is_some() {
        opts.network = cli.network.clone();
    }
    if cli.timeout_ms.is_some() {
        opts.timeout_ms = cli.timeout_ms;
    }
    if cli.max_concurrent.is_some() {
        opts.max_concurrent = cli.max_concurrent;
    }
    if let Some(raw) = cli.ports.as_deref() {
        let list = ports::parse_ports_str(raw)?;
        opts.ports = Some(list.into_iter().map(u32::from).collect());
    }
    if let Some(path) = cli.ports_file.as_deref() {
        let list = ports::load_ports_from_path(path)?;
        opts.ports = Some(list.into_iter().map(u32::from).collect());
    }
    if cli.deep {
        opts.deep_scan = Some(true);
    }

    Ok(ScanConfig::try_from(opts)?)
}

fn print_results_table(result: &ScanResult) {
    let counts = result.counts();
    println!(
        "\nOnline: {} / {} (offline: {}) in {:.2}s",
        counts.online,
        counts.total,
        counts.offline,
        result.elapsed().as_secs_f64()
    );
    if counts.online == 0 {
        return;
    }

    let mut ip_w = "address".len();
    let mut host_w = "hostname".len();
    for d in result.online() {
        ip_w = ip_w.max(d.address().len());
        host_w = host_w.max(d.hostname().map_or(0, str::len).min(40));
    }
    let mac_w = 17usize;
    let rtt_w = "rtt_ms".len();

    println!(
        "{:<ip_w$}  {:<host_w$}  {:<mac_w$}  {:>rtt_w$}  ports",
        "address", "hostname", "mac", "rtt_ms"
    );
    println!(
        "{:-<ip_w$}  {:-<host_w$}  {:-<mac_w$}  {:-<rtt_w$}  -----",
        "", "", "", ""
    );
    for d in result.online() {
        let host: String = d.hostname().unwrap_or("").chars().take(40).collect();
        let ports = d
            .open_ports()
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:<ip_w$}  {:<host_w$}  {:<mac_w$}  {:>rtt_w$}  {}",
            d.address(),
            host,
            d.mac_address().unwrap_or(""),
            d.response_time_ms().map(|ms| ms.to_string()).unwrap_or_default(),
            ports,
        );
    }
}

fn write_results_json(path: &Path, result: &ScanResult) -> Result<()> {
    let body = render_json(result)?;
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
