//! `simbridge` – bridge entry point.
//!
//! 1. Resolves settings: defaults, then `~/.simbridge/config.toml` (or
//!    `--config`), then `SIMBRIDGE_*` variables, then flags.
//! 2. Connects to the simulator, resolves the ego vehicle and spins the
//!    selected adapters until **Ctrl-C**.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use simbridge_runtime::{AdapterSelection, BridgeSettings, init_tracing};
use tokio::sync::watch;
use tracing::warn;

/// Feed autonomy-stack commands into a driving simulator.
#[derive(Parser, Debug)]
#[command(name = "simbridge")]
#[command(about = "Bridge autonomy-stack control and planning into a driving simulator")]
#[command(version)]
struct Args {
    /// Simulator host [default: 172.17.0.1]
    #[arg(long)]
    host: Option<String>,

    /// Simulator port [default: 2000]
    #[arg(short, long)]
    port: Option<u16>,

    /// Which adapters to run: control, planning or both
    #[arg(long, default_value_t = AdapterSelection::Control)]
    adapter: AdapterSelection,

    /// rosbridge WebSocket URL [default: ws://localhost:9090]
    #[arg(long)]
    bus_url: Option<String>,

    /// Configuration file [default: ~/.simbridge/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    fn apply_to(&self, cfg: &mut config::Config) {
        if let Some(host) = &self.host {
            cfg.sim_host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.sim_port = port;
        }
        if let Some(url) = &self.bus_url {
            cfg.bus_url = url.clone();
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters, SIMBRIDGE_LOG_FORMAT=json switches output, and
    // OTEL_EXPORTER_OTLP_ENDPOINT enables span export.
    let _otel_guard = init_tracing("simbridge");

    let settings = match resolve_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}: {}", "Startup error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    print_banner(&settings);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (cancel_tx, cancel_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = cancel_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will terminate without cleanup");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: failed to start runtime: {}", "Startup error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    // Cancellation also aborts a startup that is still waiting on the
    // simulator or the bus.
    let result = runtime.block_on(async {
        tokio::select! {
            biased;
            result = simbridge_runtime::run(&settings, cancelled(cancel_rx.clone())) => result,
            _ = cancelled(cancel_rx.clone()) => Ok(()),
        }
    });

    if *cancel_rx.borrow() {
        println!();
        println!("{}", "Cancelled by user. Bye!".yellow().bold());
        return ExitCode::SUCCESS;
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Startup error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Defaults < file < environment < flags.
fn resolve_settings(args: &Args) -> Result<BridgeSettings, String> {
    let path = args.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = config::load(&path)?;
    args.apply_to(&mut cfg);
    cfg.to_settings(args.adapter)
}

async fn cancelled(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner(settings: &BridgeSettings) {
    println!();
    println!("{}", r#"   _____ _           ____       _     __         "#.bold().cyan());
    println!("{}", r#"  / ___/(_)___ ___  / __ )_____(_)___/ /___ ____ "#.bold().cyan());
    println!("{}", r#"  \__ \/ / __ `__ \/ __  / ___/ / __  / __ `/ _ \"#.bold().cyan());
    println!("{}", r#" ___/ / / / / / / / /_/ / /  / / /_/ / /_/ /  __/"#.bold().cyan());
    println!("{}", r#"/____/_/_/ /_/ /_/_____/_/  /_/\__,_/\__, /\___/ "#.bold().cyan());
    println!("{}", r#"                                    /____/       "#.bold().cyan());
    println!(
        "  {}  {}",
        "SimBridge".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!(
        "  Simulator {}   Bus {}   Adapters {}",
        format!("{}:{}", settings.sim_host, settings.sim_port).bold(),
        settings.bus_url.bold(),
        settings.adapters.to_string().bold()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let args = Args::try_parse_from(["simbridge"]).expect("parse");
        assert_eq!(args.adapter, AdapterSelection::Control);
        assert!(args.host.is_none());
        assert!(args.port.is_none());
    }

    #[test]
    fn flags_parse() {
        let args = Args::try_parse_from([
            "simbridge",
            "--host",
            "10.1.2.3",
            "-p",
            "2002",
            "--adapter",
            "both",
            "--bus-url",
            "ws://apollo:9090",
        ])
        .expect("parse");
        assert_eq!(args.host.as_deref(), Some("10.1.2.3"));
        assert_eq!(args.port, Some(2002));
        assert_eq!(args.adapter, AdapterSelection::Both);
        assert_eq!(args.bus_url.as_deref(), Some("ws://apollo:9090"));
    }

    #[test]
    fn unknown_adapter_is_rejected() {
        assert!(Args::try_parse_from(["simbridge", "--adapter", "steering"]).is_err());
    }

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sim_host = \"from-file\"\nsim_port = 3000\nmode_hold_ms = 750\n")
            .expect("write");

        let args = Args::try_parse_from([
            "simbridge",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--port",
            "2001",
            "--adapter",
            "planning",
        ])
        .expect("parse");
        let settings = resolve_settings(&args).expect("settings");

        assert_eq!(settings.sim_host, "from-file");
        assert_eq!(settings.sim_port, 2001);
        assert_eq!(settings.mode_hold, std::time::Duration::from_millis(750));
        assert_eq!(settings.adapters, AdapterSelection::Planning);
    }

    #[test]
    fn broken_config_file_is_a_startup_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sim_port = [").expect("write");

        let args = Args::try_parse_from(["simbridge", "--config", path.to_str().expect("utf-8")])
            .expect("parse");
        assert!(resolve_settings(&args).is_err());
    }
}
