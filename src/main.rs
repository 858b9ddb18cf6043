//! # tally
//!
//! Counter server binary: wires settings, telemetry, the `SQLite` store and
//! the HTTP/WebSocket server together.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tally_core::CounterId;
use tally_server::config::ServerConfig;
use tally_server::server::TallyServer;
use tally_settings::{IgnoredEnvVar, LoadedSettings, LogFormat, TallySettings};
use tally_store::{CounterRepo, Database};
use tally_telemetry::{OutputFormat, TelemetryConfig};

/// Shared real-time counter service.
#[derive(Parser, Debug)]
#[command(name = "tally", about = "Shared real-time counter service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP/WebSocket server.
    Serve(ServeArgs),
    /// Create a zeroed counter and print its id.
    Provision(ProvisionArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Settings file (defaults to `~/.tally/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to bind (0 for auto-assign). Overrides settings and `PORT`.
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database.
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ProvisionArgs {
    /// Counter id to create. A fresh `ctr_` id is generated when omitted.
    #[arg(long)]
    id: Option<String>,

    /// Settings file (defaults to `~/.tally/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the `SQLite` database.
    #[arg(long)]
    db: Option<PathBuf>,
}

fn load(config: Option<&Path>) -> Result<LoadedSettings> {
    match config {
        Some(path) => tally_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => tally_settings::load_settings().context("Failed to load settings"),
    }
}

/// CLI flags are the last override layer.
fn apply_serve_flags(settings: &mut TallySettings, args: &ServeArgs) {
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(ref db) = args.db {
        settings.store.db_path = db.display().to_string();
    }
}

fn telemetry_config(settings: &TallySettings) -> TelemetryConfig {
    TelemetryConfig {
        log_level: settings.logging.level.clone(),
        module_levels: Vec::new(),
        format: match settings.logging.format {
            LogFormat::Json => OutputFormat::Json,
            LogFormat::Pretty => OutputFormat::Pretty,
        },
    }
}

/// Log env overrides the loader rejected. Call after telemetry is up.
fn warn_ignored_env(ignored: &[IgnoredEnvVar]) {
    for var in ignored {
        tracing::warn!(key = %var.key, value = %var.value, "invalid env var, ignoring");
    }
}

fn open_repo(db_path: &Path) -> Result<CounterRepo> {
    let db = Database::open(db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    Ok(CounterRepo::new(db))
}

async fn serve(args: ServeArgs) -> Result<()> {
    let LoadedSettings {
        mut settings,
        ignored_env,
    } = load(args.config.as_deref())?;
    apply_serve_flags(&mut settings, &args);

    if !tally_telemetry::init_telemetry(&telemetry_config(&settings)) {
        tracing::debug!("tracing subscriber already installed, keeping it");
    }
    warn_ignored_env(&ignored_env);

    let repo = open_repo(Path::new(&settings.store.db_path))?;
    let config = ServerConfig::from(&settings.server);
    let mut server = TallyServer::new(config, Arc::new(repo));

    match tally_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled"),
    }

    let handle = server.start().await.context("Failed to start server")?;
    tracing::info!(
        addr = %handle.local_addr(),
        db = %settings.store.db_path,
        scope = ?settings.server.broadcast_scope,
        "tally server ready"
    );

    tally_server::shutdown::shutdown_signal().await;
    tracing::info!("Shutting down...");
    handle.shutdown(None).await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn provision(args: &ProvisionArgs) -> Result<()> {
    // Logging stays off so stdout carries only the id.
    let mut settings = load(args.config.as_deref())?.settings;
    if let Some(ref db) = args.db {
        settings.store.db_path = db.display().to_string();
    }

    let id = match args.id.as_deref().map(str::trim) {
        Some("") => anyhow::bail!("--id must not be empty"),
        Some(raw) => CounterId::from_raw(raw),
        None => CounterId::new(),
    };

    let repo = open_repo(Path::new(&settings.store.db_path))?;
    let counter = repo
        .create(&id)
        .with_context(|| format!("Failed to provision counter {id}"))?;
    println!("{}", counter.id);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Provision(args) => provision(&args),
    }
}
