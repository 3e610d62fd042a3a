use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use iiswatch_config::{load_from_ini_file, AppSettings, SiteConfigTable};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "iiswatch", version)]
#[command(about = "Polls IIS-equivalent site inventory, lifecycle state, and HTTP liveness")]
struct Cli {
    /// Path to the INI configuration file.
    #[arg(short = 'c', long = "configfile", default_value = "iiswatch.ini")]
    configfile: PathBuf,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run under the OS service manager; stop on the service-stop signal.
    Service,
    /// Run in the foreground; stop on Ctrl-C.
    Standalone,
    /// Emit the site inventory as a single discovery document and exit.
    Discover,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (app, site_config) = load_config(&cli.configfile)?;
    init_logging(&app);

    match cli.mode {
        Mode::Discover => run_discover(&app),
        Mode::Standalone => run_supervised(&app, site_config, &[SIGINT]),
        Mode::Service => run_supervised(&app, site_config, &[SIGINT, SIGTERM]),
    }
}

/// A missing config file is not fatal (matches the original's
/// `except FileNotFoundError: pass`): every option simply falls back to its
/// default.
fn load_config(path: &PathBuf) -> Result<(AppSettings, SiteConfigTable)> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        return Ok((AppSettings::default(), SiteConfigTable::new(Default::default(), Vec::new())));
    }
    load_from_ini_file(path).with_context(|| format!("failed to load config file {}", path.display()))
}

fn init_logging(app: &AppSettings) {
    let filter = app
        .loglevel
        .as_deref()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match &app.logfile {
        Some(path) => {
            let file_appender = tracing_appender::rolling::never(
                PathBuf::from(path).parent().unwrap_or_else(|| std::path::Path::new(".")),
                PathBuf::from(path).file_name().unwrap_or_default(),
            );
            subscriber.with_writer(file_appender).with_ansi(false).init();
        }
        None => subscriber.init(),
    }
}

fn run_discover(app: &AppSettings) -> Result<()> {
    let doc = iiswatch_core::discover_once(app).context("discovery failed")?;
    println!("{}", serde_json::to_string(&doc)?);
    Ok(())
}

fn run_supervised(app: &AppSettings, site_config: SiteConfigTable, signals: &[i32]) -> Result<()> {
    let supervisor = iiswatch_core::start(app, Arc::new(site_config));
    let stop = Arc::clone(&supervisor.stop);

    let mut registered = Signals::new(signals).context("failed to register signal handler")?;
    std::thread::spawn(move || {
        if registered.forever().next().is_some() {
            tracing::info!("stop signal received, shutting down");
            stop.signal();
        }
    });

    supervisor.run();
    Ok(())
}
