// src/main.rs - submit a raw job to a spooler target and optionally babysit it
use clap::Parser;
use spoolguard::{select_target, load_config, Config, PrintJobRunner, PrintRequest, Spooler};
use spoolguard_simulator::SimSpooler;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const DEFAULT_CONFIG: &str = "spoolguard.toml";

#[derive(Debug, Parser)]
#[command(name = "spoolguard", version, about = "Submit a print job and supervise it to completion")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    /// List available targets and exit
    #[arg(long)]
    list: bool,
    /// Target name or index; defaults to the spooler default target
    #[arg(short, long)]
    target: Option<String>,
    /// Raw file copied into every page
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// Page count
    #[arg(long)]
    count: Option<u32>,
    /// Check job status until it completes
    #[arg(long)]
    check: bool,
    /// Trace every device call
    #[arg(short, long)]
    verbose: bool,
    /// Do not retain the job before monitoring
    #[arg(long)]
    no_retain: bool,
    /// Print the final job report as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(target) = &self.target {
            config.job.target = Some(target.clone());
        }
        if let Some(file) = &self.file {
            config.job.file = Some(file.clone());
        }
        if let Some(count) = self.count {
            config.job.pages = count;
        }
        if self.check {
            config.monitor.enabled = true;
        }
        if self.verbose {
            config.logging.verbose = true;
        }
        if self.no_retain {
            config.monitor.retain = false;
        }
    }
}

fn read_config(cli: &Cli) -> Result<Config, BoxError> {
    let path = cli.config.as_path();
    let mut config = if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        Config::default()
    } else {
        load_config(path).map_err(|e| {
            tracing::error!("Please ensure '{}' exists and is properly formatted", path.display());
            Box::new(e) as BoxError
        })?
    };
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Read the config under a plain subscriber writing to `writer`, since the
/// configured subscriber depends on the config.
fn read_config_logged<W>(cli: &Cli, writer: W) -> Result<Config, BoxError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt().with_writer(writer).with_ansi(false).finish();
    tracing::subscriber::with_default(bootstrap, || read_config(cli))
}

fn init_logging(config: &Config) -> Result<(), BoxError> {
    let level = if config.logging.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let session_log = match (&config.logging.session_log, config.monitor.enabled) {
        (Some(path), true) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        _ => None,
    };
    tracing_subscriber::registry()
        .with(level)
        .with(tracing_subscriber::fmt::layer())
        .with(session_log)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let config = read_config_logged(&cli, std::io::stderr)?;
    init_logging(&config)?;

    let spooler = SimSpooler::new(config.simulator.clone());
    let targets = spooler.enumerate().await?;
    if targets.is_empty() {
        tracing::info!("NO PRINTERS FOUND.");
        return Ok(());
    }
    if cli.list {
        println!("Found printers:");
        for (i, target) in targets.iter().enumerate() {
            println!("  [{}] {}", i, target);
        }
        return Ok(());
    }

    let default = spooler.default_target().await?;
    let target = select_target(&targets, config.job.target.as_deref(), default.as_deref())
        .ok_or_else(|| format!("no target matches {:?}", config.job.target))?;
    tracing::info!("Selected target: {}", target);

    let content = match &config.job.file {
        Some(path) => tokio::fs::read(path).await.map_err(|e| {
            tracing::error!("open '{}' failed: {}", path.display(), e);
            e
        })?,
        None => Vec::new(),
    };
    let request = PrintRequest::from_config(&config, content);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let ctrl_c_tx = Arc::clone(&shutdown_tx);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if ctrl_c_tx.send_replace(true) {
                tracing::warn!("Interrupted again, exiting");
                std::process::exit(130);
            }
            tracing::info!("Interrupted, stopping monitor at next poll");
        }
    });

    let runner = PrintJobRunner::new(&spooler, &config);
    let report = match runner.run(&target, &request, &shutdown_rx).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Job on '{}' failed: {}", target.name, e);
            return Err(e.into());
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        tracing::info!("Job {} on '{}': {} page(s) issued", report.job_id, report.target.name, report.pages_issued);
    }
    Ok(())
}
