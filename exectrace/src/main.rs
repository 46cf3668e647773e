use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Context;
use clap::{ArgAction, Parser};
use exectrace::{
    config::{OutputFormat, Settings},
    programs::{bump_memlock_rlimit, get_ebpf_path, ExecTracer, EBPF_OBJECT},
    reader::{spawn_reader, Forwarder, ReaderStats},
    sink::{handle_logging, EventSink, WriterSink},
};
use log::info;
use tokio::{signal, sync::mpsc};
use tracing::Level;

#[derive(Debug, Parser)]
#[clap(version, about = "Trace every execve on the host")]
struct Opt {
    /// Settings file (default: /etc/exectrace/config.toml when present)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Compiled probe object, overrides the settings file
    #[clap(long)]
    ebpf_object: Option<PathBuf>,

    /// Output rendering, overrides the settings file
    #[clap(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let opt = Opt::parse();

    let level = match opt.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // logs go to stderr, stdout carries the records
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::load(opt.config.as_deref()).context("failed to load settings")?;
    if let Some(path) = opt.ebpf_object {
        settings.ebpf_object = Some(path);
    }
    if let Some(format) = opt.format {
        settings.format = format;
    }

    bump_memlock_rlimit();

    let object = settings
        .ebpf_object
        .clone()
        .unwrap_or_else(|| get_ebpf_path(EBPF_OBJECT));
    let mut tracer = ExecTracer::load(&object, settings.ebpf_logging)?;
    tracer.attach()?;
    let ring = tracer.take_events()?;

    let (tx, rx) = mpsc::channel(settings.channel_capacity);
    let sink: Arc<dyn EventSink> = Arc::new(WriterSink::stdout(settings.format));
    let logging_handle = tokio::spawn(handle_logging(rx, sink));

    let shutdown = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(ReaderStats::default());
    let reader_handle = spawn_reader(
        ring,
        Forwarder::new(tx, stats.clone(), settings.resolve_usernames),
        shutdown.clone(),
        settings.poll_interval(),
    );

    info!("exectrace is running. Waiting for Ctrl-C...");
    signal::ctrl_c().await?;
    info!("Exiting...");

    shutdown.store(true, Ordering::Relaxed);
    reader_handle.await?;
    // the reader owned the last sender, so the sink drains and returns
    let logged = logging_handle.await?;

    info!(
        "{} records forwarded, {} rejected, {} logged",
        stats.forwarded.load(Ordering::Relaxed),
        stats.rejected.load(Ordering::Relaxed),
        logged
    );

    drop(tracer);
    Ok(())
}
