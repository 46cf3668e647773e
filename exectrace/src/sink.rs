//! Destinations for decoded records.

use std::sync::Arc;

use anyhow::{Context, Error};
use async_trait::async_trait;
use log::warn;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{mpsc, Mutex},
};

use crate::{config::OutputFormat, record::ExecRecord};

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn log_event(&self, record: &ExecRecord) -> Result<(), Error>;
    async fn flush(&self) -> Result<(), Error>;
}

/// Writes one rendered record per line to an async writer.
pub struct WriterSink<W> {
    format: OutputFormat,
    out: Mutex<W>,
}

impl<W> WriterSink<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        WriterSink {
            format,
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl WriterSink<tokio::io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(tokio::io::stdout(), format)
    }
}

fn render(record: &ExecRecord, format: OutputFormat) -> Result<String, Error> {
    let mut line = match format {
        OutputFormat::Json => {
            serde_json::to_string(record).context("failed to serialize exec record")?
        }
        OutputFormat::Text => record.to_string(),
    };
    line.push('\n');
    Ok(line)
}

#[async_trait]
impl<W> EventSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn log_event(&self, record: &ExecRecord) -> Result<(), Error> {
        let line = render(record, self.format)?;
        self.out.lock().await.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        self.out.lock().await.flush().await?;
        Ok(())
    }
}

/// Feed every record received on `rx` to `sink` until all senders are
/// gone, then flush. Returns the number of records the sink accepted.
pub async fn handle_logging(mut rx: mpsc::Receiver<ExecRecord>, sink: Arc<dyn EventSink>) -> u64 {
    let mut logged = 0;

    while let Some(record) = rx.recv().await {
        match sink.log_event(&record).await {
            Ok(()) => logged += 1,
            Err(e) => warn!("failed to log exec event for pid {}: {:#}", record.pid, e),
        }
    }

    if let Err(e) = sink.flush().await {
        warn!("failed to flush events on shutdown: {:#}", e);
    }

    logged
}
