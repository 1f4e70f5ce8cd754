use crate::model::{Diagnostics, OutputConfig, Protocol, ScanOutcome, Status, Target, TcpMeta};
use crate::util::now_iso8601;
use anyhow::Context;
use std::io::Write;
use tokio::sync::mpsc;

use super::sink::OutputSink;

/// Handle to the background writer; cloned into every scan task.
#[derive(Clone)]
pub struct OutputChannel {
    inner: std::sync::Arc<OutputInner>,
}

struct OutputInner {
    tx: tokio::sync::Mutex<Option<mpsc::Sender<OutputCommand>>>,
    handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

enum OutputCommand {
    Emit(Box<ScanOutcome>),
}

impl OutputChannel {
    pub fn new(cfg: OutputConfig) -> anyhow::Result<Self> {
        Self::with_writer(cfg, std::io::stdout())
    }

    pub fn with_writer<W>(cfg: OutputConfig, writer: W) -> anyhow::Result<Self>
    where
        W: Write + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(1024);
        let handle = tokio::task::spawn_blocking(move || {
            let mut sink = OutputSink::new(cfg, writer);
            while let Some(cmd) = rx.blocking_recv() {
                let OutputCommand::Emit(outcome) = cmd;
                if let Err(err) = sink.write_outcome(&outcome) {
                    tracing::error!(
                        error = %err,
                        target = %outcome.target.addr,
                        "failed to write scan outcome"
                    );
                }
            }
            sink.flush();
        });

        Ok(Self {
            inner: std::sync::Arc::new(OutputInner {
                tx: tokio::sync::Mutex::new(Some(tx)),
                handle: tokio::sync::Mutex::new(Some(handle)),
            }),
        })
    }

    pub async fn emit(&self, outcome: ScanOutcome) -> anyhow::Result<()> {
        let guard = self.inner.tx.lock().await;
        let Some(tx) = guard.as_ref() else {
            anyhow::bail!(
                "output writer already shut down; dropping outcome for {}",
                outcome.target.addr
            );
        };
        tx.send(OutputCommand::Emit(Box::new(outcome)))
            .await
            .map_err(|_| anyhow::anyhow!("output writer stopped"))
    }

    /// Emits an error record for a target that never produced an outcome.
    pub async fn emit_error(
        &self,
        target: Target,
        protocol: Protocol,
        error: String,
    ) -> anyhow::Result<()> {
        let status = if error.contains("timeout") {
            Status::Timeout
        } else {
            Status::Error
        };
        let outcome = ScanOutcome {
            target: target.view(),
            protocol,
            status,
            timestamp: now_iso8601(),
            tcp: TcpMeta {
                connect_ms: None,
                error: Some(error.clone()),
            },
            data: Default::default(),
            diagnostics: Some(Diagnostics {
                stage: "pipeline".into(),
                message: error,
            }),
        };
        self.emit(outcome).await
    }

    /// Closes the channel and waits until every queued outcome is written.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        drop(self.inner.tx.lock().await.take());
        let handle = self.inner.handle.lock().await.take();
        if let Some(handle) = handle {
            handle.await.context("output writer panicked")?;
        }
        Ok(())
    }
}
