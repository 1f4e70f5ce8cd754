pub mod rate;
pub mod reader;

use crate::clients::{grabber_for, BoxedStream};
use crate::conn::{Conn, ConnConfig};
use crate::model::{Config, Diagnostics, ScanOutcome, Status, Target, TcpMeta};
use crate::output::OutputChannel;
use crate::tls::CaPool;
use crate::util::now_iso8601;
use anyhow::Context;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use rate::RateLimiter;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

pub struct Engine {
    cfg: Arc<Config>,
    ca_pool: Option<Arc<CaPool>>,
    sink: OutputChannel,
    limiter: RateLimiter,
    sem: Arc<Semaphore>,
}

impl Engine {
    pub fn new(cfg: Config, sink: OutputChannel) -> anyhow::Result<Self> {
        let ca_pool = match &cfg.tls.ca_file {
            Some(path) => {
                let pem = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read CA file {}", path.display()))?;
                let pool = CaPool::from_pem(&pem)
                    .with_context(|| format!("cannot parse CA file {}", path.display()))?;
                info!(roots = pool.len(), "loaded CA pool");
                Some(Arc::new(pool))
            }
            None => None,
        };
        Ok(Self {
            limiter: RateLimiter::new(cfg.rate),
            sem: Arc::new(Semaphore::new(cfg.concurrency)),
            cfg: Arc::new(cfg),
            ca_pool,
            sink,
        })
    }

    #[instrument(skip(self), fields(protocol = %self.cfg.protocol))]
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut stream = crate::input::stream_targets(&self.cfg)?;
        let mut tasks = FuturesUnordered::new();

        while let Some(target) = stream.next().await {
            self.limiter.acquire().await;
            let permit = self.sem.clone().acquire_owned().await?;
            let cfg = self.cfg.clone();
            let ca_pool = self.ca_pool.clone();
            let sink = self.sink.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let res = timeout(
                    cfg.overall_timeout,
                    process_target(target.clone(), &cfg, ca_pool),
                )
                .await;
                let emitted = match res {
                    Ok(Ok(outcome)) => sink.emit(outcome).await,
                    Ok(Err(err)) => {
                        sink.emit_error(target, cfg.protocol, format!("{err:#}"))
                            .await
                    }
                    Err(_) => {
                        sink.emit_error(target, cfg.protocol, "overall timeout".to_string())
                            .await
                    }
                };
                if let Err(err) = emitted {
                    tracing::warn!(error = %err, "dropped scan outcome");
                }
            }));

            self.limiter.sleep_jitter().await;
        }

        while tasks.next().await.is_some() {}
        Ok(())
    }
}

/// Connection settings for one target. SNI falls back to the target host
/// when it is a name rather than an address.
pub fn conn_config(target: &Target, cfg: &Config, ca_pool: Option<Arc<CaPool>>) -> ConnConfig {
    let domain = match &cfg.tls.domain {
        Some(domain) => domain.clone(),
        None if target.original.host.parse::<std::net::IpAddr>().is_err() => {
            target.original.host.clone()
        }
        None => String::new(),
    };
    ConnConfig {
        domain,
        ca_pool,
        max_version: cfg.tls.max_version,
        policy: cfg.tls.policy,
        no_sni: cfg.tls.no_sni,
        extended_random: cfg.tls.extended_random,
        ssh: cfg.ssh.clone(),
    }
}

async fn process_target(
    target: Target,
    cfg: &Config,
    ca_pool: Option<Arc<CaPool>>,
) -> anyhow::Result<ScanOutcome> {
    let start = Instant::now();
    let connect_result = timeout(cfg.connect_timeout, TcpStream::connect(target.resolved)).await;

    let (stream, tcp_meta) = match connect_result {
        Ok(Ok(stream)) => (
            stream,
            TcpMeta {
                connect_ms: Some(start.elapsed().as_millis()),
                error: None,
            },
        ),
        Ok(Err(err)) => {
            return Err(err).with_context(|| format!("connect to {}", target.resolved));
        }
        Err(_) => {
            let meta = TcpMeta {
                connect_ms: None,
                error: Some("connect timeout".into()),
            };
            return Ok(outcome(&target, cfg, Status::Timeout, meta, Default::default(), None));
        }
    };

    let mut conn = Conn::new(
        Box::new(stream) as BoxedStream,
        target.resolved.to_string(),
        conn_config(&target, cfg, ca_pool),
    );
    conn.set_deadline(Some(tokio::time::Instant::now() + cfg.read_timeout));

    let grabber = grabber_for(cfg.protocol);
    let result = grabber.grab(&mut conn, cfg).await;
    if let Err(err) = conn.close().await {
        debug!(target = %target.resolved, error = %err, "close failed");
    }

    let (status, diagnostics) = match &result {
        Ok(()) => (Status::Success, None),
        Err(err) => {
            let status = if err.is_timeout() {
                Status::Timeout
            } else {
                Status::Error
            };
            let diag = Diagnostics {
                stage: err.component().to_string(),
                message: err.to_string(),
            };
            (status, Some(diag))
        }
    };
    debug!(
        target = %target.resolved,
        module = grabber.name(),
        ms = start.elapsed().as_millis() as u64,
        "processed target"
    );

    Ok(outcome(
        &target,
        cfg,
        status,
        tcp_meta,
        conn.into_grab_data(),
        diagnostics,
    ))
}

fn outcome(
    target: &Target,
    cfg: &Config,
    status: Status,
    tcp: TcpMeta,
    data: crate::conn::GrabData,
    diagnostics: Option<Diagnostics>,
) -> ScanOutcome {
    ScanOutcome {
        target: target.view(),
        protocol: cfg.protocol,
        status,
        timestamp: now_iso8601(),
        tcp,
        data,
        diagnostics,
    }
}
