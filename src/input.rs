use crate::clients::grabber_for;
use crate::model::{Config, Target, TargetSpec};
use anyhow::Context;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::lookup_host;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Streams resolved targets from the single-target flags and the input file.
/// Lines without a port use the selected module's default port.
pub fn stream_targets(cfg: &Config) -> anyhow::Result<ReceiverStream<Target>> {
    let (tx, rx) = mpsc::channel(256);
    let default_port = grabber_for(cfg.protocol).default_port();

    if let Some(spec) = cfg.target.clone() {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(err) = resolve_and_send(spec, tx).await {
                tracing::warn!(error = %err, "failed to resolve target");
            }
        });
    }

    if let Some(path) = cfg.input.clone() {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(err) = read_file(path, default_port, tx).await {
                tracing::error!(error = %err, "failed to read input file");
            }
        });
    }

    drop(tx);
    Ok(ReceiverStream::new(rx))
}

async fn read_file(
    path: PathBuf,
    default_port: u16,
    tx: mpsc::Sender<Target>,
) -> anyhow::Result<()> {
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("cannot open input {}", path.display()))?;
    let mut reader = BufReader::new(file).lines();
    while let Some(line) = reader.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some(spec) = parse_target(trimmed, default_port) else {
            tracing::warn!(line = %trimmed, "skipping invalid target");
            continue;
        };
        if let Err(err) = resolve_and_send(spec, tx.clone()).await {
            tracing::warn!(line = %trimmed, error = %err, "failed to resolve target");
        }
    }
    Ok(())
}

/// Accepts `host`, `host:port`, `[v6]:port` and bare IPv6 addresses.
fn parse_target(line: &str, default_port: u16) -> Option<TargetSpec> {
    if let Some(rest) = line.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = match tail.strip_prefix(':') {
            Some(port) => port.parse().ok()?,
            None if tail.is_empty() => default_port,
            None => return None,
        };
        return Some(TargetSpec {
            host: host.to_string(),
            port,
        });
    }

    match line.split_once(':') {
        Some((host, port)) if !port.contains(':') => Some(TargetSpec {
            host: host.trim().to_string(),
            port: port.parse().ok()?,
        }),
        _ if line.parse::<std::net::Ipv6Addr>().is_ok() || !line.contains(':') => {
            Some(TargetSpec {
                host: line.to_string(),
                port: default_port,
            })
        }
        _ => None,
    }
}

async fn resolve_and_send(spec: TargetSpec, tx: mpsc::Sender<Target>) -> anyhow::Result<()> {
    let lookup = lookup_host((spec.host.as_str(), spec.port))
        .await
        .with_context(|| format!("cannot resolve {}", spec.host))?;
    for addr in lookup {
        let target = Target {
            original: spec.clone(),
            resolved: addr,
        };
        tx.send(target).await.ok();
    }
    Ok(())
}
