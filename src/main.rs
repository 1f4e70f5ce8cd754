use anyhow::Context;
use clap::Parser;
use tls_grabber::cli::Cli;
use tls_grabber::engine::Engine;
use tls_grabber::output::OutputChannel;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = cli.into_config()?;

    let sink = OutputChannel::new(cfg.output.clone())?;
    let mut engine = Engine::new(cfg, sink.clone()).context("failed to start engine")?;
    engine.run().await?;
    sink.shutdown().await?;

    Ok(())
}
