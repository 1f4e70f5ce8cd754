mod banner;
mod ftp;
mod mail;
mod modbus;
mod registry;
mod ssh;
mod tls;

pub use registry::grabber_for;

use crate::conn::{Conn, ConnError, HandshakeOutcome};
use crate::model::Config;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream a scan runs over; TCP in production, in-memory in tests.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

pub type BoxedStream = Box<dyn Stream>;

/// The sequence of connection operations one scan module performs.
#[async_trait]
pub trait Grabber: Send + Sync {
    fn name(&self) -> &'static str;
    fn default_port(&self) -> u16;

    async fn grab(&self, conn: &mut Conn<BoxedStream>, cfg: &Config) -> Result<(), ConnError>;
}

/// Runs the Heartbleed probe when it was requested and a session exists.
pub(crate) async fn maybe_heartbleed(
    conn: &mut Conn<BoxedStream>,
    cfg: &Config,
    outcome: HandshakeOutcome,
) -> Result<(), ConnError> {
    if cfg.tls.heartbleed && outcome == HandshakeOutcome::Completed {
        conn.check_heartbleed().await?;
    }
    Ok(())
}
