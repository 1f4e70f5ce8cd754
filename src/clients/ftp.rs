use async_trait::async_trait;
use tracing::debug;

use super::{maybe_heartbleed, BoxedStream, Grabber};
use crate::conn::{Conn, ConnError};
use crate::model::Config;

pub(super) struct FtpGrabber;

#[async_trait]
impl Grabber for FtpGrabber {
    fn name(&self) -> &'static str {
        "ftp"
    }

    fn default_port(&self) -> u16 {
        21
    }

    async fn grab(&self, conn: &mut Conn<BoxedStream>, cfg: &Config) -> Result<(), ConnError> {
        conn.ftp_banner().await?;
        if !cfg.ftp_auth_tls {
            return Ok(());
        }
        match conn.ftps_handshake().await? {
            Some(outcome) => maybe_heartbleed(conn, cfg, outcome).await,
            None => {
                debug!(peer = conn.peer(), "server declined AUTH TLS and AUTH SSL");
                Ok(())
            }
        }
    }
}
