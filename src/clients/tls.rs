use async_trait::async_trait;

use super::{maybe_heartbleed, BoxedStream, Grabber};
use crate::conn::{Conn, ConnError};
use crate::model::Config;

pub(super) struct TlsGrabber;

#[async_trait]
impl Grabber for TlsGrabber {
    fn name(&self) -> &'static str {
        "tls"
    }

    fn default_port(&self) -> u16 {
        443
    }

    async fn grab(&self, conn: &mut Conn<BoxedStream>, cfg: &Config) -> Result<(), ConnError> {
        let outcome = conn.tls_handshake().await?;
        maybe_heartbleed(conn, cfg, outcome).await
    }
}
