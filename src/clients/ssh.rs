use async_trait::async_trait;

use super::{BoxedStream, Grabber};
use crate::conn::{Conn, ConnError};
use crate::model::Config;

pub(super) struct SshGrabber;

#[async_trait]
impl Grabber for SshGrabber {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn default_port(&self) -> u16 {
        22
    }

    async fn grab(&self, conn: &mut Conn<BoxedStream>, _cfg: &Config) -> Result<(), ConnError> {
        conn.ssh_handshake().await
    }
}
