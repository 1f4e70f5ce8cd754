use async_trait::async_trait;

use super::{BoxedStream, Grabber};
use crate::conn::{Conn, ConnError};
use crate::model::Config;

pub(super) struct BannerGrabber;

#[async_trait]
impl Grabber for BannerGrabber {
    fn name(&self) -> &'static str {
        "banner"
    }

    fn default_port(&self) -> u16 {
        80
    }

    async fn grab(&self, conn: &mut Conn<BoxedStream>, _cfg: &Config) -> Result<(), ConnError> {
        conn.basic_banner().await?;
        Ok(())
    }
}
