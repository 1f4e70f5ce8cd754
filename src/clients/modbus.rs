use async_trait::async_trait;

use super::{BoxedStream, Grabber};
use crate::conn::{Conn, ConnError};
use crate::model::Config;

pub(super) struct ModbusGrabber;

#[async_trait]
impl Grabber for ModbusGrabber {
    fn name(&self) -> &'static str {
        "modbus"
    }

    fn default_port(&self) -> u16 {
        502
    }

    async fn grab(&self, conn: &mut Conn<BoxedStream>, _cfg: &Config) -> Result<(), ConnError> {
        conn.send_modbus_echo().await?;
        Ok(())
    }
}
