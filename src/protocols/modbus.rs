//! Modbus/TCP framing for the device-identification probe.

use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::util::b64;

pub const FUNCTION_ENCAPSULATED_INTERFACE: u8 = 0x2b;
const MEI_READ_DEVICE_ID: u8 = 0x0e;
const MAX_FRAME: u16 = 260;

#[derive(Debug, thiserror::Error)]
pub enum ModbusError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid MBAP length {0}")]
    BadLength(u16),

    #[error("unexpected protocol id {0}")]
    BadProtocol(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusRequest {
    pub transaction_id: u16,
    pub unit_id: u8,
    pub function: u8,
    pub data: Vec<u8>,
}

impl ModbusRequest {
    /// Read Device Identification, basic objects, starting at object 0.
    pub fn device_identification() -> Self {
        Self {
            transaction_id: 0x5a47,
            unit_id: 0,
            function: FUNCTION_ENCAPSULATED_INTERFACE,
            data: vec![MEI_READ_DEVICE_ID, 0x01, 0x00],
        }
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.data.len());
        out.extend_from_slice(&self.transaction_id.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&((self.data.len() + 2) as u16).to_be_bytes());
        out.push(self.unit_id);
        out.push(self.function);
        out.extend_from_slice(&self.data);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusResponse {
    pub length: u16,
    pub unit_id: u8,
    pub function: u8,
    pub data: Vec<u8>,
}

pub async fn read_response<S>(stream: &mut S) -> Result<ModbusResponse, ModbusError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 7];
    stream.read_exact(&mut header).await?;
    let protocol = u16::from_be_bytes([header[2], header[3]]);
    let length = u16::from_be_bytes([header[4], header[5]]);
    if protocol != 0 {
        return Err(ModbusError::BadProtocol(protocol));
    }
    if !(2..=MAX_FRAME).contains(&length) {
        return Err(ModbusError::BadLength(length));
    }
    let mut pdu = vec![0u8; length as usize - 1];
    stream.read_exact(&mut pdu).await?;
    Ok(ModbusResponse {
        length,
        unit_id: header[6],
        function: pdu[0],
        data: pdu[1..].to_vec(),
    })
}

pub async fn write_request<S>(stream: &mut S, req: &ModbusRequest) -> io::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    stream.write_all(&req.marshal()).await?;
    stream.flush().await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceObject {
    pub id: u8,
    pub name: &'static str,
    pub value: String,
}

fn object_name(id: u8) -> &'static str {
    match id {
        0x00 => "vendor",
        0x01 => "product_code",
        0x02 => "revision",
        0x03 => "vendor_url",
        0x04 => "product_name",
        0x05 => "model_name",
        0x06 => "user_application_name",
        _ => "",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeiResponse {
    pub conformity_level: u8,
    pub more_follows: bool,
    pub next_object_id: u8,
    pub objects: Vec<DeviceObject>,
}

impl MeiResponse {
    pub fn parse(data: &[u8]) -> Option<MeiResponse> {
        let [MEI_READ_DEVICE_ID, _code, conformity, more, next, count, rest @ ..] = data else {
            return None;
        };
        let mut objects = Vec::with_capacity(*count as usize);
        let mut rest = rest;
        for _ in 0..*count {
            let [id, len, tail @ ..] = rest else {
                break;
            };
            let Some(value) = tail.get(..*len as usize) else {
                break;
            };
            objects.push(DeviceObject {
                id: *id,
                name: object_name(*id),
                value: String::from_utf8_lossy(value).into_owned(),
            });
            rest = &tail[*len as usize..];
        }
        Some(MeiResponse {
            conformity_level: *conformity,
            more_follows: *more == 0xff,
            next_object_id: *next,
            objects,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModbusEvent {
    pub length: u16,
    pub unit_id: u8,
    pub function: u8,
    #[serde(serialize_with = "b64::serialize")]
    pub response: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mei_response: Option<MeiResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<u8>,
}

impl From<ModbusResponse> for ModbusEvent {
    fn from(res: ModbusResponse) -> Self {
        let exception = (res.function & 0x80 != 0).then(|| res.data.first().copied().unwrap_or(0));
        let mei_response = if res.function == FUNCTION_ENCAPSULATED_INTERFACE {
            MeiResponse::parse(&res.data)
        } else {
            None
        };
        ModbusEvent {
            length: res.length,
            unit_id: res.unit_id,
            function: res.function,
            response: res.data,
            mei_response,
            exception,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::hex::from_hex;

    #[test]
    fn encodes_device_id_request() {
        let bytes = ModbusRequest::device_identification().marshal();
        assert_eq!(bytes, from_hex("5a47 0000 0005 00 2b 0e0100").unwrap());
    }

    #[tokio::test]
    async fn decodes_device_identification() {
        let frame = from_hex(
            "5a47 0000 0018 00 2b 0e 01 01 00 00 02 \
             00 05 536965 6d6e \
             01 07 3645533720 3331",
        )
        .unwrap();
        let mut data: &[u8] = &frame;
        let event = ModbusEvent::from(read_response(&mut data).await.unwrap());
        let mei = event.mei_response.unwrap();
        assert_eq!(mei.objects.len(), 2);
        assert_eq!(mei.objects[0].name, "vendor");
        assert_eq!(mei.objects[0].value, "Siemn");
        assert_eq!(mei.objects[1].value, "6ES7 31");
        assert!(event.exception.is_none());
    }

    #[tokio::test]
    async fn records_exception_code() {
        let frame = from_hex("5a47 0000 0003 01 ab 01").unwrap();
        let mut data: &[u8] = &frame;
        let event = ModbusEvent::from(read_response(&mut data).await.unwrap());
        assert_eq!(event.exception, Some(1));
        assert!(event.mei_response.is_none());
    }

    #[tokio::test]
    async fn rejects_non_modbus_protocol() {
        let mut data: &[u8] = b"HTTP/1.1 400";
        assert!(matches!(
            read_response(&mut data).await,
            Err(ModbusError::BadProtocol(_))
        ));
    }
}
