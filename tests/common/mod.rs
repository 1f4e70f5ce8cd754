#![allow(dead_code)]

use tls_grabber::tls::messages::{TYPE_CERTIFICATE, TYPE_SERVER_HELLO, TYPE_SERVER_HELLO_DONE};
use tls_grabber::tls::record::{
    encode_record, read_record, Record, CONTENT_ALERT, CONTENT_HANDSHAKE,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const TLS12: u16 = 0x0303;

pub fn handshake_msg(msg_type: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![msg_type];
    out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(body);
    out
}

/// ServerHello for TLS 1.2 with renegotiation_info and heartbeat extensions.
pub fn server_hello(suite: u16) -> Vec<u8> {
    let mut body = vec![0x03, 0x03];
    body.extend_from_slice(&[0x42; 32]);
    body.push(0);
    body.extend_from_slice(&suite.to_be_bytes());
    body.push(0);
    body.extend_from_slice(&[
        0x00, 0x0a, 0xff, 0x01, 0x00, 0x01, 0x00, 0x00, 0x0f, 0x00, 0x01, 0x01,
    ]);
    body
}

/// Hello, one certificate, done; all in a single record.
pub fn rsa_flight(suite: u16) -> Vec<u8> {
    let mut msgs = handshake_msg(TYPE_SERVER_HELLO, &server_hello(suite));
    msgs.extend(handshake_msg(TYPE_CERTIFICATE, &[0, 0, 6, 0, 0, 3, 0x30, 0x01, 0x00]));
    msgs.extend(handshake_msg(TYPE_SERVER_HELLO_DONE, &[]));
    let mut out = Vec::new();
    encode_record(&mut out, CONTENT_HANDSHAKE, TLS12, &msgs);
    out
}

pub fn fatal_alert(description: u8) -> Vec<u8> {
    let mut out = Vec::new();
    encode_record(&mut out, CONTENT_ALERT, 0x0301, &[2, description]);
    out
}

pub async fn read_client_hello<S: AsyncRead + Unpin>(stream: &mut S) -> Record {
    let record = read_record(stream).await.unwrap();
    assert_eq!(record.content_type, CONTENT_HANDSHAKE);
    record
}

/// Reads until `needle` has arrived.
pub async fn expect_line<S: AsyncRead + Unpin>(stream: &mut S, needle: &[u8]) {
    let mut seen = Vec::new();
    let mut buf = [0u8; 256];
    while !seen.windows(needle.len()).any(|w| w == needle) {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "peer closed before {:?}", String::from_utf8_lossy(needle));
        seen.extend_from_slice(&buf[..n]);
    }
}

pub async fn send<S: AsyncWrite + Unpin>(stream: &mut S, bytes: &[u8]) {
    stream.write_all(bytes).await.unwrap();
    stream.flush().await.unwrap();
}
