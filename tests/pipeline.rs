mod common;

use common::*;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tls_grabber::engine::Engine;
use tls_grabber::model::{
    Config, MailConfig, OutputConfig, OutputFormat, Protocol, TargetSpec, TlsScanConfig,
};
use tls_grabber::output::OutputChannel;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn config(port: u16, protocol: Protocol) -> Config {
    Config {
        target: Some(TargetSpec {
            host: "127.0.0.1".into(),
            port,
        }),
        input: None,
        concurrency: 1,
        rate: 10,
        connect_timeout: Duration::from_millis(500),
        read_timeout: Duration::from_millis(1000),
        overall_timeout: Duration::from_millis(2000),
        protocol,
        tls: TlsScanConfig::default(),
        mail: MailConfig::default(),
        ftp_auth_tls: false,
        ssh: Default::default(),
        output: OutputConfig {
            format: OutputFormat::Jsonl,
        },
    }
}

async fn run(cfg: Config) -> serde_json::Value {
    let buf = SharedBuf::default();
    let sink = OutputChannel::with_writer(cfg.output.clone(), buf.clone()).unwrap();
    let mut engine = Engine::new(cfg, sink.clone()).unwrap();
    engine.run().await.unwrap();
    sink.shutdown().await.unwrap();

    let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
    let mut lines = text.lines();
    let line = lines.next().expect("one outcome");
    assert!(lines.next().is_none());
    serde_json::from_str(line).unwrap()
}

#[tokio::test]
async fn smtp_starttls_scan_emits_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        send(&mut socket, b"220 mx.example.net ESMTP\r\n").await;
        expect_line(&mut socket, b"STARTTLS\r\n").await;
        send(&mut socket, b"220 2.0.0 Ready to start TLS\r\n").await;
        read_client_hello(&mut socket).await;
        send(&mut socket, &rsa_flight(0x002f)).await;
        let mut rest = Vec::new();
        let _ = tokio::io::AsyncReadExt::read_to_end(&mut socket, &mut rest).await;
    });

    let mut cfg = config(addr.port(), Protocol::Smtp);
    cfg.mail.starttls = true;
    let value = run(cfg).await;

    assert_eq!(value["proto"], "smtp");
    assert_eq!(value["status"], "success");
    assert_eq!(value["port"], addr.port());
    let tls = &value["data"]["tls"];
    assert_eq!(tls["server_hello"]["cipher_suite"], 0x002f);
    assert_eq!(tls["server_hello"]["version"]["name"], "TLSv1.2");
    assert_eq!(tls["server_certificates"]["certificates"][0], "MAEA");
    assert!(tls["server_finished"].is_null());
}

#[tokio::test]
async fn refused_connection_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let value = run(config(port, Protocol::Tls)).await;
    assert_eq!(value["status"], "error");
    assert!(value["error"].as_str().unwrap().contains("connect"));
}

#[tokio::test]
async fn ssh_scan_records_server_ident() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        send(&mut socket, b"SSH-2.0-OpenSSH_9.6\r\n").await;
        expect_line(&mut socket, b"\r\n").await;
    });

    let value = run(config(addr.port(), Protocol::Ssh)).await;
    assert_eq!(value["data"]["ssh"]["server_id"]["software_version"], "OpenSSH_9.6");
    assert_eq!(value["data"]["error_component"], "ssh");
}
