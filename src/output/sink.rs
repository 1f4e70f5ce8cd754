use crate::conn::GrabData;
use crate::model::{OutputConfig, OutputFormat, ScanOutcome, Status};
use crate::util::hex::to_hex;
use crate::util::sanitize_text;
use serde::Serialize;
use std::io::{BufWriter, Write};

pub struct OutputSink<W: Write> {
    cfg: OutputConfig,
    writer: BufWriter<W>,
}

/// One JSON line per target.
#[derive(Serialize)]
struct StandardizedOutcome<'a> {
    ip: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
    timestamp: &'a str,
    port: u16,
    proto: String,
    status: Status,
    data: &'a GrabData,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    connect_ms: Option<u128>,
}

impl<W: Write> OutputSink<W> {
    pub fn new(cfg: OutputConfig, writer: W) -> Self {
        Self {
            cfg,
            writer: BufWriter::new(writer),
        }
    }

    pub fn write_outcome(&mut self, outcome: &ScanOutcome) -> anyhow::Result<()> {
        match self.cfg.format {
            OutputFormat::Jsonl => {
                let domain = (outcome.target.host != outcome.target.addr)
                    .then_some(outcome.target.host.as_str());
                let formatted = StandardizedOutcome {
                    ip: &outcome.target.addr,
                    domain,
                    timestamp: &outcome.timestamp,
                    port: outcome.target.port,
                    proto: outcome.protocol.to_string(),
                    status: outcome.status,
                    data: &outcome.data,
                    error: outcome.diagnostics.as_ref().map(|d| d.message.as_str()),
                    connect_ms: outcome.tcp.connect_ms,
                };
                let line = serde_json::to_string(&formatted)?;
                writeln!(self.writer, "{line}")?;
            }
            OutputFormat::Pretty => self.write_pretty(outcome)?,
        }
        self.writer.flush()?;
        Ok(())
    }

    fn write_pretty(&mut self, outcome: &ScanOutcome) -> anyhow::Result<()> {
        writeln!(
            self.writer,
            "{} {} [{}] -> {}",
            outcome.target.host,
            outcome.target.port,
            outcome.protocol,
            outcome.status_text()
        )?;
        let data = &outcome.data;
        if let Some(banner) = &data.banner {
            writeln!(self.writer, "  banner: {}", sanitize_text(banner.trim_end().as_bytes()))?;
        }
        if let Some(response) = &data.starttls {
            writeln!(self.writer, "  starttls: {}", sanitize_text(response.trim_end().as_bytes()))?;
        }
        if let Some(log) = &data.tls_handshake {
            if let Some(hello) = &log.server_hello {
                writeln!(
                    self.writer,
                    "  tls: {} cipher 0x{:04x}",
                    hello.version, hello.cipher_suite
                )?;
                if !hello.session_id.is_empty() {
                    writeln!(self.writer, "  session id: {}", to_hex(&hello.session_id))?;
                }
            }
            if let Some(certs) = &log.server_certificates {
                writeln!(self.writer, "  certificates: {}", certs.certificates.len())?;
            }
            if let Some(params) = log.dh_export_params().or(log.dh_params()) {
                writeln!(self.writer, "  dh prime: {} bits", params.prime_bits())?;
            }
        }
        if let Some(hb) = &data.heartbleed {
            writeln!(
                self.writer,
                "  heartbleed: enabled={} vulnerable={}",
                hb.heartbeat_enabled, hb.vulnerable
            )?;
        }
        if let Some(ident) = data.ssh.as_ref().and_then(|ssh| ssh.server_id.as_ref()) {
            writeln!(self.writer, "  ssh: {}", ident.raw)?;
        }
        if let Some(diag) = &outcome.diagnostics {
            writeln!(self.writer, "  diagnostics: [{}] {}", diag.stage, diag.message)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) {
        let _ = self.writer.flush();
    }
}

impl ScanOutcome {
    fn status_text(&self) -> &'static str {
        match self.status {
            Status::Success => "success",
            Status::Timeout => "timeout",
            Status::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Diagnostics, Protocol, TargetView, TcpMeta};

    fn outcome() -> ScanOutcome {
        ScanOutcome {
            target: TargetView {
                host: "mx.example.net".into(),
                addr: "192.0.2.10".into(),
                port: 25,
            },
            protocol: Protocol::Smtp,
            status: Status::Error,
            timestamp: "2024-01-01T00:00:00.000Z".into(),
            tcp: TcpMeta {
                connect_ms: Some(3),
                error: None,
            },
            data: GrabData {
                banner: Some("220 mx ESMTP\r\n".into()),
                error_component: Some("starttls"),
                ..Default::default()
            },
            diagnostics: Some(Diagnostics {
                stage: "starttls".into(),
                message: "server did not indicate support for smtp STARTTLS".into(),
            }),
        }
    }

    #[test]
    fn jsonl_line_carries_grab_data() {
        let mut buf = Vec::new();
        let cfg = OutputConfig {
            format: OutputFormat::Jsonl,
        };
        OutputSink::new(cfg, &mut buf).write_outcome(&outcome()).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["ip"], "192.0.2.10");
        assert_eq!(value["domain"], "mx.example.net");
        assert_eq!(value["proto"], "smtp");
        assert_eq!(value["status"], "error");
        assert_eq!(value["data"]["banner"], "220 mx ESMTP\r\n");
        assert_eq!(value["data"]["error_component"], "starttls");
        assert!(value["data"].get("tls").is_none());
    }

    #[test]
    fn pretty_output_is_readable() {
        let mut buf = Vec::new();
        let cfg = OutputConfig {
            format: OutputFormat::Pretty,
        };
        OutputSink::new(cfg, &mut buf).write_outcome(&outcome()).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("mx.example.net 25 [smtp] -> error"));
        assert!(text.contains("  banner: 220 mx ESMTP\n"));
        assert!(text.contains("diagnostics: [starttls]"));
    }
}
