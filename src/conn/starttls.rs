//! Per-protocol STARTTLS negotiation strategies.

use crate::engine::reader::{last_line, Framing, NumericReply, Pop3Reply, TaggedReply};

/// One in-band upgrade dialect: the command to send, how its response is
/// framed, and which responses mean "go ahead".
pub trait StartTls: Send + Sync {
    fn protocol(&self) -> &'static str;
    fn command(&self) -> Vec<u8>;
    fn buffer_size(&self) -> usize;
    fn framing(&self) -> Box<dyn Framing + '_>;
    fn accepts(&self, response: &[u8]) -> bool;
}

pub struct Smtp;

impl StartTls for Smtp {
    fn protocol(&self) -> &'static str {
        "smtp"
    }

    fn command(&self) -> Vec<u8> {
        b"STARTTLS\r\n".to_vec()
    }

    fn buffer_size(&self) -> usize {
        256
    }

    fn framing(&self) -> Box<dyn Framing + '_> {
        Box::new(NumericReply)
    }

    fn accepts(&self, response: &[u8]) -> bool {
        if response.len() < 5 || !matches!(response[3], b' ' | b'-') {
            return false;
        }
        std::str::from_utf8(&response[..3])
            .ok()
            .and_then(|code| code.parse::<u16>().ok())
            .is_some_and(|code| (200..300).contains(&code))
    }
}

pub struct Pop3;

impl StartTls for Pop3 {
    fn protocol(&self) -> &'static str {
        "pop3"
    }

    fn command(&self) -> Vec<u8> {
        b"STLS\r\n".to_vec()
    }

    fn buffer_size(&self) -> usize {
        512
    }

    fn framing(&self) -> Box<dyn Framing + '_> {
        Box::new(Pop3Reply)
    }

    fn accepts(&self, response: &[u8]) -> bool {
        response.starts_with(b"+")
    }
}

pub struct Imap {
    pub tag: String,
}

impl Default for Imap {
    fn default() -> Self {
        Self { tag: "a001".into() }
    }
}

impl StartTls for Imap {
    fn protocol(&self) -> &'static str {
        "imap"
    }

    fn command(&self) -> Vec<u8> {
        format!("{} STARTTLS\r\n", self.tag).into_bytes()
    }

    fn buffer_size(&self) -> usize {
        512
    }

    fn framing(&self) -> Box<dyn Framing + '_> {
        Box::new(TaggedReply { tag: &self.tag })
    }

    /// The tagged status line must read `<tag> OK`.
    fn accepts(&self, response: &[u8]) -> bool {
        let body = response.strip_suffix(b"\r\n").unwrap_or(response);
        let expected = format!("{} OK", self.tag);
        last_line(body).starts_with(expected.as_bytes())
    }
}
