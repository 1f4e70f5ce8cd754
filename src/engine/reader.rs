use crate::model::ReadStopReason;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Decides when a protocol response has been read in full.
pub trait Framing: Send + Sync {
    fn is_complete(&self, buf: &[u8]) -> bool;
}

/// Any response ending in CRLF.
pub struct LineFraming;

impl Framing for LineFraming {
    fn is_complete(&self, buf: &[u8]) -> bool {
        buf.ends_with(b"\r\n")
    }
}

/// SMTP/FTP style numeric replies: one `NNN text` line, or `NNN-` lines
/// closed by a final `NNN text` line.
pub struct NumericReply;

impl Framing for NumericReply {
    fn is_complete(&self, buf: &[u8]) -> bool {
        let Some(body) = buf.strip_suffix(b"\r\n") else {
            return false;
        };
        if is_final_reply_line(body) {
            return true;
        }
        if !(body.len() > 4 && has_code(body) && body[3] == b'-') {
            return false;
        }
        match body.windows(2).rposition(|w| w == b"\r\n") {
            Some(pos) => is_final_reply_line(&body[pos + 2..]),
            None => false,
        }
    }
}

fn has_code(line: &[u8]) -> bool {
    line.len() >= 3 && line[..3].iter().all(u8::is_ascii_digit)
}

fn is_final_reply_line(line: &[u8]) -> bool {
    line.len() >= 4
        && has_code(line)
        && line[3].is_ascii_whitespace()
        && !line[4..].contains(&b'\n')
}

/// POP3 responses: a single status line or a dot-terminated listing.
pub struct Pop3Reply;

impl Framing for Pop3Reply {
    fn is_complete(&self, buf: &[u8]) -> bool {
        buf.ends_with(b"\r\n.\r\n") || buf.ends_with(b"\r\n")
    }
}

/// IMAP command completion: untagged `*` lines may precede the tagged status
/// line, which ends the response.
pub struct TaggedReply<'a> {
    pub tag: &'a str,
}

impl Framing for TaggedReply<'_> {
    fn is_complete(&self, buf: &[u8]) -> bool {
        let Some(body) = buf.strip_suffix(b"\r\n") else {
            return false;
        };
        last_line(body).starts_with(self.tag.as_bytes())
            && last_line(body).get(self.tag.len()) == Some(&b' ')
    }
}

pub fn last_line(body: &[u8]) -> &[u8] {
    match body.windows(2).rposition(|w| w == b"\r\n") {
        Some(pos) => &body[pos + 2..],
        None => body,
    }
}

pub struct BannerReader {
    max_bytes: usize,
}

impl BannerReader {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Reads until `framing` accepts the buffer, the peer closes, or
    /// `max_bytes` have arrived.
    pub async fn read<T: AsyncRead + Unpin + ?Sized>(
        &mut self,
        stream: &mut T,
        framing: &dyn Framing,
    ) -> io::Result<ReadResult> {
        let mut buf = vec![0u8; self.max_bytes];
        let mut total = 0usize;
        let mut reason = ReadStopReason::ConnectionClosed;
        loop {
            let n = stream.read(&mut buf[total..]).await?;
            if n == 0 {
                break;
            }
            total += n;
            if framing.is_complete(&buf[..total]) {
                reason = ReadStopReason::Delimiter;
                break;
            }
            if total >= self.max_bytes {
                reason = ReadStopReason::SizeLimit;
                break;
            }
        }
        buf.truncate(total);
        Ok(ReadResult {
            truncated: reason == ReadStopReason::SizeLimit,
            bytes: buf,
            reason,
        })
    }

    /// A single read of whatever the peer has sent so far.
    pub async fn read_once<T: AsyncRead + Unpin + ?Sized>(
        &mut self,
        stream: &mut T,
    ) -> io::Result<ReadResult> {
        let mut buf = vec![0u8; self.max_bytes];
        let n = stream.read(&mut buf).await?;
        buf.truncate(n);
        Ok(ReadResult {
            reason: if n == 0 {
                ReadStopReason::ConnectionClosed
            } else {
                ReadStopReason::Delimiter
            },
            truncated: n == self.max_bytes,
            bytes: buf,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReadResult {
    pub bytes: Vec<u8>,
    pub reason: ReadStopReason,
    pub truncated: bool,
}

impl ReadResult {
    pub fn complete(&self) -> bool {
        self.reason == ReadStopReason::Delimiter
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
