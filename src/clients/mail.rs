use async_trait::async_trait;

use super::{maybe_heartbleed, BoxedStream, Grabber};
use crate::conn::{Conn, ConnError};
use crate::model::Config;

pub(super) struct SmtpGrabber;

#[async_trait]
impl Grabber for SmtpGrabber {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn default_port(&self) -> u16 {
        25
    }

    async fn grab(&self, conn: &mut Conn<BoxedStream>, cfg: &Config) -> Result<(), ConnError> {
        conn.smtp_banner().await?;
        if let Some(domain) = &cfg.mail.ehlo {
            conn.ehlo(domain).await?;
        }
        if cfg.mail.smtp_help {
            conn.smtp_help().await?;
        }
        if cfg.mail.starttls {
            let outcome = conn.smtp_starttls_handshake().await?;
            maybe_heartbleed(conn, cfg, outcome).await?;
        }
        Ok(())
    }
}

pub(super) struct Pop3Grabber;

#[async_trait]
impl Grabber for Pop3Grabber {
    fn name(&self) -> &'static str {
        "pop3"
    }

    fn default_port(&self) -> u16 {
        110
    }

    async fn grab(&self, conn: &mut Conn<BoxedStream>, cfg: &Config) -> Result<(), ConnError> {
        conn.pop3_banner().await?;
        if cfg.mail.starttls {
            let outcome = conn.pop3_starttls_handshake().await?;
            maybe_heartbleed(conn, cfg, outcome).await?;
        }
        Ok(())
    }
}

pub(super) struct ImapGrabber;

#[async_trait]
impl Grabber for ImapGrabber {
    fn name(&self) -> &'static str {
        "imap"
    }

    fn default_port(&self) -> u16 {
        143
    }

    async fn grab(&self, conn: &mut Conn<BoxedStream>, cfg: &Config) -> Result<(), ConnError> {
        conn.imap_banner().await?;
        if cfg.mail.starttls {
            let outcome = conn.imap_starttls_handshake().await?;
            maybe_heartbleed(conn, cfg, outcome).await?;
        }
        Ok(())
    }
}
