use crate::model::Protocol;

use super::banner::BannerGrabber;
use super::ftp::FtpGrabber;
use super::mail::{ImapGrabber, Pop3Grabber, SmtpGrabber};
use super::modbus::ModbusGrabber;
use super::ssh::SshGrabber;
use super::tls::TlsGrabber;
use super::Grabber;

static BANNER_GRABBER: BannerGrabber = BannerGrabber;
static FTP_GRABBER: FtpGrabber = FtpGrabber;
static IMAP_GRABBER: ImapGrabber = ImapGrabber;
static MODBUS_GRABBER: ModbusGrabber = ModbusGrabber;
static POP3_GRABBER: Pop3Grabber = Pop3Grabber;
static SMTP_GRABBER: SmtpGrabber = SmtpGrabber;
static SSH_GRABBER: SshGrabber = SshGrabber;
static TLS_GRABBER: TlsGrabber = TlsGrabber;

pub fn grabber_for(protocol: Protocol) -> &'static dyn Grabber {
    match protocol {
        Protocol::Banner => &BANNER_GRABBER,
        Protocol::Ftp => &FTP_GRABBER,
        Protocol::Imap => &IMAP_GRABBER,
        Protocol::Modbus => &MODBUS_GRABBER,
        Protocol::Pop3 => &POP3_GRABBER,
        Protocol::Smtp => &SMTP_GRABBER,
        Protocol::Ssh => &SSH_GRABBER,
        Protocol::Tls => &TLS_GRABBER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_protocol_has_a_grabber() {
        let cases = [
            (Protocol::Banner, "banner"),
            (Protocol::Ftp, "ftp"),
            (Protocol::Imap, "imap"),
            (Protocol::Modbus, "modbus"),
            (Protocol::Pop3, "pop3"),
            (Protocol::Smtp, "smtp"),
            (Protocol::Ssh, "ssh"),
            (Protocol::Tls, "tls"),
        ];
        for (protocol, name) in cases {
            assert_eq!(grabber_for(protocol).name(), name);
        }
        assert_eq!(grabber_for(Protocol::Tls).default_port(), 443);
    }
}
