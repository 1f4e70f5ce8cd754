use crate::model::{
    Config, MailConfig, OutputConfig, OutputFormat, Protocol, TargetSpec, TlsScanConfig,
};
use crate::protocols::ssh::SshScanConfig;
use crate::tls::{self, PolicyFlags};
use clap::{ArgAction, Args, Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(author, version, about = "Async TLS and STARTTLS handshake grabber", long_about = None)]
pub struct Cli {
    /// Single host to scan
    #[arg(short = 'H', long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Single port to scan (defaults to the module's port)
    #[arg(short = 'p', long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// File containing targets (one per line)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Scan module to run against each target
    #[arg(short = 'm', long = "module", default_value = "tls")]
    pub protocol: Protocol,

    /// Concurrency limit
    #[arg(long = "concurrency", default_value_t = 64)]
    pub concurrency: usize,

    /// New connections per second (token bucket fill rate)
    #[arg(long = "rate", default_value_t = 64)]
    pub rate: u32,

    /// Connect timeout in milliseconds
    #[arg(long = "connect-timeout", default_value_t = 1500)]
    pub connect_timeout_ms: u64,

    /// I/O deadline per connection in milliseconds
    #[arg(long = "read-timeout", default_value_t = 5000)]
    pub read_timeout_ms: u64,

    /// Overall timeout per target in milliseconds
    #[arg(long = "overall-timeout", default_value_t = 10000)]
    pub overall_timeout_ms: u64,

    #[command(flatten)]
    pub tls: TlsArgs,

    #[command(flatten)]
    pub ciphers: CipherArgs,

    /// Send STARTTLS (SMTP, POP3, IMAP) or AUTH TLS (FTP) before the handshake
    #[arg(long = "starttls", action = ArgAction::SetTrue)]
    pub starttls: bool,

    /// Send EHLO with this domain after the SMTP banner
    #[arg(long = "ehlo", value_name = "DOMAIN")]
    pub ehlo: Option<String>,

    /// Send HELP after the SMTP banner
    #[arg(long = "smtp-help", action = ArgAction::SetTrue)]
    pub smtp_help: bool,

    /// Identification string sent to SSH servers
    #[arg(long = "ssh-client-id", value_name = "ID")]
    pub ssh_client_id: Option<String>,

    /// Output format
    #[arg(long = "output", default_value_t = OutputFormat::Jsonl)]
    pub output: OutputFormat,

    /// Enable pretty output instead of JSONL
    #[arg(long = "pretty", action = ArgAction::SetTrue)]
    pub pretty: bool,
}

#[derive(Debug, Args)]
pub struct TlsArgs {
    /// Highest protocol version to offer
    #[arg(long = "tls-version", default_value_t = TlsVersionArg::Tls12)]
    pub max_version: TlsVersionArg,

    /// Server name to send in SNI (defaults to the target host name)
    #[arg(long = "domain", value_name = "NAME")]
    pub domain: Option<String>,

    /// Do not send the server_name extension
    #[arg(long = "no-sni", action = ArgAction::SetTrue)]
    pub no_sni: bool,

    /// Offer the extended_random extension
    #[arg(long = "extended-random", action = ArgAction::SetTrue)]
    pub extended_random: bool,

    /// Send a Heartbleed probe after the handshake
    #[arg(long = "heartbleed", action = ArgAction::SetTrue)]
    pub heartbleed: bool,

    /// PEM bundle of roots to check presented chains against
    #[arg(long = "ca-file", value_name = "FILE")]
    pub ca_file: Option<PathBuf>,
}

/// Cipher suite selection; at most one may be given.
#[derive(Debug, Args)]
pub struct CipherArgs {
    #[arg(long = "dhe-only", action = ArgAction::SetTrue)]
    pub dhe_only: bool,
    #[arg(long = "export-only", action = ArgAction::SetTrue)]
    pub export_only: bool,
    #[arg(long = "export-dhe-only", action = ArgAction::SetTrue)]
    pub export_dhe_only: bool,
    #[arg(long = "chrome-ciphers", action = ArgAction::SetTrue)]
    pub chrome: bool,
    #[arg(long = "chrome-no-dhe-ciphers", action = ArgAction::SetTrue)]
    pub chrome_no_dhe: bool,
    #[arg(long = "firefox-ciphers", action = ArgAction::SetTrue)]
    pub firefox: bool,
    #[arg(long = "firefox-no-dhe-ciphers", action = ArgAction::SetTrue)]
    pub firefox_no_dhe: bool,
    #[arg(long = "safari-ciphers", action = ArgAction::SetTrue)]
    pub safari: bool,
    #[arg(long = "safari-no-dhe-ciphers", action = ArgAction::SetTrue)]
    pub safari_no_dhe: bool,
}

impl CipherArgs {
    fn flags(&self) -> PolicyFlags {
        PolicyFlags {
            dhe_only: self.dhe_only,
            export_only: self.export_only,
            export_dhe_only: self.export_dhe_only,
            chrome: self.chrome,
            chrome_no_dhe: self.chrome_no_dhe,
            firefox: self.firefox,
            firefox_no_dhe: self.firefox_no_dhe,
            safari: self.safari,
            safari_no_dhe: self.safari_no_dhe,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum TlsVersionArg {
    #[value(name = "ssl3")]
    Ssl3,
    #[value(name = "tls1.0")]
    Tls10,
    #[value(name = "tls1.1")]
    Tls11,
    #[value(name = "tls1.2")]
    Tls12,
}

impl TlsVersionArg {
    fn wire(self) -> u16 {
        match self {
            TlsVersionArg::Ssl3 => tls::VERSION_SSL30,
            TlsVersionArg::Tls10 => tls::VERSION_TLS10,
            TlsVersionArg::Tls11 => tls::VERSION_TLS11,
            TlsVersionArg::Tls12 => tls::VERSION_TLS12,
        }
    }
}

impl fmt::Display for TlsVersionArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsVersionArg::Ssl3 => write!(f, "ssl3"),
            TlsVersionArg::Tls10 => write!(f, "tls1.0"),
            TlsVersionArg::Tls11 => write!(f, "tls1.1"),
            TlsVersionArg::Tls12 => write!(f, "tls1.2"),
        }
    }
}

impl Cli {
    pub fn into_config(self) -> anyhow::Result<Config> {
        if self.host.is_none() && self.input.is_none() {
            anyhow::bail!("either --host or --input is required");
        }

        if self.host.is_some() && self.input.is_some() {
            anyhow::bail!("--host/--port and --input are mutually exclusive");
        }

        if self.port.is_some() && self.host.is_none() {
            anyhow::bail!("--port requires --host");
        }

        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than zero");
        }

        if self.rate == 0 {
            anyhow::bail!("rate must be greater than zero");
        }

        let flags = self.ciphers.flags();
        if flags.selected() > 1 {
            anyhow::bail!("at most one cipher suite option may be given");
        }

        let default_port = crate::clients::grabber_for(self.protocol).default_port();
        let target = self.host.map(|host| TargetSpec {
            host,
            port: self.port.unwrap_or(default_port),
        });

        let mut ssh = SshScanConfig::default();
        if let Some(id) = self.ssh_client_id {
            ssh.client_id = id;
        }

        Ok(Config {
            target,
            input: self.input,
            concurrency: self.concurrency,
            rate: self.rate,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            overall_timeout: Duration::from_millis(self.overall_timeout_ms),
            protocol: self.protocol,
            tls: TlsScanConfig {
                max_version: self.tls.max_version.wire(),
                domain: self.tls.domain,
                no_sni: self.tls.no_sni,
                extended_random: self.tls.extended_random,
                policy: flags.resolve(),
                heartbleed: self.tls.heartbleed,
                ca_file: self.tls.ca_file,
            },
            mail: MailConfig {
                starttls: self.starttls,
                ehlo: self.ehlo,
                smtp_help: self.smtp_help,
            },
            ftp_auth_tls: self.starttls,
            ssh,
            output: OutputConfig {
                format: if self.pretty {
                    OutputFormat::Pretty
                } else {
                    self.output
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::{Browser, CipherPolicy};

    fn parse(args: &[&str]) -> anyhow::Result<Config> {
        let mut argv = vec!["tls-grabber"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)?.into_config()
    }

    #[test]
    fn single_target_uses_module_port() {
        let cfg = parse(&["-H", "mail.example.org", "-m", "smtp", "--starttls"]).unwrap();
        let target = cfg.target.unwrap();
        assert_eq!(target.port, 25);
        assert_eq!(cfg.protocol, Protocol::Smtp);
        assert!(cfg.mail.starttls);
        assert_eq!(cfg.tls.policy, CipherPolicy::Default);
        assert_eq!(cfg.tls.max_version, tls::VERSION_TLS12);
    }

    #[test]
    fn policy_flag_selects_suites() {
        let cfg = parse(&["-H", "192.0.2.1", "--safari-no-dhe-ciphers", "--tls-version", "tls1.0"])
            .unwrap();
        assert_eq!(cfg.tls.policy, CipherPolicy::Browser(Browser::SafariNoDhe));
        assert_eq!(cfg.tls.max_version, tls::VERSION_TLS10);
    }

    #[test]
    fn rejects_conflicting_policy_flags() {
        let err = parse(&["-H", "192.0.2.1", "--dhe-only", "--export-only"]).unwrap_err();
        assert!(err.to_string().contains("at most one cipher suite option"));
    }

    #[test]
    fn rejects_missing_or_mixed_targets() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["-H", "a.example", "-i", "targets.txt"]).is_err());
        assert!(parse(&["-p", "443", "-i", "targets.txt"]).is_err());
    }

    #[test]
    fn module_aliases_and_pretty_output() {
        let cfg = parse(&[
            "-H",
            "192.0.2.1",
            "-m",
            "https",
            "--pretty",
            "--ssh-client-id",
            "SSH-2.0-x",
        ])
        .unwrap();
        assert_eq!(cfg.protocol, Protocol::Tls);
        assert_eq!(cfg.output.format, OutputFormat::Pretty);
        assert_eq!(cfg.ssh.client_id, "SSH-2.0-x");
    }
}
