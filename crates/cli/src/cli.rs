//! Argument definitions and dispatch

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

use sipprobe_message::{CallContext, ProbeMode, Target, DEFAULT_PLAIN_PORT};

use crate::commands;
use crate::logging::{parse_log_level, setup_logging, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "sipprobe", version)]
#[command(about = "Send one SIP INVITE or OPTIONS over TCP or TLS and show the exchange")]
pub struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "SIPPROBE_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Include file and line numbers in logs
    #[arg(long, global = true)]
    pub log_file_info: bool,

    /// Log span open and close events
    #[arg(long, global = true)]
    pub log_spans: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// INVITE with an SDP offer, then ACK the 200 OK
    Early {
        /// Host the connection goes to
        ua: String,
        /// URI user part
        user: String,
        /// URI domain part
        domain: String,
        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// INVITE without a body, then ACK the 200 OK
    Delayed {
        ua: String,
        user: String,
        domain: String,
        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// OPTIONS sent straight to the UA
    Options {
        ua: String,
        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// Run a probe by mode name (early, delayed or options)
    Run {
        mode: ProbeMode,
        ua: String,
        user: Option<String>,
        domain: Option<String>,
        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// Accept one TCP connection and print every line it sends
    Listen {
        #[arg(short, long, default_value_t = DEFAULT_PLAIN_PORT)]
        port: u16,
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },
}

/// Options shared by every probe subcommand
#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Local address advertised in Via, From, Contact and SDP
    #[arg(long, env = "SIPPROBE_SOURCE_IP")]
    pub source_ip: String,

    /// Use TLS (port 5061) instead of TCP (port 5060)
    #[arg(long)]
    pub tls: bool,

    /// PEM bundle of CA certificates used to verify the server
    #[arg(long, env = "SIPPROBE_TRUST_STORE")]
    pub trust_store: Option<PathBuf>,

    /// Override the well-known port
    #[arg(long)]
    pub port: Option<u16>,
}

impl ProbeArgs {
    /// Build the target for `ua`; `user` and `domain` are only needed by INVITEs
    pub fn target(&self, ua: &str, user: Option<&str>, domain: Option<&str>) -> Result<Target> {
        let mut target = Target::new(ua);
        if let Some(user) = user {
            target = target.with_user(user);
        }
        if let Some(domain) = domain {
            target = target.with_domain(domain);
        }

        if self.tls {
            let Some(trust_store) = &self.trust_store else {
                bail!("--tls needs a trust store (--trust-store or SIPPROBE_TRUST_STORE)");
            };
            target = target.with_tls(trust_store);
        }

        if let Some(port) = self.port {
            target = target.with_port(port);
        }
        Ok(target)
    }

    pub fn context(&self) -> CallContext {
        CallContext::new(self.source_ip.as_str())
    }
}

impl Cli {
    fn logging_config(&self) -> Result<LoggingConfig> {
        let mut config = LoggingConfig::new(parse_log_level(&self.log_level)?);
        if self.log_json {
            config = config.with_json();
        }
        if self.log_file_info {
            config = config.with_file_info();
        }
        if self.log_spans {
            config = config.with_spans();
        }
        Ok(config)
    }

    pub async fn execute(self) -> Result<()> {
        setup_logging(self.logging_config()?)?;

        match self.command {
            Commands::Early {
                ua,
                user,
                domain,
                probe,
            } => {
                let target = probe.target(&ua, Some(user.as_str()), Some(domain.as_str()))?;
                commands::probe::execute(ProbeMode::EarlyOffer, target, probe.context()).await
            }
            Commands::Delayed {
                ua,
                user,
                domain,
                probe,
            } => {
                let target = probe.target(&ua, Some(user.as_str()), Some(domain.as_str()))?;
                commands::probe::execute(ProbeMode::DelayedOffer, target, probe.context()).await
            }
            Commands::Options { ua, probe } => {
                let target = probe.target(&ua, None, None)?;
                commands::probe::execute(ProbeMode::Options, target, probe.context()).await
            }
            Commands::Run {
                mode,
                ua,
                user,
                domain,
                probe,
            } => {
                let target = probe.target(&ua, user.as_deref(), domain.as_deref())?;
                commands::probe::execute(mode, target, probe.context()).await
            }
            Commands::Listen { port, bind } => commands::listen::execute(&bind, port).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_early_positional_arguments() {
        let cli = parse(&["sipprobe", "early", "192.0.2.10", "1", "example.com", "--source-ip", "192.0.2.55"]);
        let Commands::Early { ua, user, domain, probe } = cli.command else {
            panic!("expected early");
        };
        assert_eq!((ua.as_str(), user.as_str(), domain.as_str()), ("192.0.2.10", "1", "example.com"));

        let target = probe.target(&ua, Some(user.as_str()), Some(domain.as_str())).unwrap();
        assert_eq!(target.port(), 5060);
        assert!(!target.transport().is_secure());
        assert_eq!(probe.context().source_ip(), "192.0.2.55");
    }

    #[test]
    fn test_tls_with_trust_store_uses_5061() {
        let cli = parse(&[
            "sipprobe", "options", "192.0.2.10", "--source-ip", "192.0.2.55", "--tls", "--trust-store",
            "/etc/ssl/ca.pem",
        ]);
        let Commands::Options { ua, probe } = cli.command else {
            panic!("expected options");
        };
        let target = probe.target(&ua, None, None).unwrap();
        assert_eq!(target.port(), 5061);
        assert_eq!(target.transport().uri_transport(), "tls");
    }

    #[test]
    fn test_tls_without_trust_store_is_rejected() {
        let probe = ProbeArgs {
            source_ip: "192.0.2.55".into(),
            tls: true,
            trust_store: None,
            port: None,
        };
        assert!(probe.target("192.0.2.10", None, None).is_err());
    }

    #[test]
    fn test_port_override() {
        let cli = parse(&["sipprobe", "delayed", "ua", "1", "d", "--source-ip", "10.0.0.1", "--port", "15060"]);
        let Commands::Delayed { ua, probe, .. } = cli.command else {
            panic!("expected delayed");
        };
        assert_eq!(probe.target(&ua, None, None).unwrap().port(), 15060);
    }

    #[test]
    fn test_run_accepts_mode_names_in_any_case() {
        let cli = parse(&["sipprobe", "run", "Delayed", "ua", "1", "d", "--source-ip", "10.0.0.1"]);
        assert!(matches!(cli.command, Commands::Run { mode: ProbeMode::DelayedOffer, .. }));

        assert!(Cli::try_parse_from(["sipprobe", "run", "register", "ua", "--source-ip", "10.0.0.1"]).is_err());
    }

    #[test]
    fn test_early_requires_user_and_domain() {
        assert!(Cli::try_parse_from(["sipprobe", "early", "192.0.2.10", "--source-ip", "10.0.0.1"]).is_err());
    }

    #[test]
    fn test_log_flags_reach_logging_config() {
        let cli = parse(&["sipprobe", "listen", "--log-level", "debug", "--log-spans", "--log-json"]);
        let config = cli.logging_config().unwrap();
        assert_eq!(config.level, tracing::Level::DEBUG);
        assert!(config.log_spans);
        assert!(config.json);
        assert!(!config.file_info);
    }

    #[test]
    fn test_listen_defaults() {
        let cli = parse(&["sipprobe", "listen"]);
        let Commands::Listen { port, bind } = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(port, 5060);
        assert_eq!(bind, "0.0.0.0");
        assert_eq!(cli.log_level, "warn");
    }
}
