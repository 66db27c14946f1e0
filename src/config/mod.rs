//! Command-line configuration. Every flag can also come from a `KENNEL_*`
//! environment variable; an explicit flag wins.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::app::ShutdownPolicy;

#[derive(Debug, Clone, Parser)]
#[command(name = "kennel", version, about = "A hypermedia dog roster")]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "KENNEL_ADDR", default_value = "localhost:42069")]
    pub addr: String,

    /// Directory served under /static.
    #[arg(long, env = "KENNEL_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Origin allowed to make cross-origin requests; CORS is off when unset.
    #[arg(long, env = "KENNEL_CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Seconds in-flight requests get to finish after a shutdown signal.
    #[arg(long, env = "KENNEL_SHUTDOWN_TIMEOUT", default_value_t = 5)]
    pub shutdown_timeout: u64,

    /// Shut down when a handler reports an unrecoverable error.
    #[arg(
        long,
        env = "KENNEL_FAIL_FAST",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub fail_fast: bool,
}

impl Config {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    pub fn policy(&self) -> ShutdownPolicy {
        if self.fail_fast {
            ShutdownPolicy::FailFast
        } else {
            ShutdownPolicy::LogOnly
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::try_parse_from(["kennel"]).unwrap();
        assert_eq!(cfg.addr, "localhost:42069");
        assert_eq!(cfg.static_dir, PathBuf::from("static"));
        assert_eq!(cfg.cors_origin, None);
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.policy(), ShutdownPolicy::FailFast);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = Config::try_parse_from([
            "kennel",
            "--addr",
            "0.0.0.0:8080",
            "--static-dir",
            "/srv/kennel",
            "--cors-origin",
            "https://kennel.example",
            "--shutdown-timeout",
            "30",
            "--fail-fast",
            "false",
        ])
        .unwrap();

        assert_eq!(cfg.addr, "0.0.0.0:8080");
        assert_eq!(cfg.static_dir, PathBuf::from("/srv/kennel"));
        assert_eq!(cfg.cors_origin.as_deref(), Some("https://kennel.example"));
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.policy(), ShutdownPolicy::LogOnly);
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        assert!(Config::try_parse_from(["kennel", "--shutdown-timeout", "soon"]).is_err());
    }
}
