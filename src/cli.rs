//! Command-line surface.

use crate::config::{Config, DEFAULT_CONFIG_FILE};
use clap::Parser;
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "afkeeper", version, about = "Keeps a rotating presence on a game server")]
pub struct Cli {
    /// Path to the TOML settings file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Liveness port (overrides PORT and the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Validate the config, print what would run, and exit
    #[arg(long)]
    pub check: bool,
}

impl Cli {
    /// Liveness port: flag, then `PORT`, then config.
    #[must_use]
    pub fn liveness_port(&self, env: Option<&str>, config: &Config) -> u16 {
        self.port
            .unwrap_or_else(|| crate::liveness::resolve_port(env, config.liveness.port))
    }
}

/// Human-readable summary printed by `--check`.
#[must_use]
pub fn check_summary(config: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Server: {}", config.server_address());

    if let Ok(ring) = config.credential_ring() {
        let _ = writeln!(out, "Credentials ({}):", ring.len());
        for credential in ring.iter() {
            let _ = writeln!(out, "  {} [{}]", credential.username, credential.auth.as_str());
        }
    }

    let descriptors = config.behavior_descriptors();
    if descriptors.is_empty() {
        let _ = writeln!(out, "Behaviors: none");
    } else {
        let _ = writeln!(out, "Behaviors:");
        for descriptor in descriptors {
            let _ = writeln!(out, "  {}", descriptor.into_behavior().name());
        }
    }

    let _ = writeln!(
        out,
        "Reconnect delay: {} ms, max session lifetime: {} s",
        config.reconnect_delay().as_millis(),
        config.max_session_lifetime().as_secs()
    );
    out
}
