use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_LOG_LEVEL: &str = "info";
/// Username every node agent expects in basic auth.
const DEFAULT_AGENT_USERNAME: &str = "Skyport";
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PURGE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PANEL_NAME: &str = "Hangar";

#[derive(Parser, Debug, Default)]
#[command(name = "hangar-control")]
#[command(about = "Hangar node management panel", long_about = None)]
pub struct Args {
    /// TOML config file; flags and env vars override its values
    #[arg(long, env = "HANGAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bind address for HTTP server
    #[arg(long, env = "HANGAR_BIND")]
    pub bind: Option<String>,

    /// Database file path
    #[arg(long, env = "HANGAR_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "HANGAR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Basic auth username presented to node agents
    #[arg(long, env = "HANGAR_AGENT_USERNAME")]
    pub agent_username: Option<String>,

    /// Timeout for agent status probes, in seconds
    #[arg(long, env = "HANGAR_PROBE_TIMEOUT_SECS")]
    pub probe_timeout_secs: Option<u64>,

    /// Timeout for agent instance purges, in seconds
    #[arg(long, env = "HANGAR_PURGE_TIMEOUT_SECS")]
    pub purge_timeout_secs: Option<u64>,

    /// Panel name used until one is stored
    #[arg(long, env = "HANGAR_PANEL_NAME")]
    pub panel_name: Option<String>,

    /// PEM certificate chain; enables HTTPS together with --tls-key
    #[arg(long, env = "HANGAR_TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "HANGAR_TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// PEM CA bundle; when set, clients must present a certificate
    #[arg(long, env = "HANGAR_TLS_CLIENT_CA")]
    pub tls_client_ca: Option<PathBuf>,
}

/// Shape of the optional TOML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub db_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub agent_username: Option<String>,
    pub probe_timeout_secs: Option<u64>,
    pub purge_timeout_secs: Option<u64>,
    pub panel_name: Option<String>,
    #[serde(default)]
    pub tls: Option<FileTlsConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileTlsConfig {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub client_ca: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {:?}", path))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlsSettings {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub client_ca: Option<PathBuf>,
}

/// Effective settings after merging flags, env and the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind: String,
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    pub agent_username: String,
    pub probe_timeout: Duration,
    pub purge_timeout: Duration,
    pub panel_name: String,
    pub tls: Option<TlsSettings>,
}

impl Settings {
    /// Parse the command line and load the config file it names, if any.
    pub fn from_args(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    pub fn merge(args: Args, file: FileConfig) -> Result<Self> {
        let file_tls = file.tls.unwrap_or_default();
        let cert = args.tls_cert.or(file_tls.cert);
        let key = args.tls_key.or(file_tls.key);
        let client_ca = args.tls_client_ca.or(file_tls.client_ca);

        let tls = match (cert, key) {
            (Some(cert), Some(key)) => Some(TlsSettings {
                cert,
                key,
                client_ca,
            }),
            (None, None) if client_ca.is_none() => None,
            _ => anyhow::bail!("TLS needs both a certificate and a private key"),
        };

        let probe_timeout_secs = args
            .probe_timeout_secs
            .or(file.probe_timeout_secs)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS);
        let purge_timeout_secs = args
            .purge_timeout_secs
            .or(file.purge_timeout_secs)
            .unwrap_or(DEFAULT_PURGE_TIMEOUT_SECS);
        if probe_timeout_secs == 0 || purge_timeout_secs == 0 {
            anyhow::bail!("Agent timeouts must be at least one second");
        }

        Ok(Self {
            bind: args
                .bind
                .or(file.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            db_path: args.db_path.or(file.db_path),
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            agent_username: args
                .agent_username
                .or(file.agent_username)
                .unwrap_or_else(|| DEFAULT_AGENT_USERNAME.to_string()),
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            purge_timeout: Duration::from_secs(purge_timeout_secs),
            panel_name: args
                .panel_name
                .or(file.panel_name)
                .unwrap_or_else(|| DEFAULT_PANEL_NAME.to_string()),
            tls,
        })
    }
}
