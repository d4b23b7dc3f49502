//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MIMEMAIL_CONFIG` (environment variable)
//! 2. `~/.config/mimemail/config.toml` (Linux/macOS)
//!    `%APPDATA%\mimemail\config.toml` (Windows)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypt::{prepare_signer, PgpOptions, Signer};
use crate::error::{MailError, Result};
use crate::model::address::Mailbox;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Algorithms used when encrypting and signing.
    pub pgp: PgpOptions,
    /// Sending accounts, keyed by a short name.
    pub accounts: BTreeMap<String, Account>,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Account used when none is named on the command line.
    pub default_account: Option<String>,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// One identity that can send mail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    /// Display name used in `From`.
    pub name: String,
    /// Mailbox address; also the SMTP login.
    pub address: String,
    /// SMTP password. No authentication is attempted when unset.
    pub password: Option<String>,
    /// Private key used for signing.
    pub key: KeyConfig,
    /// Outgoing server.
    pub server: ServerConfig,
}

/// Where to find an account's private key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Path to an ASCII-armored private key.
    pub file: Option<PathBuf>,
    /// Inline ASCII-armored private key. Wins over `file`.
    pub key: Option<String>,
    /// Passphrase protecting the key.
    pub passphrase: String,
}

/// SMTP server settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Defaults to the standard port for `tls`.
    pub port: Option<u16>,
    pub tls: TlsMode,
    /// Connection timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// TLS from the first byte.
    Wrapper,
    /// Plain connection upgraded with STARTTLS; fails if not offered.
    #[default]
    Starttls,
    /// STARTTLS when offered, plain otherwise.
    Opportunistic,
    /// No encryption.
    None,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            default_account: None,
            cache_dir: None,
        }
    }
}

impl TlsMode {
    pub fn default_port(self) -> u16 {
        match self {
            TlsMode::Wrapper => 465,
            TlsMode::Starttls => 587,
            TlsMode::Opportunistic | TlsMode::None => 25,
        }
    }
}

impl ServerConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.tls.default_port())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Look up `name`, or the default account when `name` is `None`.
    ///
    /// With no default configured, a single account is picked implicitly.
    pub fn account(&self, name: Option<&str>) -> Result<&Account> {
        let name = match name.or(self.general.default_account.as_deref()) {
            Some(name) => name,
            None if self.accounts.len() == 1 => {
                return self
                    .accounts
                    .values()
                    .next()
                    .ok_or_else(|| MailError::Config("no accounts configured".into()));
            }
            None => {
                return Err(MailError::Config(
                    "no account given and no default_account set".into(),
                ))
            }
        };
        self.accounts
            .get(name)
            .ok_or_else(|| MailError::Config(format!("unknown account '{name}'")))
    }
}

impl Account {
    pub fn mailbox(&self) -> Mailbox {
        Mailbox::new(&self.name, &self.address)
    }

    /// Parse and unlock the account key, if one is configured.
    pub fn signer(&self) -> Result<Option<Signer>> {
        match self.key.armored()? {
            Some(armored) => prepare_signer(&armored, &self.key.passphrase).map(Some),
            None => Ok(None),
        }
    }
}

impl KeyConfig {
    /// The armored key text, read from `file` when not given inline.
    pub fn armored(&self) -> Result<Option<String>> {
        if let Some(ref key) = self.key {
            return Ok(Some(key.clone()));
        }
        match self.file {
            Some(ref path) => std::fs::read_to_string(path)
                .map(Some)
                .map_err(|e| MailError::io(path, e)),
            None => Ok(None),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_config_from(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "Loaded config");
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Read and parse the configuration file at `path`.
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save configuration to `path`, creating parent directories as needed.
pub fn save_config_to(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MIMEMAIL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mimemail").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mimemail")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mimemail.log")
}
