//! Daemon configuration

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use doorlock_core::{
    IdentityTemplate, LogicConfig, DEFAULT_TOKEN_TIMEOUT_SECS, MAX_TOKEN_TIMEOUT_SECS,
};

use crate::error::{DaemonError, Result};

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seconds after which an unused token is replaced
    pub token_timeout_secs: u64,

    /// Directory service URI
    pub ldap_uri: String,

    /// Bind DN template, `%s` is replaced by the user name
    pub bind_dn: String,

    /// Timeout for directory service operations (seconds)
    pub ldap_timeout_secs: u64,

    /// URL prefix the current token is appended to
    pub web_prefix: String,

    /// Door actuator device; a simulated door is used when unset
    pub serial_device: Option<PathBuf>,

    /// Command byte sent to lock the door
    pub lock_command: u8,

    /// Command byte sent to unlock the door
    pub unlock_command: u8,

    /// Request listener, `tcp:<host>:<port>` or `unix:<path>`
    pub listen: String,

    /// Where the QR code for the current token is written
    pub qr_path: PathBuf,

    /// Minimum QR code edge length in pixels
    pub qr_size: u32,

    /// Local user/password table used instead of the directory service
    pub static_users: Option<HashMap<String, String>>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            token_timeout_secs: DEFAULT_TOKEN_TIMEOUT_SECS,
            ldap_uri: "ldap://localhost:389".to_string(),
            bind_dn: "uid=%s,ou=people,dc=example,dc=org".to_string(),
            ldap_timeout_secs: 5,
            web_prefix: "https://door.example.org/?token=".to_string(),
            serial_device: None,
            lock_command: b'l',
            unlock_command: b'u',
            listen: "tcp:127.0.0.1:5555".to_string(),
            qr_path: Self::default_qr_path(),
            qr_size: 300,
            static_users: None,
        }
    }
}

impl DaemonConfig {
    /// Platform-appropriate default location of the QR code image
    fn default_qr_path() -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("doorlockd-token.png")
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check settings that would otherwise fail at runtime
    pub fn validate(&self) -> Result<()> {
        if self.token_timeout_secs == 0 {
            return Err(DaemonError::Config(
                "token_timeout_secs must be positive".to_string(),
            ));
        }
        if self.token_timeout_secs > MAX_TOKEN_TIMEOUT_SECS {
            return Err(DaemonError::Config(format!(
                "token_timeout_secs must not exceed {}",
                MAX_TOKEN_TIMEOUT_SECS
            )));
        }

        if self.lock_command == self.unlock_command {
            return Err(DaemonError::Config(
                "lock_command and unlock_command must differ".to_string(),
            ));
        }

        self.identity_template()?;
        self.listen_addr()?;
        Ok(())
    }

    pub fn identity_template(&self) -> Result<IdentityTemplate> {
        Ok(IdentityTemplate::parse(&self.bind_dn)?)
    }

    pub fn listen_addr(&self) -> Result<ListenAddr> {
        self.listen.parse()
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    pub fn ldap_timeout(&self) -> Duration {
        Duration::from_secs(self.ldap_timeout_secs)
    }

    /// Settings for the authorization engine
    pub fn logic_config(&self) -> Result<LogicConfig> {
        Ok(LogicConfig {
            token_timeout: self.token_timeout(),
            identity_template: self.identity_template()?,
            web_prefix: self.web_prefix.clone(),
        })
    }
}

/// Where the daemon accepts requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    /// `host:port`
    Tcp(String),
    /// Unix domain socket path
    Unix(PathBuf),
}

impl FromStr for ListenAddr {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(addr) = s.strip_prefix("tcp:") {
            if addr.rsplit_once(':').map_or(true, |(host, port)| {
                host.is_empty() || port.parse::<u16>().is_err()
            }) {
                return Err(DaemonError::Config(format!(
                    "invalid TCP listen address {:?}",
                    addr
                )));
            }
            return Ok(ListenAddr::Tcp(addr.to_string()));
        }

        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(DaemonError::Config("empty unix socket path".to_string()));
            }
            return Ok(ListenAddr::Unix(PathBuf::from(path)));
        }

        Err(DaemonError::Config(format!(
            "listen address {:?} must start with tcp: or unix:",
            s
        )))
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Tcp(addr) => write!(f, "tcp:{}", addr),
            ListenAddr::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}
