//! Server configuration
//!
//! Loaded from a TOML file and/or assembled from the command line:
//!
//! ```toml
//! listen = "0.0.0.0:9999"
//! payload_timeout_secs = 30
//! log_filter = "info,workbench_server=debug"
//! preload = ["models/lena.xml.gz"]
//!
//! [[accounts]]
//! username = "alice"
//! password = "secret"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// One entry of the login allow-list
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
}

impl Account {
    /// Create account
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether a login line could ever name this account
    ///
    /// Neither part may be empty or contain `:`.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        let usable = |part: &str| !part.is_empty() && !part.contains(':');
        usable(&self.username) && usable(&self.password)
    }

    /// Verbatim credential comparison
    #[must_use]
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parses `user:password`; the result must be [`Account::is_usable`]
impl FromStr for Account {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_once(':')
            .map(|(user, pass)| Self::new(user, pass))
            .filter(Self::is_usable)
            .ok_or_else(|| ConfigError::InvalidAccount(s.to_string()))
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to accept connections on
    pub listen: String,
    /// Login allow-list
    pub accounts: Vec<Account>,
    /// Give up on a payload after this many idle seconds; unset waits forever
    pub payload_timeout_secs: Option<u64>,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
    /// Model files loaded into the workspace at startup
    pub preload: Vec<PathBuf>,
}

impl ServerConfig {
    /// Default listen address
    pub const DEFAULT_LISTEN: &'static str = "127.0.0.1:9999";

    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError::Io` or `ConfigError::Parse`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// With listen address
    #[must_use]
    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = listen.into();
        self
    }

    /// With an additional account
    #[must_use]
    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    /// With payload timeout
    #[must_use]
    pub fn with_payload_timeout_secs(mut self, secs: u64) -> Self {
        self.payload_timeout_secs = Some(secs);
        self
    }

    /// Payload timeout as a duration
    #[must_use]
    pub fn payload_timeout(&self) -> Option<Duration> {
        self.payload_timeout_secs.map(Duration::from_secs)
    }

    /// Parsed listen address
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidListenAddress`
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddress(self.listen.clone()))
    }

    /// Check the configuration can serve clients
    ///
    /// # Errors
    /// - `ConfigError::NoAccounts` with an empty allow-list
    /// - `ConfigError::InvalidAccount` for an account no login line can match
    /// - `ConfigError::InvalidListenAddress`
    /// - `ConfigError::InvalidPayloadTimeout` for a zero timeout
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }
        if let Some(bad) = self.accounts.iter().find(|account| !account.is_usable()) {
            return Err(ConfigError::InvalidAccount(bad.username.clone()));
        }
        self.listen_addr()?;
        if self.payload_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidPayloadTimeout);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: Self::DEFAULT_LISTEN.to_string(),
            accounts: Vec::new(),
            payload_timeout_secs: None,
            log_filter: "info".to_string(),
            preload: Vec::new(),
        }
    }
}
