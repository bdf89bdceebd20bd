use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, UnsubError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Folder selected after login
    #[serde(default = "default_folder")]
    pub folder: String,
    /// IMAP SEARCH criteria defining the message pool
    #[serde(default = "default_search")]
    pub search: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deadline for every single transport call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Mailbox domain -> IMAP host
    #[serde(default = "default_servers")]
    pub servers: BTreeMap<String, String>,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            search: default_search(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            servers: default_servers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How much of each text part the diagnostic dump shows
    #[serde(default = "default_dump_tail_chars")]
    pub dump_tail_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dump_tail_chars: default_dump_tail_chars(),
        }
    }
}

/// Where and how to reach one mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub folder: String,
    pub timeout: Duration,
}

fn default_folder() -> String {
    "INBOX".to_string()
}

fn default_search() -> String {
    "ALL".to_string()
}

fn default_port() -> u16 {
    993
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_servers() -> BTreeMap<String, String> {
    let mut servers = BTreeMap::new();
    servers.insert("gmail.com".to_string(), "imap.gmail.com".to_string());
    servers.insert("yahoo.com".to_string(), "imap.mail.yahoo.com".to_string());
    servers
}

fn default_dump_tail_chars() -> usize {
    500
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| UnsubError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| UnsubError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.mailbox.port == 0 {
            return Err(UnsubError::ConfigError(
                "mailbox.port must be greater than 0".to_string(),
            ));
        }

        if self.mailbox.timeout_secs == 0 {
            return Err(UnsubError::ConfigError(
                "mailbox.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.mailbox.folder.trim().is_empty() {
            return Err(UnsubError::ConfigError(
                "mailbox.folder cannot be empty".to_string(),
            ));
        }

        if self.mailbox.search.trim().is_empty() {
            return Err(UnsubError::ConfigError(
                "mailbox.search cannot be empty".to_string(),
            ));
        }

        if self.mailbox.servers.is_empty() {
            return Err(UnsubError::ConfigError(
                "mailbox.servers must list at least one domain".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Resolve the IMAP server for a mailbox identity
    ///
    /// Fails with [`UnsubError::UnsupportedDomain`] when the identity's
    /// domain is not configured; no connection is attempted in that case.
    pub fn server_for(&self, identity: &str) -> Result<ServerSettings> {
        let domain = identity
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or(identity)
            .to_lowercase();

        let host = self
            .mailbox
            .servers
            .get(&domain)
            .ok_or(UnsubError::UnsupportedDomain(domain))?;

        Ok(ServerSettings {
            host: host.clone(),
            port: self.mailbox.port,
            folder: self.mailbox.folder.clone(),
            timeout: Duration::from_secs(self.mailbox.timeout_secs),
        })
    }
}
