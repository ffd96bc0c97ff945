use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::credentials::{ConfigCredentialStore, CredentialEntry, CredentialStore, EnvCredentialStore};
use crate::notifications::{Message, MessageFormat, Target, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::runner::NotifyRequest;
use crate::step::SkipOn;

/// Resolved configuration
#[derive(Debug)]
pub struct Config {
    pub notify: NotifyRequest,
    pub fail_on_error: bool,
    pub skip: SkipOn,
    pub api: ApiConfig,
    pub credentials: HashMap<String, CredentialEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Connect and request timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// The file as written. Space lists come in two shapes; both are folded into
/// one target list at load time.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    disable: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    message_type: Option<MessageFormat>,
    #[serde(default)]
    credentials_id: Option<String>,
    #[serde(default)]
    fail_on_error: bool,
    #[serde(default)]
    skip: SkipOn,
    #[serde(default)]
    spaces: Vec<SpaceEntry>,
    /// Deprecated room list, superseded by `spaces`
    #[serde(default)]
    rooms: Vec<LegacyRoomEntry>,
    #[serde(default)]
    api: ApiConfig,
    #[serde(default)]
    credentials: HashMap<String, CredentialEntry>,
}

#[derive(Debug, Deserialize)]
struct SpaceEntry {
    #[serde(default, alias = "space_name")]
    name: Option<String>,
    #[serde(alias = "space_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct LegacyRoomEntry {
    #[serde(default, alias = "rName")]
    r_name: Option<String>,
    #[serde(alias = "rId")]
    r_id: String,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .with_context(|| "Failed to parse spark-notify.toml")?;

        let config = Self::from_raw(raw);
        config.validate()?;

        Ok(config)
    }

    fn from_raw(raw: RawConfig) -> Self {
        if !raw.rooms.is_empty() {
            warn!(
                rooms = raw.rooms.len(),
                "[[rooms]] is deprecated; declare targets as [[spaces]] with name and id"
            );
        }

        let targets = raw
            .spaces
            .into_iter()
            .map(|s| Target { name: s.name, id: s.id })
            .chain(raw.rooms.into_iter().map(|r| Target {
                name: r.r_name,
                id: r.r_id,
            }))
            .collect();

        let credentials_id = raw
            .credentials_id
            .filter(|id| !id.trim().is_empty());

        Self {
            notify: NotifyRequest {
                disable: raw.disable,
                message: raw.message.unwrap_or_default(),
                format: raw.message_type,
                targets,
                credentials_id,
            },
            fail_on_error: raw.fail_on_error,
            skip: raw.skip,
            api: raw.api,
            credentials: raw.credentials,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than 0");
        }

        if self.api.endpoint.trim().is_empty() {
            anyhow::bail!("api.endpoint cannot be empty");
        }

        if let Some(ref id) = self.notify.credentials_id {
            if !self.credentials.is_empty() && !self.credentials.contains_key(id) {
                anyhow::bail!(
                    "credentials_id '{}' does not match any [credentials] entry",
                    id
                );
            }
        }

        Ok(())
    }

    /// Problems a user should fix before the next build.
    ///
    /// These do not stop a notification step from running; the step logs
    /// and skips instead.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !Message::is_message_valid(&self.notify.message) {
            problems.push("Message cannot be null".to_string());
        }

        if self.notify.targets.is_empty() {
            problems.push("No spaces defined".to_string());
        }

        for (index, target) in self.notify.targets.iter().enumerate() {
            if !Message::is_target_id_valid(&target.id) {
                problems.push(format!(
                    "Space #{}: Invalid spaceId; see help message",
                    index + 1
                ));
            }
        }

        if self.notify.credentials_id.is_none() {
            problems.push("No credentials_id set".to_string());
        }

        problems
    }

    /// Store backing `credentials_id`.
    ///
    /// Without a `[credentials]` table the id names an environment variable.
    pub fn credential_store(&self) -> Box<dyn CredentialStore> {
        if self.credentials.is_empty() {
            Box::new(EnvCredentialStore)
        } else {
            Box::new(ConfigCredentialStore::new(self.credentials.clone()))
        }
    }
}
