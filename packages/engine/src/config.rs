use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Engine configuration, every field defaulted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Presence session timing
    pub presence: PresenceConfig,

    /// Place list settings
    pub places: PlacesConfig,

    /// Friend notification settings
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Period of location rebroadcast while visible
    pub broadcast_interval_secs: u64,

    /// Visibility sessions end on their own after this long
    pub auto_disable_secs: u64,

    /// Store writes taking longer than this count as unavailable
    pub write_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesConfig {
    /// Places exposed per `load_next_page` call
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Delay handed to the notification sink
    pub delay_secs: u64,

    /// Title template, `{friend}` is replaced with the friend key
    pub title_template: String,

    /// Body template, `{friend}` is replaced with the friend key
    pub body_template: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: &str) -> Self {
        Self::Invalid { field: field.to_string(), message: message.to_string() }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_secs: 10,
            auto_disable_secs: 8 * 60 * 60, // 8 hours
            write_timeout_secs: 5,
        }
    }
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self { page_size: 5 }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            delay_secs: 1,
            title_template: "{friend} is live".to_string(),
            body_template: "{friend} just started sharing their location".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `BEACON_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `BEACON_*` name
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup);
        config
    }

    /// Apply `BEACON_*` environment overrides on top of this config
    pub fn apply_env(&mut self) {
        self.apply_lookup(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`. Unparseable values are ignored.
    pub fn apply_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secs) = lookup("BEACON_BROADCAST_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.presence.broadcast_interval_secs = secs;
        }

        if let Some(secs) = lookup("BEACON_AUTO_DISABLE_SECS").and_then(|v| v.parse().ok()) {
            self.presence.auto_disable_secs = secs;
        }

        if let Some(secs) = lookup("BEACON_WRITE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.presence.write_timeout_secs = secs;
        }

        if let Some(size) = lookup("BEACON_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.places.page_size = size;
        }

        if let Some(secs) = lookup("BEACON_NOTIFICATION_DELAY_SECS").and_then(|v| v.parse().ok()) {
            self.notifications.delay_secs = secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.presence.validate()?;
        self.places.validate()
    }
}

impl PresenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broadcast_interval_secs == 0 {
            return Err(ConfigError::invalid("presence.broadcast_interval_secs", "must be at least 1"));
        }
        if self.auto_disable_secs == 0 {
            return Err(ConfigError::invalid("presence.auto_disable_secs", "must be at least 1"));
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::invalid("presence.write_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_secs(self.broadcast_interval_secs.max(1))
    }

    pub fn auto_disable_after(&self) -> Duration {
        Duration::from_secs(self.auto_disable_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs.max(1))
    }
}

impl PlacesConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::invalid("places.page_size", "must be at least 1"));
        }
        Ok(())
    }
}

impl NotificationConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    /// Render title and body for a friend going live
    pub fn render(&self, friend: &str) -> (String, String) {
        (
            self.title_template.replace("{friend}", friend),
            self.body_template.replace("{friend}", friend),
        )
    }
}
