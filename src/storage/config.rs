use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::access::AccessSettings;
use crate::calendar::HostZone;
use crate::calendar::calendar_type::{LOCAL_CALENDAR_COLOR, LOCAL_DISPLAY_NAME};
use crate::calendar::DEFAULT_EVENT_COLOR;
use crate::permissions::{Capability, GrantTable};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub store: StoreConfig,
    pub calendar: CalendarConfig,
    pub permissions: PermissionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    pub database: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarConfig {
    /// IANA zone id. Falls back to `TZ`, then UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    pub local_display_name: String,
    pub local_color: u32,
    pub event_color: u32,
    pub default_reminder_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionsConfig {
    pub runtime_enforced: bool,
    #[serde(default)]
    pub granted: Vec<Capability>,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn load_or_create() -> Result<Self, ConfigError> {
        Self::load_or_create_at(&Self::config_path())
    }

    pub fn load_or_create_at(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default config to {}", path.display());
            Ok(config)
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calbridge")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn host_zone(&self) -> HostZone {
        HostZone::detect(self.calendar.time_zone.as_deref())
    }

    pub fn access_settings(&self, zone: &HostZone) -> AccessSettings {
        let mut settings = AccessSettings::for_zone(zone.id());
        settings.local_calendar = settings
            .local_calendar
            .with_display_name(self.calendar.local_display_name.clone())
            .with_color(self.calendar.local_color);
        settings.event_color = self.calendar.event_color;
        settings
    }

    pub fn grant_table(&self) -> GrantTable {
        GrantTable::new(self.permissions.runtime_enforced, self.permissions.granted.iter().copied())
    }

    /// Replaces the persisted grants with `granted`.
    pub fn record_grants(&mut self, granted: Vec<Capability>) {
        self.permissions.granted = granted;
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                database: Self::config_dir().join("calendar.db"),
            },
            calendar: CalendarConfig {
                time_zone: None,
                local_display_name: LOCAL_DISPLAY_NAME.to_string(),
                local_color: LOCAL_CALENDAR_COLOR,
                event_color: DEFAULT_EVENT_COLOR,
                default_reminder_minutes: 60,
            },
            permissions: PermissionsConfig {
                runtime_enforced: true,
                granted: Vec::new(),
            },
        }
    }
}
