use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use evernote_engine::{
    ConsumerCredentials, Environment, HttpSettings, PluginSettings, DEFAULT_NOTE_TITLE,
};
use portfolio_logging::portfolio_info;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SETTINGS_FILE: &str = "evernote_portfolio.ron";
const DEFAULT_PREFERENCES_FILE: &str = "evernote_preferences.ron";
const DEFAULT_CALLBACK_URL: &str = "http://localhost/portfolio/add.php?postcontrol=1&type=evernote";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ServiceSetting {
    #[default]
    Sandbox,
    Production,
    Custom(String),
}

/// On-disk host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub service: ServiceSetting,
    pub callback_url: String,
    pub default_note_title: String,
    /// Where per-user preferences (tokens) are kept.
    pub preferences_file: PathBuf,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        let http = HttpSettings::default();
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            service: ServiceSetting::default(),
            callback_url: DEFAULT_CALLBACK_URL.to_string(),
            default_note_title: DEFAULT_NOTE_TITLE.to_string(),
            preferences_file: PathBuf::from(DEFAULT_PREFERENCES_FILE),
            connect_timeout_secs: http.connect_timeout.as_secs(),
            request_timeout_secs: http.request_timeout.as_secs(),
        }
    }
}

impl AppSettings {
    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                portfolio_info!("No settings at {:?}; using defaults", path);
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading settings from {path:?}"));
            }
        };
        ron::from_str(&content).with_context(|| format!("parsing settings in {path:?}"))
    }

    /// Preferences path, resolved against the settings file's directory when relative.
    pub fn preferences_path(&self, settings_path: &Path) -> PathBuf {
        if self.preferences_file.is_absolute() {
            return self.preferences_file.clone();
        }
        settings_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.preferences_file)
    }

    pub fn plugin_settings(&self) -> PluginSettings {
        let mut settings = PluginSettings::new(
            ConsumerCredentials::new(self.consumer_key.trim(), self.consumer_secret.trim()),
            self.callback_url.clone(),
        );
        settings.environment = match &self.service {
            ServiceSetting::Sandbox => Environment::Sandbox,
            ServiceSetting::Production => Environment::Production,
            ServiceSetting::Custom(root) => Environment::Custom(root.clone()),
        };
        if !self.default_note_title.trim().is_empty() {
            settings.default_note_title = self.default_note_title.clone();
        }
        settings.http.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        settings.http.request_timeout = Duration::from_secs(self.request_timeout_secs);
        settings
    }
}
