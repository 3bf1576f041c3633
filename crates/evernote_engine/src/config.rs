use std::time::Duration;

use crate::PortfolioError;

pub const SANDBOX_API_ROOT: &str = "https://sandbox.evernote.com";
pub const PRODUCTION_API_ROOT: &str = "https://www.evernote.com";
pub const DEFAULT_NOTE_TITLE: &str = "Moodle Export";

/// Which Evernote service the plugin talks to. Only the base URL differs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
    /// Any other API root, e.g. a local stand-in.
    Custom(String),
}

impl Environment {
    pub fn api_root(&self) -> &str {
        match self {
            Environment::Sandbox => SANDBOX_API_ROOT,
            Environment::Production => PRODUCTION_API_ROOT,
            Environment::Custom(root) => root.trim_end_matches('/'),
        }
    }
}

/// Consumer key pair issued to the plugin by Evernote.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsumerCredentials {
    pub key: String,
    pub secret: String,
}

impl ConsumerCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Both halves are required; the plugin is unusable without them.
    pub fn ensure_present(&self) -> Result<(), PortfolioError> {
        if self.key.trim().is_empty() || self.secret.trim().is_empty() {
            return Err(PortfolioError::Configuration);
        }
        Ok(())
    }
}

/// Administrator-level plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSettings {
    pub consumer: ConsumerCredentials,
    pub environment: Environment,
    /// Where the remote approval page sends the browser back to.
    pub callback_url: String,
    pub default_note_title: String,
    pub http: HttpSettings,
}

impl PluginSettings {
    pub fn new(consumer: ConsumerCredentials, callback_url: impl Into<String>) -> Self {
        Self {
            consumer,
            environment: Environment::default(),
            callback_url: callback_url.into(),
            default_note_title: DEFAULT_NOTE_TITLE.to_string(),
            http: HttpSettings::default(),
        }
    }

    pub fn endpoints(&self) -> ServiceEndpoints {
        ServiceEndpoints::from_api_root(self.environment.api_root())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("evernote-portfolio/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Remote URLs derived from one API root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub request_token: String,
    pub access_token: String,
    pub authorize: String,
    pub user_store: String,
}

impl ServiceEndpoints {
    pub fn from_api_root(api_root: &str) -> Self {
        let root = api_root.trim_end_matches('/');
        Self {
            request_token: format!("{root}/oauth"),
            access_token: format!("{root}/oauth"),
            authorize: format!("{root}/OAuth.action"),
            user_store: format!("{root}/edam/user"),
        }
    }
}
