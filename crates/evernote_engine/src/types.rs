use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::oauth::OAuthError;
use crate::preferences::PreferenceError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("OAuth credentials required.")]
    Configuration,
    #[error("The user denied access to the Evernote account.")]
    AuthorizationDenied,
    #[error("A session token does not exist preventing export to Evernote.")]
    NoActiveSession,
    #[error("The file {file} failed to transfer to Evernote")]
    RemoteTransferFailure {
        file: String,
        #[source]
        source: Option<StoreError>,
    },
    #[error("required export field {0} is blank")]
    MissingExportField(&'static str),
    #[error("notebook {0} was not offered to this user")]
    UnknownNotebook(String),
    #[error("no page-root text/html file was staged for export")]
    NoHtmlContent,
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Preferences(#[from] PreferenceError),
}

impl PortfolioError {
    /// Short key the host shows for this failure, mirroring its string table.
    pub fn key(&self) -> &'static str {
        match self {
            PortfolioError::Configuration => "nooauthcredentials",
            PortfolioError::AuthorizationDenied => "nopermission",
            PortfolioError::NoActiveSession => "noaccesstoken",
            PortfolioError::RemoteTransferFailure { .. } => "failedtransfer",
            PortfolioError::MissingExportField(_) => "required",
            PortfolioError::UnknownNotebook(_) => "unknownnotebook",
            PortfolioError::NoHtmlContent => "nohtmlcontent",
            PortfolioError::OAuth(_) => "oautherror",
            PortfolioError::Store(_) => "storeerror",
            PortfolioError::Preferences(_) => "preferenceerror",
        }
    }
}

/// Export formats a portfolio plugin can accept from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    PlainHtml,
    RichHtml,
    File,
}

/// Host export stages in the order the host walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExportStage {
    Config,
    Confirm,
    Queueing,
    Package,
    Send,
    Cleanup,
    Finished,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportStage::Config => "config",
            ExportStage::Confirm => "confirm",
            ExportStage::Queueing => "queueing",
            ExportStage::Package => "package",
            ExportStage::Send => "send",
            ExportStage::Cleanup => "cleanup",
            ExportStage::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// A file the host staged for this export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Directory inside the export area; `/` is the page root.
    pub path: String,
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl StagedFile {
    pub fn new(
        path: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            mime_type: mime_type.into(),
            content: content.into(),
        }
    }

    pub fn is_page_root(&self) -> bool {
        self.path == "/"
    }

    /// Compares the media type only, ignoring parameters such as `charset`.
    pub fn is_html(&self) -> bool {
        self.mime_type
            .split(';')
            .next()
            .is_some_and(|media| media.trim().eq_ignore_ascii_case("text/html"))
    }

    pub fn display_path(&self) -> PathBuf {
        PathBuf::from(&self.path).join(&self.name)
    }
}

/// Query parameters the host receives when the approval page sends the user back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallbackParams {
    pub oauth_token: String,
    /// Empty when the user declined.
    pub oauth_verifier: String,
}

impl CallbackParams {
    /// Read the two OAuth parameters from a query string; absent ones are empty.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "oauth_token" => params.oauth_token = value.into_owned(),
                "oauth_verifier" => params.oauth_verifier = value.into_owned(),
                _ => {}
            }
        }
        params
    }
}

/// What the host should do after handing control to the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Keep going with the export.
    Continue,
    /// Send the browser elsewhere and wait for it to come back.
    Redirect(String),
}
