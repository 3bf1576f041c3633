use url::Url;

/// Prefix shared by every per-user preference key this plugin writes.
pub const PREFERENCE_PREFIX: &str = "evernote_";

/// Preference field names that make up a persisted [`Credential`].
pub const CREDENTIAL_FIELDS: [&str; 4] = ["tokensecret", "accesstoken", "notestoreurl", "userid"];

/// Access credentials for one user's Evernote account.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credential {
    pub access_token: String,
    pub note_store_url: String,
    pub user_id: String,
    /// Only present between the request-token and access-token legs.
    pub token_secret: Option<String>,
}

impl Credential {
    /// A credential is usable once it carries both a token and a note store to talk to.
    pub fn is_usable(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.note_store_url.trim().is_empty()
    }
}

/// Result of the request-token leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub authorize_url: String,
    pub oauth_token: String,
    pub oauth_token_secret: String,
    /// False when a pending secret was already stored and nothing was re-issued.
    pub redirect_required: bool,
}

impl AuthorizationRequest {
    /// Build the request for a freshly issued token, pointing the user at `authorize_base`.
    pub fn for_token(authorize_base: &str, oauth_token: &str, oauth_token_secret: &str) -> Self {
        let authorize_url = match Url::parse(authorize_base) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("oauth_token", oauth_token);
                url.to_string()
            }
            Err(_) => format!("{authorize_base}?oauth_token={oauth_token}"),
        };
        Self {
            authorize_url,
            oauth_token: oauth_token.to_string(),
            oauth_token_secret: oauth_token_secret.to_string(),
            redirect_required: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notebook {
    pub guid: String,
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: i32,
    pub username: String,
}

/// User-chosen export fields. Both are required.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportConfig {
    pub note_title: String,
    pub notebook_guid: String,
}

impl ExportConfig {
    /// Names the first required field left blank, using the host's field keys.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.note_title.trim().is_empty() {
            Some("notetitle")
        } else if self.notebook_guid.trim().is_empty() {
            Some("notebooks")
        } else {
            None
        }
    }
}

/// Note ready for submission; the body is already ENML.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteDraft {
    pub title: String,
    pub body_markup: String,
    pub notebook_guid: String,
    /// Attachments. Always empty for now; the page body is the only content sent.
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resource {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub attributes: ResourceAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceAttributes {
    pub source_url: Option<String>,
    pub file_name: Option<String>,
    pub attachment: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_the_request_token() {
        let request =
            AuthorizationRequest::for_token("https://sandbox.evernote.com/OAuth.action", "t 1", "s");
        assert_eq!(
            request.authorize_url,
            "https://sandbox.evernote.com/OAuth.action?oauth_token=t+1"
        );
        assert!(request.redirect_required);
    }

    #[test]
    fn export_config_reports_blank_fields_in_form_order() {
        let mut config = ExportConfig::default();
        assert_eq!(config.missing_field(), Some("notetitle"));
        config.note_title = "Title".into();
        assert_eq!(config.missing_field(), Some("notebooks"));
        config.notebook_guid = "guid".into();
        assert_eq!(config.missing_field(), None);
    }

    #[test]
    fn credential_needs_token_and_note_store() {
        let mut credential = Credential {
            access_token: "S=s1".into(),
            ..Credential::default()
        };
        assert!(!credential.is_usable());
        credential.note_store_url = "https://sandbox.evernote.com/shard/s1/notestore".into();
        assert!(credential.is_usable());
    }
}
