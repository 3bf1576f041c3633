use crate::Credential;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StoreTokenSecret(String),
    ClearTokenSecret,
    ClearAccessToken,
    /// Send the browser to the remote approval page.
    RedirectTo(String),
    ExchangeAccessToken {
        oauth_token: String,
        token_secret: String,
        oauth_verifier: String,
    },
    StoreCredential(Credential),
    /// Wipe every persisted field for the user.
    ClearAll,
    /// Report the authorization as declined to the user.
    Deny,
}
