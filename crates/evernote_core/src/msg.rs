use crate::{AuthorizationRequest, Credential};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The request-token endpoint answered.
    RequestTokenIssued(AuthorizationRequest),
    /// The browser came back from the approval page.
    CallbackReceived {
        oauth_token: String,
        oauth_verifier: String,
        /// Secret stored by the first leg, if any.
        stored_secret: Option<String>,
    },
    /// The access-token endpoint answered with usable credentials.
    AccessGranted(Credential),
    /// The access-token exchange failed or returned an unusable response.
    ExchangeFailed,
    /// User asked to sign in as someone else.
    SignOutRequested,
}
