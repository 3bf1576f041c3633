use crate::{AuthState, Credential, Effect, Msg};

/// Pure update function: applies a message to the authorization state and
/// returns the effects the caller must carry out, in order.
pub fn update(state: AuthState, msg: Msg) -> (AuthState, Vec<Effect>) {
    match msg {
        Msg::RequestTokenIssued(request) => {
            // A pending secret is never overwritten.
            if matches!(
                state,
                AuthState::AwaitingUserApproval | AuthState::AwaitingCallback
            ) {
                return (state, Vec::new());
            }
            (
                AuthState::AwaitingUserApproval,
                vec![
                    Effect::StoreTokenSecret(request.oauth_token_secret),
                    Effect::ClearAccessToken,
                    Effect::RedirectTo(request.authorize_url),
                ],
            )
        }
        Msg::CallbackReceived {
            oauth_token,
            oauth_verifier,
            stored_secret,
        } => {
            if oauth_verifier.trim().is_empty() {
                return (
                    AuthState::Unauthenticated,
                    vec![Effect::ClearTokenSecret, Effect::Deny],
                );
            }
            (
                AuthState::AwaitingCallback,
                vec![Effect::ExchangeAccessToken {
                    oauth_token,
                    token_secret: stored_secret.unwrap_or_default(),
                    oauth_verifier,
                }],
            )
        }
        Msg::AccessGranted(credential) => {
            if state != AuthState::AwaitingCallback {
                return (state, Vec::new());
            }
            let credential = Credential {
                token_secret: None,
                ..credential
            };
            (
                AuthState::Authenticated,
                vec![Effect::StoreCredential(credential), Effect::ClearTokenSecret],
            )
        }
        Msg::ExchangeFailed => {
            if state != AuthState::AwaitingCallback {
                return (state, Vec::new());
            }
            (AuthState::Unauthenticated, vec![Effect::ClearTokenSecret])
        }
        Msg::SignOutRequested => (AuthState::Unauthenticated, vec![Effect::ClearAll]),
    }
}
