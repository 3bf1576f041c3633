//! Three-legged OAuth for one host user, persisted through the preference store.

use std::sync::Arc;

use evernote_core::{
    update, AuthState, AuthorizationRequest, Credential, Effect, Msg, StoredAuth,
    CREDENTIAL_FIELDS,
};
use portfolio_logging::{portfolio_debug, portfolio_info, portfolio_warn, redact};

use crate::config::ConsumerCredentials;
use crate::oauth::{OAuthClient, OAuthError};
use crate::preferences::{preference_name, PreferenceStore};
use crate::PortfolioError;

const TOKEN_SECRET: &str = "tokensecret";
const ACCESS_TOKEN: &str = "accesstoken";
const NOTE_STORE_URL: &str = "notestoreurl";
const USER_ID: &str = "userid";

/// Work left over after the store writes of an update have been applied.
#[derive(Debug, PartialEq, Eq)]
enum Pending {
    Redirect(String),
    Exchange {
        oauth_token: String,
        token_secret: String,
        oauth_verifier: String,
    },
}

pub struct AuthorizationFlow {
    user_id: String,
    consumer: ConsumerCredentials,
    preferences: Arc<dyn PreferenceStore>,
    oauth: Arc<dyn OAuthClient>,
}

impl AuthorizationFlow {
    pub fn new(
        user_id: impl Into<String>,
        consumer: ConsumerCredentials,
        preferences: Arc<dyn PreferenceStore>,
        oauth: Arc<dyn OAuthClient>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            consumer,
            preferences,
            oauth,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Snapshot of everything persisted for this user.
    pub fn stored(&self) -> Result<StoredAuth, PortfolioError> {
        Ok(StoredAuth {
            token_secret: self.read(TOKEN_SECRET)?,
            access_token: self.read(ACCESS_TOKEN)?,
            note_store_url: self.read(NOTE_STORE_URL)?,
            user_id: self.read(USER_ID)?,
        })
    }

    pub fn state(&self) -> Result<AuthState, PortfolioError> {
        Ok(self.stored()?.state())
    }

    /// `None` unless both an access token and a note store URL are stored.
    pub fn current_credential(&self) -> Result<Option<Credential>, PortfolioError> {
        Ok(self.stored()?.credential())
    }

    /// First leg: obtain a request token and, unless one is already pending,
    /// persist its secret so the callback can finish the exchange.
    pub async fn begin_authorization(
        &self,
        callback_url: &str,
    ) -> Result<AuthorizationRequest, PortfolioError> {
        self.consumer.ensure_present()?;
        let stored = self.stored()?;

        let issued = self
            .oauth
            .request_token(&self.consumer, callback_url)
            .await?;
        if !issued.callback_confirmed {
            portfolio_debug!("Request token issued without callback confirmation");
        }
        let mut request = AuthorizationRequest::for_token(
            self.oauth.authorize_base(),
            &issued.token,
            &issued.secret,
        );

        let (state, effects) = update(stored.state(), Msg::RequestTokenIssued(request.clone()));
        let pending = self.apply(effects)?;
        request.redirect_required = pending
            .iter()
            .any(|step| matches!(step, Pending::Redirect(_)));
        if request.redirect_required {
            portfolio_info!(
                "User {} sent for approval, request token {}",
                self.user_id,
                redact(&request.oauth_token)
            );
        } else {
            portfolio_debug!(
                "User {} already has a pending secret ({:?}); nothing stored",
                self.user_id,
                state
            );
        }
        Ok(request)
    }

    /// Second and third legs: the browser is back from the approval page.
    pub async fn complete_authorization(
        &self,
        oauth_token: &str,
        oauth_verifier: &str,
    ) -> Result<Credential, PortfolioError> {
        let stored = self.stored()?;
        let (state, effects) = update(
            stored.state(),
            Msg::CallbackReceived {
                oauth_token: oauth_token.to_string(),
                oauth_verifier: oauth_verifier.to_string(),
                stored_secret: stored.pending_secret().map(str::to_string),
            },
        );

        let exchange = self.apply(effects)?.into_iter().find_map(|step| match step {
            Pending::Exchange {
                oauth_token,
                token_secret,
                oauth_verifier,
            } => Some((oauth_token, token_secret, oauth_verifier)),
            Pending::Redirect(_) => None,
        });
        let Some((token, secret, verifier)) = exchange else {
            return Err(PortfolioError::AuthorizationDenied);
        };

        let access = match self
            .oauth
            .access_token(&self.consumer, &token, &secret, &verifier)
            .await
        {
            Ok(access) => access,
            Err(err) => {
                portfolio_warn!("Access token exchange failed for {}: {}", self.user_id, err);
                let (_, effects) = update(state, Msg::ExchangeFailed);
                self.apply(effects)?;
                return Err(match err {
                    OAuthError::MissingField(_) => PortfolioError::AuthorizationDenied,
                    other => PortfolioError::OAuth(other),
                });
            }
        };

        let credential = Credential {
            access_token: access.token,
            note_store_url: access.note_store_url,
            user_id: access.user_id,
            token_secret: None,
        };
        let (_, effects) = update(state, Msg::AccessGranted(credential.clone()));
        self.apply(effects)?;
        portfolio_info!(
            "User {} authorized remote account {} ({})",
            self.user_id,
            credential.user_id,
            redact(&credential.access_token)
        );
        Ok(credential)
    }

    /// Forget every persisted field, e.g. to sign in as someone else.
    pub fn reset_credential(&self) -> Result<(), PortfolioError> {
        let state = self.state()?;
        let (_, effects) = update(state, Msg::SignOutRequested);
        self.apply(effects)?;
        portfolio_info!("Cleared stored credential for {}", self.user_id);
        Ok(())
    }

    fn read(&self, field: &str) -> Result<Option<String>, PortfolioError> {
        Ok(self
            .preferences
            .get(&self.user_id, &preference_name(field))?)
    }

    fn write(&self, field: &str, value: &str) -> Result<(), PortfolioError> {
        Ok(self
            .preferences
            .set(&self.user_id, &preference_name(field), value)?)
    }

    fn clear(&self, field: &str) -> Result<(), PortfolioError> {
        Ok(self
            .preferences
            .clear(&self.user_id, &preference_name(field))?)
    }

    /// Carry out store effects in order; `Deny` stops with an error after the
    /// writes before it have landed.
    fn apply(&self, effects: Vec<Effect>) -> Result<Vec<Pending>, PortfolioError> {
        let mut pending = Vec::new();
        for effect in effects {
            match effect {
                Effect::StoreTokenSecret(secret) => self.write(TOKEN_SECRET, &secret)?,
                Effect::ClearTokenSecret => self.clear(TOKEN_SECRET)?,
                Effect::ClearAccessToken => self.clear(ACCESS_TOKEN)?,
                Effect::StoreCredential(credential) => {
                    self.write(ACCESS_TOKEN, &credential.access_token)?;
                    self.write(NOTE_STORE_URL, &credential.note_store_url)?;
                    self.write(USER_ID, &credential.user_id)?;
                }
                Effect::ClearAll => {
                    for field in CREDENTIAL_FIELDS {
                        self.clear(field)?;
                    }
                }
                Effect::RedirectTo(url) => pending.push(Pending::Redirect(url)),
                Effect::ExchangeAccessToken {
                    oauth_token,
                    token_secret,
                    oauth_verifier,
                } => pending.push(Pending::Exchange {
                    oauth_token,
                    token_secret,
                    oauth_verifier,
                }),
                Effect::Deny => {
                    portfolio_info!("User {} declined access", self.user_id);
                    return Err(PortfolioError::AuthorizationDenied);
                }
            }
        }
        Ok(pending)
    }
}
