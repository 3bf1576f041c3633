use crate::Credential;

/// Where a user stands in the three-legged authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// Request token issued and its secret stored; the user is on the remote approval page.
    AwaitingUserApproval,
    /// Callback received with a verifier; the access-token exchange is in flight.
    AwaitingCallback,
    Authenticated,
}

/// Raw per-user preference values, as read back from the store.
///
/// The state machine is stateless between requests, so every request derives
/// its [`AuthState`] from this snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredAuth {
    pub token_secret: Option<String>,
    pub access_token: Option<String>,
    pub note_store_url: Option<String>,
    pub user_id: Option<String>,
}

impl StoredAuth {
    pub fn state(&self) -> AuthState {
        if self.credential().is_some() {
            AuthState::Authenticated
        } else if self.pending_secret().is_some() {
            AuthState::AwaitingUserApproval
        } else {
            AuthState::Unauthenticated
        }
    }

    /// The request-token secret, if one is pending. Empty strings count as absent.
    pub fn pending_secret(&self) -> Option<&str> {
        non_empty(self.token_secret.as_deref())
    }

    pub fn credential(&self) -> Option<Credential> {
        let credential = Credential {
            access_token: non_empty(self.access_token.as_deref())?.to_string(),
            note_store_url: non_empty(self.note_store_url.as_deref())?.to_string(),
            user_id: self.user_id.clone().unwrap_or_default(),
            token_secret: self.pending_secret().map(str::to_string),
        };
        Some(credential)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_treated_as_unset() {
        let stored = StoredAuth {
            token_secret: Some(String::new()),
            access_token: Some("  ".into()),
            note_store_url: Some("https://example.com/notestore".into()),
            user_id: None,
        };
        assert_eq!(stored.state(), AuthState::Unauthenticated);
        assert!(stored.credential().is_none());
    }

    #[test]
    fn pending_secret_means_awaiting_approval() {
        let stored = StoredAuth {
            token_secret: Some("secret".into()),
            ..StoredAuth::default()
        };
        assert_eq!(stored.state(), AuthState::AwaitingUserApproval);
    }

    #[test]
    fn token_and_note_store_mean_authenticated() {
        let stored = StoredAuth {
            access_token: Some("S=s1:U=1".into()),
            note_store_url: Some("https://example.com/shard/s1/notestore".into()),
            user_id: Some("1".into()),
            ..StoredAuth::default()
        };
        assert_eq!(stored.state(), AuthState::Authenticated);
        let credential = stored.credential().unwrap();
        assert_eq!(credential.user_id, "1");
        assert_eq!(credential.token_secret, None);
    }
}
