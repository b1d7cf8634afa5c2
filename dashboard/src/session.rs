//! The signed-in session.
//!
//! Sign-in itself happens elsewhere. Whatever performs it hands the resulting bearer token to a
//! [`Session`], and tells the session when the token is revoked. The session is owned by the
//! application and passed by reference to whoever needs a token.

use crate::error::ApiError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Source of bearer tokens for API calls.
pub trait TokenProvider: Send + Sync {
    /// Returns the current bearer token, or [`ApiError::Auth`] if there is none.
    fn bearer_token(&self) -> impl Future<Output = Result<String, ApiError>> + Send;
}

/// Holds the current bearer token and broadcasts sign-in / revocation changes.
#[derive(Debug)]
pub struct Session {
    token: watch::Sender<Option<String>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl Session {
    pub fn signed_out() -> Self {
        let (token, _) = watch::channel(None);
        Self { token }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::signed_out();
        session.sign_in(token);
        session
    }

    /// Installs a new token, e.g. after sign-in or after the provider refreshed it.
    ///
    /// Empty tokens are treated as a sign-out.
    pub fn sign_in(&self, token: impl Into<String>) {
        let token = token.into();
        if token.is_empty() {
            tracing::warn!("ignoring empty bearer token, treating as sign-out");
            self.revoke();
            return;
        }
        self.token.send_replace(Some(token));
        tracing::debug!("bearer token installed");
    }

    /// Drops the token. Subscribers see the change and should clear anything they cached.
    pub fn revoke(&self) {
        let was_signed_in = self.token.send_replace(None).is_some();
        if was_signed_in {
            tracing::info!("session revoked");
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.borrow().is_some()
    }

    /// Subscribes to token changes. `None` means signed out.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token.subscribe()
    }
}

impl TokenProvider for Session {
    async fn bearer_token(&self) -> Result<String, ApiError> {
        self.token
            .borrow()
            .clone()
            .ok_or_else(|| ApiError::Auth("no access token available".to_string()))
    }
}

impl<T: TokenProvider> TokenProvider for Arc<T> {
    fn bearer_token(&self) -> impl Future<Output = Result<String, ApiError>> + Send {
        (**self).bearer_token()
    }
}
