//! Credential strategies: how requests prove who the user is.
//!
//! DESIGN
//! ======
//! The deployment picks one strategy and the session store is generic over
//! it, so a running store can never switch between cookie sessions and
//! bearer tokens. The token store behind [`BearerToken`] has a single
//! writer (the session store); readers take the latest value at call time.

#[cfg(test)]
#[path = "credential_test.rs"]
mod credential_test;

use super::token_store::{StoreError, TokenStore};

/// Which credential strategy a build uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialKind {
    CookieSession,
    BearerToken,
}

/// What to attach to an outgoing request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// The transport's cookie jar carries the session; nothing to add.
    Cookie,
    /// `Authorization: Bearer <token>`.
    Bearer(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cookie => f.write_str("Cookie"),
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// One way of attaching and invalidating the current credential.
pub trait CredentialStrategy: Send + Sync {
    fn kind(&self) -> CredentialKind;

    /// The credential to attach right now, or `None` when there is nothing
    /// worth sending (no stored token).
    ///
    /// # Errors
    ///
    /// Returns an error if durable storage cannot be read.
    fn current(&self) -> Result<Option<Credential>, StoreError>;

    /// Accept a token delivered by the login redirect.
    ///
    /// Returns `false` when the strategy has no use for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if durable storage cannot be written.
    fn accept_token(&self, token: &str) -> Result<bool, StoreError>;

    /// Forget the local credential, if the strategy holds one.
    ///
    /// # Errors
    ///
    /// Returns an error if durable storage cannot be cleared.
    fn invalidate(&self) -> Result<(), StoreError>;
}

/// Session cookie owned by the transport. Application code never sees it.
#[derive(Clone, Copy, Debug, Default)]
pub struct CookieSession;

impl CredentialStrategy for CookieSession {
    fn kind(&self) -> CredentialKind {
        CredentialKind::CookieSession
    }

    fn current(&self) -> Result<Option<Credential>, StoreError> {
        Ok(Some(Credential::Cookie))
    }

    fn accept_token(&self, _token: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    // The server clears the cookie on logout.
    fn invalidate(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Bearer token kept in durable storage.
#[derive(Debug)]
pub struct BearerToken<S> {
    store: S,
}

impl<S: TokenStore> BearerToken<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: TokenStore> CredentialStrategy for BearerToken<S> {
    fn kind(&self) -> CredentialKind {
        CredentialKind::BearerToken
    }

    fn current(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.store.load()?.map(Credential::Bearer))
    }

    fn accept_token(&self, token: &str) -> Result<bool, StoreError> {
        self.store.save(token)?;
        Ok(true)
    }

    fn invalidate(&self) -> Result<(), StoreError> {
        self.store.clear()
    }
}
