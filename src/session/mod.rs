//! Client-side session: who the current user is, as far as the API says.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every consumer (listing, details, profile, add-listing) reads the same
//! [`SessionStore`] to gate actions and to fetch the credential it attaches
//! to its own API calls. The store reconciles its belief with
//! `GET /api/auth/user` and publishes each change through a watch channel.
//!
//! STATE MACHINE
//! =============
//! `Unknown -> Checking -> {Authenticated, Unauthenticated}`, with
//! `Authenticated -> Checking | Unauthenticated` and
//! `Unauthenticated -> Checking`. There is no terminal state.
//!
//! ORDERING
//! ========
//! Each identity check takes a sequence number from `latest_check`; a result
//! is applied only if its number is still the latest. Logout bumps the
//! counter before it transitions, so a check that was in flight when the
//! user logged out can never resurrect the session.

pub mod callback;
pub mod credential;
pub mod token_store;


use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{OnceCell, watch};

use crate::net::error::ApiError;
use crate::net::identity::IdentityApi;
use crate::net::types::Identity;
use callback::{CallbackError, strip_token};
use credential::{Credential, CredentialKind, CredentialStrategy};
use token_store::StoreError;

/// Where the store is in its verification lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// Nothing checked yet.
    #[default]
    Unknown,
    /// An identity check is in flight.
    Checking,
    Authenticated,
    Unauthenticated,
}

/// Snapshot of the client's belief about the current user.
///
/// Fields are private so `identity` can only be present while
/// `status == Authenticated`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    status: SessionStatus,
    identity: Option<Identity>,
    last_error: Option<String>,
}

impl Session {
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Message from the most recent failed verification or logout.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// True once a check has settled without producing a user.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        self.status == SessionStatus::Unauthenticated
    }

    fn begin_check(&mut self) {
        self.status = SessionStatus::Checking;
        self.identity = None;
    }

    fn authenticate(&mut self, identity: Identity) {
        self.status = SessionStatus::Authenticated;
        self.identity = Some(identity);
        self.last_error = None;
    }

    fn sign_out(&mut self, error: Option<String>) {
        self.status = SessionStatus::Unauthenticated;
        self.identity = None;
        self.last_error = error;
    }
}

/// Browser-navigation capability used to start the OAuth redirect.
pub trait Navigator {
    /// # Errors
    ///
    /// Returns an error if the navigation could not be started.
    fn navigate(&self, url: &str) -> Result<(), NavigationError>;
}

#[derive(Debug, thiserror::Error)]
#[error("navigation to {url} failed: {reason}")]
pub struct NavigationError {
    pub url: String,
    pub reason: String,
}

/// Result of handling the login redirect.
#[derive(Clone, Debug, PartialEq)]
pub struct RedirectOutcome {
    /// The callback URL with the token parameter removed.
    pub clean_url: String,
    /// Session after the follow-up identity check.
    pub session: Session,
}

/// Single source of truth for the current user.
pub struct SessionStore<A, C> {
    api: A,
    credentials: C,
    state: watch::Sender<Session>,
    latest_check: AtomicU64,
    initialized: OnceCell<()>,
}

impl<A: IdentityApi, C: CredentialStrategy> SessionStore<A, C> {
    pub fn new(api: A, credentials: C) -> Self {
        Self {
            api,
            credentials,
            state: watch::Sender::new(Session::default()),
            latest_check: AtomicU64::new(0),
            initialized: OnceCell::new(),
        }
    }

    /// The transport, for consumers issuing their own data calls.
    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn credential_kind(&self) -> CredentialKind {
        self.credentials.kind()
    }

    /// Current snapshot. Never blocks on I/O.
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Credential to attach to a request made right now.
    pub fn credential(&self) -> Option<Credential> {
        match self.credentials.current() {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(error = %e, "credential unavailable");
                None
            }
        }
    }

    /// Run the startup check once. Concurrent callers share the first run.
    pub async fn initialize(&self) -> Session {
        self.initialized
            .get_or_init(|| async {
                self.verify().await;
            })
            .await;
        self.snapshot()
    }

    /// Check the credential against `GET /api/auth/user` and settle the session.
    ///
    /// Never fails: every outcome resolves to `Authenticated` or
    /// `Unauthenticated`, or is discarded if a newer check or a logout
    /// superseded it.
    pub async fn verify(&self) -> Session {
        let seq = self.supersede_checks();

        let credential = match self.credentials.current() {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                tracing::debug!("no stored credential; skipping identity check");
                self.settle(seq, |s| s.sign_out(None));
                return self.snapshot();
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored credential");
                self.settle(seq, |s| s.sign_out(Some(format!("Failed to read credentials: {e}"))));
                return self.snapshot();
            }
        };

        self.settle(seq, Session::begin_check);
        let result = self.api.fetch_identity(&credential).await;

        let applied = match result {
            Ok(identity) => self.settle(seq, |s| {
                tracing::info!(user_id = %identity.id, name = %identity.name, "session authenticated");
                s.authenticate(identity);
            }),
            Err(ApiError::Rejected { status, .. }) => {
                // Storage I/O stays outside the watch lock; only the latest
                // check may discard the credential it was refused for.
                if self.is_latest(seq) {
                    let error = self
                        .discard_refused(&credential)
                        .err()
                        .map(|e| format!("Failed to discard rejected credentials: {e}"));
                    self.settle(seq, |s| {
                        tracing::info!(status, "identity check rejected; signed out");
                        s.sign_out(error);
                    })
                } else {
                    false
                }
            }
            Err(e) => self.settle(seq, |s| {
                tracing::warn!(error = %e, "identity check failed");
                s.sign_out(Some(format!("Failed to fetch user data: {e}")));
            }),
        };
        if !applied {
            tracing::debug!(seq, "discarding superseded identity check");
        }

        self.snapshot()
    }

    /// Hand the provider's authorization URL to the navigator.
    ///
    /// Completion arrives later through [`Self::complete_redirect`].
    ///
    /// # Errors
    ///
    /// Returns the navigator's error if the redirect could not start.
    pub fn login<N: Navigator + ?Sized>(&self, navigator: &N) -> Result<(), NavigationError> {
        let url = self.api.login_url();
        tracing::info!(%url, "starting login redirect");
        navigator.navigate(&url)
    }

    /// Finish the login redirect: take the token out of the callback URL,
    /// persist it when the strategy uses tokens, then verify.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or the token cannot be
    /// persisted. Verification itself never fails.
    pub async fn complete_redirect(&self, callback_url: &str) -> Result<RedirectOutcome, CallbackError> {
        let stripped = strip_token(callback_url)?;
        if let Some(token) = &stripped.token {
            if !self.credentials.accept_token(token)? {
                tracing::warn!("ignoring token on login callback; this build uses cookie sessions");
            }
        }
        let session = self.verify().await;
        Ok(RedirectOutcome { clean_url: stripped.clean_url, session })
    }

    /// Sign out. Always ends `Unauthenticated`; a failed server call is only
    /// recorded in `last_error`.
    pub async fn logout(&self) -> Session {
        self.supersede_checks();
        let prior = self.credential();

        match self.credentials.kind() {
            CredentialKind::CookieSession => {
                let error = match prior {
                    Some(credential) => self.notify_logout(&credential).await,
                    None => None,
                };
                self.supersede_checks();
                self.state.send_modify(|s| s.sign_out(error));
            }
            CredentialKind::BearerToken => {
                let cleared = self.credentials.invalidate();
                self.supersede_checks();
                let error = cleared.err().map(|e| {
                    tracing::error!(error = %e, "failed to delete stored token");
                    format!("Failed to logout: {e}")
                });
                self.state.send_modify(|s| s.sign_out(error));

                if let Some(credential) = prior {
                    if let Some(error) = self.notify_logout(&credential).await {
                        self.state.send_if_modified(|s| {
                            if s.status != SessionStatus::Unauthenticated || s.last_error.is_some() {
                                return false;
                            }
                            s.last_error = Some(error);
                            true
                        });
                    }
                }
            }
        }

        tracing::info!("session signed out");
        self.snapshot()
    }

    /// Replace the cached identity after a successful profile mutation.
    ///
    /// Returns `false` (and changes nothing) unless the session is authenticated.
    pub fn update_identity(&self, identity: Identity) -> bool {
        self.state.send_if_modified(|s| {
            if s.status != SessionStatus::Authenticated {
                return false;
            }
            s.identity = Some(identity);
            true
        })
    }

    async fn notify_logout(&self, credential: &Credential) -> Option<String> {
        match self.api.logout(credential).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, "logout request failed; local session cleared anyway");
                Some(format!("Failed to logout: {e}"))
            }
        }
    }

    /// Drop the stored credential if it is still the one the server refused.
    fn discard_refused(&self, refused: &Credential) -> Result<(), StoreError> {
        if self.credentials.current()?.as_ref() == Some(refused) {
            self.credentials.invalidate()?;
        }
        Ok(())
    }

    fn is_latest(&self, seq: u64) -> bool {
        self.latest_check.load(Ordering::SeqCst) == seq
    }

    /// Issue a new check number, invalidating every earlier one.
    fn supersede_checks(&self) -> u64 {
        self.latest_check.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply `f` only if `seq` is still the latest check. Returns whether it ran.
    fn settle(&self, seq: u64, f: impl FnOnce(&mut Session)) -> bool {
        self.state.send_if_modified(|s| {
            if !self.is_latest(seq) {
                return false;
            }
            f(s);
            true
        })
    }
}
