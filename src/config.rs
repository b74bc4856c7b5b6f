//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

use crate::net::directory::MY_REVIEWS_PATH;
use crate::session::credential::CredentialKind;
use crate::session::token_store::TOKEN_STORAGE_KEY;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `BUSSY_CREDENTIAL` held something other than `cookie` or `token`.
    #[error("unknown credential strategy: {0}")]
    UnknownCredential(String),

    /// No explicit token path and no platform data directory.
    #[error("no data directory available; set BUSSY_TOKEN_PATH")]
    NoDataDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect_secs: u64,
    /// `None` waits for the transport to settle, however long that takes.
    pub request_secs: Option<u64>,
}

impl Timeouts {
    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub fn request(&self) -> Option<Duration> {
        self.request_secs.map(Duration::from_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS, request_secs: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub credential: CredentialKind,
    pub token_path: PathBuf,
    pub session_cookie: Option<String>,
    pub timeouts: Timeouts,
    /// Path of the signed-in user's reviews; deployments differ on the `/api` prefix.
    pub my_reviews_path: String,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `BUSSY_API_URL`: API origin, default `http://localhost:3000`
    /// - `BUSSY_CREDENTIAL`: `token` (default) or `cookie`
    /// - `BUSSY_TOKEN_PATH`: bearer token file, default `<data dir>/bussy/authToken`
    /// - `BUSSY_SESSION_COOKIE`: `name=value` cookie to seed the cookie jar
    /// - `BUSSY_CONNECT_TIMEOUT_SECS`: default 10
    /// - `BUSSY_REQUEST_TIMEOUT_SECS`: unset means no request timeout
    /// - `BUSSY_MY_REVIEWS_PATH`: default `/api/reviews/user`
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown credential strategy, or when no token
    /// path can be derived.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = normalize_api_url(&std::env::var("BUSSY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_owned()));
        let credential = parse_credential(std::env::var("BUSSY_CREDENTIAL").ok().as_deref())?;
        let token_path = match std::env::var("BUSSY_TOKEN_PATH") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => default_token_path()?,
        };
        let session_cookie = std::env::var("BUSSY_SESSION_COOKIE")
            .ok()
            .filter(|raw| !raw.trim().is_empty());
        let timeouts = Timeouts {
            connect_secs: env_parse_u64("BUSSY_CONNECT_TIMEOUT_SECS").unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_secs: env_parse_u64("BUSSY_REQUEST_TIMEOUT_SECS"),
        };

        let my_reviews_path = std::env::var("BUSSY_MY_REVIEWS_PATH")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .map_or_else(|| MY_REVIEWS_PATH.to_owned(), |raw| normalize_api_path(&raw));

        Ok(Self { api_url, credential, token_path, session_cookie, timeouts, my_reviews_path })
    }
}

/// Trim whitespace and trailing slashes so paths can be appended directly.
#[must_use]
pub fn normalize_api_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

/// Trim an API path and give it exactly one leading slash.
#[must_use]
pub fn normalize_api_path(raw: &str) -> String {
    format!("/{}", raw.trim().trim_start_matches('/'))
}

fn env_parse_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

/// Parse a credential strategy name; `None` selects the bearer token.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownCredential`] for unrecognised names.
pub fn parse_credential(raw: Option<&str>) -> Result<CredentialKind, ConfigError> {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("" | "token" | "bearer") => Ok(CredentialKind::BearerToken),
        Some("cookie" | "session") => Ok(CredentialKind::CookieSession),
        Some(other) => Err(ConfigError::UnknownCredential(other.to_owned())),
    }
}

fn default_token_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(base.join("bussy").join(TOKEN_STORAGE_KEY))
}
