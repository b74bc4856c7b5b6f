//! Shared reqwest transport for the Bussy API.
//!
//! ARCHITECTURE
//! ============
//! One `reqwest::Client` with a cookie jar serves both credential
//! strategies: the cookie variant relies on the jar alone, the bearer
//! variant adds an `Authorization` header per request. Response decoding is
//! split into the pure `decode_response` so status/body handling can be
//! tested without a server.

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;

use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use super::directory::MY_REVIEWS_PATH;
use super::error::ApiError;
use crate::config::{ClientConfig, Timeouts, normalize_api_url};
use crate::session::credential::Credential;

/// HTTP client bound to one API origin.
#[derive(Clone, Debug)]
pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    my_reviews_path: String,
}

impl HttpApi {
    /// Build a client from typed config, seeding the cookie jar when a
    /// session cookie was supplied.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut api = Self::build(&config.api_url, config.timeouts, config.session_cookie.as_deref())?;
        api.my_reviews_path.clone_from(&config.my_reviews_path);
        Ok(api)
    }

    /// Build a client for `base_url` with default timeouts and an empty jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the client fails to build.
    pub fn with_base_url(base_url: &str) -> Result<Self, ApiError> {
        Self::build(base_url, Timeouts::default(), None)
    }

    fn build(base_url: &str, timeouts: Timeouts, session_cookie: Option<&str>) -> Result<Self, ApiError> {
        let base_url = normalize_api_url(base_url);
        let origin = Url::parse(&base_url).map_err(|e| ApiError::ClientBuild(format!("invalid API URL {base_url}: {e}")))?;

        let jar = Arc::new(Jar::default());
        if let Some(cookie) = session_cookie {
            jar.add_cookie_str(cookie, &origin);
        }

        let mut builder = reqwest::Client::builder()
            .cookie_provider(jar)
            .connect_timeout(timeouts.connect());
        if let Some(timeout) = timeouts.request() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| ApiError::ClientBuild(e.to_string()))?;

        Ok(Self { http, base_url, my_reviews_path: MY_REVIEWS_PATH.to_owned() })
    }

    /// API origin without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Path used by [`HttpApi::my_reviews`].
    #[must_use]
    pub fn my_reviews_path(&self) -> &str {
        &self.my_reviews_path
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    /// Start a request with the credential attached.
    pub(crate) fn request(&self, method: Method, path: &str, credential: Option<&Credential>) -> RequestBuilder {
        let builder = self.http.request(method, self.endpoint(path));
        match credential {
            Some(credential) => attach(builder, credential),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body of type `T`.
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let (status, body) = self.send_raw(builder).await?;
        decode_response(status, &body)
    }

    /// Send a request and return its status and body text without judging either.
    pub(crate) async fn send_raw(&self, builder: RequestBuilder) -> Result<(u16, String), ApiError> {
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

/// Attach the credential per its strategy.
#[must_use]
pub fn attach(builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
    match credential {
        // The jar adds the session cookie on its own.
        Credential::Cookie => builder,
        Credential::Bearer(token) => builder.bearer_auth(token),
    }
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map a status/body pair to a decoded value or an [`ApiError`].
///
/// # Errors
///
/// `Rejected` for non-2xx statuses, `Malformed` when the body is not a `T`.
pub fn decode_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    if !(200..300).contains(&status) {
        return Err(ApiError::Rejected { status, message: rejection_message(status, body) });
    }
    serde_json::from_str(body).map_err(|e| ApiError::Malformed(e.to_string()))
}

/// Prefer the server's `error`/`message` field, then the raw body, then the status.
pub(crate) fn rejection_message(status: u16, body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(text) = map.get(key).and_then(serde_json::Value::as_str) {
                return text.to_owned();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() { format!("HTTP {status}") } else { trimmed.to_owned() }
}
