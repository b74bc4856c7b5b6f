//! Identity endpoints: who-am-I, OAuth entry point, logout.

use reqwest::Method;

use super::client::HttpApi;
use super::error::ApiError;
use super::types::Identity;
use crate::session::credential::Credential;

pub const AUTH_USER_PATH: &str = "/api/auth/user";
pub const AUTH_GOOGLE_PATH: &str = "/api/auth/google";
pub const AUTH_LOGOUT_PATH: &str = "/api/auth/logout";

/// The identity API as the session store sees it. Enables mocking in tests.
#[async_trait::async_trait]
pub trait IdentityApi: Send + Sync {
    /// Ask the server who the credential belongs to.
    ///
    /// # Errors
    ///
    /// `Rejected` for non-2xx, `Malformed` for an undecodable identity,
    /// `Transport` when no response arrived.
    async fn fetch_identity(&self, credential: &Credential) -> Result<Identity, ApiError>;

    /// Tell the server to end the session. The response body is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    async fn logout(&self, credential: &Credential) -> Result<(), ApiError>;

    /// Absolute URL of the identity provider's authorization entry point.
    fn login_url(&self) -> String;
}

#[async_trait::async_trait]
impl IdentityApi for HttpApi {
    async fn fetch_identity(&self, credential: &Credential) -> Result<Identity, ApiError> {
        let request = self.request(Method::GET, AUTH_USER_PATH, Some(credential));
        self.send_json(request).await
    }

    async fn logout(&self, credential: &Credential) -> Result<(), ApiError> {
        let request = self.request(Method::GET, AUTH_LOGOUT_PATH, Some(credential));
        let (status, body) = self.send_raw(request).await?;
        if !(200..400).contains(&status) {
            return Err(ApiError::Rejected { status, message: super::client::rejection_message(status, &body) });
        }
        Ok(())
    }

    fn login_url(&self) -> String {
        self.endpoint(AUTH_GOOGLE_PATH)
    }
}
