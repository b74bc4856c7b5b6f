//! Error taxonomy for calls to the Bussy API.

/// Errors produced by HTTP calls against the API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, timeout, reset).
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("server rejected request: status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The response body could not be decoded into the expected type.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The HTTP client or a request could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl ApiError {
    /// True for 401/403, i.e. the credential was refused.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Rejected { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Malformed(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}
