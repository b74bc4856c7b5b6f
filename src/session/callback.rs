//! Login redirect parsing.
//!
//! The identity provider sends the user back to `/auth-callback?token=...`.
//! The token is pulled out of the URL and the URL is rebuilt without it, so
//! it is consumed once and never left visible.

#[cfg(test)]
#[path = "callback_test.rs"]
mod callback_test;

use reqwest::Url;

use super::token_store::StoreError;

/// Query parameter carrying the bearer token on the callback URL.
pub const TOKEN_PARAM: &str = "token";

const RELATIVE_BASE: &str = "http://callback.invalid";

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("invalid callback URL: {0}")]
    InvalidUrl(String),

    #[error("could not persist token: {0}")]
    Store(#[from] StoreError),
}

/// A callback URL split into its token and the URL to show afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrippedCallback {
    pub token: Option<String>,
    pub clean_url: String,
}

/// Remove every `token` parameter from `raw`, keeping the first non-empty value.
///
/// Relative callback paths (`/auth-callback?token=...`) stay relative.
///
/// # Errors
///
/// Returns [`CallbackError::InvalidUrl`] when `raw` is not a URL or path.
pub fn strip_token(raw: &str) -> Result<StrippedCallback, CallbackError> {
    let raw = raw.trim();
    let relative = raw.starts_with('/') && !raw.starts_with("//");
    let parsed = if relative {
        Url::parse(RELATIVE_BASE).and_then(|base| base.join(raw))
    } else {
        Url::parse(raw)
    };
    let mut url = parsed.map_err(|e| CallbackError::InvalidUrl(format!("{raw}: {e}")))?;

    let mut token = None;
    let mut kept = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == TOKEN_PARAM {
            if token.is_none() && !value.is_empty() {
                token = Some(value.into_owned());
            }
        } else {
            kept.push((key.into_owned(), value.into_owned()));
        }
    }

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let clean_url = if relative { relative_form(&url) } else { url.to_string() };
    Ok(StrippedCallback { token, clean_url })
}

fn relative_form(url: &Url) -> String {
    let mut out = url.path().to_owned();
    if let Some(query) = url.query() {
        out.push('?');
        out.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        out.push('#');
        out.push_str(fragment);
    }
    out
}
