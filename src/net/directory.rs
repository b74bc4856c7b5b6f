//! Business and review endpoints.
//!
//! Reads are anonymous; writes and "my reviews" carry the caller's
//! credential, taken from the session store at call time.

use reqwest::Method;
use reqwest::multipart::{Form, Part};

use super::client::HttpApi;
use super::error::ApiError;
use super::types::{Business, Review};
use crate::directory::{NewBusiness, NewReview, SearchQuery};
use crate::session::credential::Credential;

pub const BUSINESSES_PATH: &str = "/api/businesses";
pub const REVIEWS_PATH: &str = "/api/reviews";
/// Default path of the signed-in user's reviews.
pub const MY_REVIEWS_PATH: &str = "/api/reviews/user";

#[must_use]
pub fn business_path(business_id: &str) -> String {
    format!("{BUSINESSES_PATH}/{business_id}")
}

#[must_use]
pub fn business_reviews_path(business_id: &str) -> String {
    format!("{REVIEWS_PATH}/business/{business_id}")
}

impl HttpApi {
    /// `GET /api/businesses`, passing non-empty search criteria as query params.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure, non-2xx, or a bad payload.
    pub async fn list_businesses(&self, query: &SearchQuery) -> Result<Vec<Business>, ApiError> {
        let request = self.request(Method::GET, BUSINESSES_PATH, None).query(&query.query_pairs());
        self.send_json(request).await
    }

    /// `GET /api/businesses/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure, non-2xx, or a bad payload.
    pub async fn get_business(&self, business_id: &str) -> Result<Business, ApiError> {
        let request = self.request(Method::GET, &business_path(business_id), None);
        self.send_json(request).await
    }

    /// `GET /api/reviews/business/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure, non-2xx, or a bad payload.
    pub async fn business_reviews(&self, business_id: &str) -> Result<Vec<Review>, ApiError> {
        let request = self.request(Method::GET, &business_reviews_path(business_id), None);
        self.send_json(request).await
    }

    /// `POST /api/reviews` as the signed-in user; returns the stored review.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure, non-2xx, or a bad payload.
    pub async fn post_review(&self, credential: &Credential, review: &NewReview) -> Result<Review, ApiError> {
        let request = self.request(Method::POST, REVIEWS_PATH, Some(credential)).json(review);
        self.send_json(request).await
    }

    /// `POST /api/businesses` as multipart form data with an optional image part.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure, non-2xx (carrying the
    /// server's `error` message), or a bad payload.
    pub async fn create_business(&self, credential: &Credential, business: &NewBusiness) -> Result<Business, ApiError> {
        let mut form = Form::new();
        for (key, value) in business.text_fields() {
            form = form.text(key, value);
        }
        if let Some(image) = &business.image {
            let part = Part::bytes(image.bytes.clone())
                .file_name(image.file_name.clone())
                .mime_str(&image.mime)
                .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
            form = form.part("image", part);
        }

        let request = self.request(Method::POST, BUSINESSES_PATH, Some(credential)).multipart(form);
        self.send_json(request).await
    }

    /// `GET /api/reviews/user` (or the configured path): reviews written by
    /// the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure, non-2xx, or a bad payload.
    pub async fn my_reviews(&self, credential: &Credential) -> Result<Vec<Review>, ApiError> {
        let request = self.request(Method::GET, self.my_reviews_path(), Some(credential));
        self.send_json(request).await
    }
}
