//! Add-listing and review forms, validated before anything hits the network.

#[cfg(test)]
#[path = "forms_test.rs"]
mod forms_test;

use std::path::Path;

use serde::Serialize;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("File size must be less than 5MB")]
    ImageTooLarge { bytes: usize },

    #[error("Only image files are allowed")]
    NotAnImage { mime: String },

    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),

    #[error("could not read image: {0}")]
    ImageRead(String),
}

/// Fields of the add-listing form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewBusiness {
    pub name: String,
    pub category: String,
    pub formatted_address: String,
    pub phone_number: String,
    pub website: String,
    pub promotion: String,
    pub image: Option<ImageUpload>,
}

impl NewBusiness {
    /// Check the required fields: name, category and address.
    ///
    /// # Errors
    ///
    /// Returns the first required field that is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (label, value) in [
            ("name", &self.name),
            ("category", &self.category),
            ("formattedAddress", &self.formatted_address),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(label));
            }
        }
        Ok(())
    }

    /// Multipart text fields, skipping blanks the way the form does.
    #[must_use]
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        [
            ("name", &self.name),
            ("category", &self.category),
            ("formattedAddress", &self.formatted_address),
            ("phoneNumber", &self.phone_number),
            ("website", &self.website),
            ("promotion", &self.promotion),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| (key, value.trim().to_owned()))
        .collect()
    }
}

/// An image attached to a new listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Validate size and MIME type.
    ///
    /// # Errors
    ///
    /// Rejects payloads over [`MAX_IMAGE_BYTES`] and non-`image/*` types.
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ValidationError> {
        let mime = mime.into();
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ValidationError::ImageTooLarge { bytes: bytes.len() });
        }
        if !mime.starts_with("image/") {
            return Err(ValidationError::NotAnImage { mime });
        }
        Ok(Self { file_name: file_name.into(), mime, bytes })
    }

    /// Read and validate an image from disk, guessing the MIME type from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let mime = mime_for_path(path);
        if !mime.starts_with("image/") {
            return Err(ValidationError::NotAnImage { mime });
        }
        let metadata = std::fs::metadata(path).map_err(|e| ValidationError::ImageRead(e.to_string()))?;
        let len = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if len > MAX_IMAGE_BYTES {
            return Err(ValidationError::ImageTooLarge { bytes: len });
        }
        let bytes = std::fs::read(path).map_err(|e| ValidationError::ImageRead(e.to_string()))?;
        let file_name = path
            .file_name()
            .map_or_else(|| "image".to_owned(), |name| name.to_string_lossy().into_owned());
        Self::new(file_name, mime, bytes)
    }
}

/// MIME type guessed from the file extension; unknown extensions are
/// `application/octet-stream`.
#[must_use]
pub fn mime_for_path(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}

/// Body of `POST /api/reviews`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub rating: u8,
    pub comment: String,
    pub business_id: String,
}

impl NewReview {
    /// # Errors
    ///
    /// Rejects ratings outside 1–5 and blank comments.
    pub fn new(business_id: impl Into<String>, rating: u8, comment: impl Into<String>) -> Result<Self, ValidationError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ValidationError::RatingOutOfRange(rating));
        }
        let comment = comment.into();
        if comment.trim().is_empty() {
            return Err(ValidationError::MissingField("comment"));
        }
        Ok(Self { rating, comment, business_id: business_id.into() })
    }
}
