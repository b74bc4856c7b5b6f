//! Wire DTOs for the Bussy API.
//!
//! DESIGN
//! ======
//! Field names follow the server's camelCase JSON. Record ids arrive as
//! either strings or numbers depending on the backing store, so every id is
//! normalised to a `String` on the way in.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// The authenticated user as returned by `GET /api/auth/user`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Server-side user identifier.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display name.
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar image URL.
    #[serde(default)]
    pub picture: Option<String>,
    /// Any further profile fields the server sends.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A business listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub formatted_address: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub promotion: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl Business {
    /// Rating formatted to one decimal, or `None` when nothing is rated yet.
    #[must_use]
    pub fn rating_label(&self) -> Option<String> {
        (self.average_rating > 0.0).then(|| format!("{:.1}", self.average_rating))
    }
}

/// A single star-rated review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub business_id: Option<String>,
    #[serde(default)]
    pub user: Option<ReviewAuthor>,
    #[serde(default)]
    pub business: Option<BusinessRef>,
}

/// Author summary embedded in a review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewAuthor {
    pub name: String,
}

/// Business summary embedded in a review from `/api/reviews/user`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRef {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Str(String),
    Int(i64),
    Uint(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Int(n) => n.to_string(),
            Self::Uint(n) => n.to_string(),
        }
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let id = RawId::deserialize(deserializer)?.into_string();
    if id.is_empty() {
        return Err(D::Error::custom("empty id"));
    }
    Ok(id)
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(RawId::into_string))
}
