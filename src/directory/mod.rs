//! Client-side directory logic: search filtering and form validation.
//!
//! DESIGN
//! ======
//! Everything here is pure and synchronous. Network calls for the same
//! features live in `net::directory`.

pub mod filter;
pub mod forms;

pub use filter::{SearchQuery, filter_businesses};
pub use forms::{ImageUpload, NewBusiness, NewReview, ValidationError};
