//! Networking modules for the Bussy REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `client` owns the reqwest transport, `identity` implements the auth
//! endpoints the session store drives, `directory` covers businesses and
//! reviews, and `types` defines the shared wire schema.

pub mod client;
pub mod directory;
pub mod error;
pub mod identity;
pub mod types;

pub use client::HttpApi;
pub use error::ApiError;
pub use identity::IdentityApi;
