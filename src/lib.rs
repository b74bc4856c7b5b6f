//! # bussy
//!
//! Native client for the Bussy local-business directory API.
//!
//! The crate holds the session store that mirrors the server's view of the
//! current user, the reqwest transport for the identity and directory
//! endpoints, and the small amount of client-side directory logic (search
//! filtering and form validation). The `cli` crate drives it from the shell.

pub mod config;
pub mod directory;
pub mod net;
pub mod session;
