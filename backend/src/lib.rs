//! Upload backend fronting a Backblaze B2 bucket

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// HTTP route handlers
pub mod routes;

/// Server bootstrap
pub mod server;

/// Configuration and error types
pub mod types;
