#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! iNaturalist API client.
//!
//! Reads go through the public v1 API; writes go through the legacy
//! `observations.json` endpoints with an OAuth access token obtained by the
//! password grant. Every request is retried on transient failures by the
//! [`retry`] helpers.

pub mod client;
pub mod parse;
pub mod retry;

pub use client::InatClient;

/// Errors that can occur when talking to iNaturalist.
#[derive(Debug, thiserror::Error)]
pub enum InatError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with an error status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response summary.
        message: String,
    },

    /// Credentials are missing or were rejected.
    #[error("Authentication error: {message}")]
    Auth {
        /// Description of what went wrong.
        message: String,
    },

    /// A response could not be interpreted.
    #[error("Unexpected response: {message}")]
    Unexpected {
        /// Description of what went wrong.
        message: String,
    },
}

