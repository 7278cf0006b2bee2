//! HTTP client for the remote user collection.
//!
//! The endpoint is a single unauthenticated GET returning a JSON array of
//! user objects. Every failure is reported as an `ApiError` so the fetcher
//! can decide to fall back to the local snapshot.

pub mod client;
pub mod error;

pub use client::UserApiClient;
pub use error::ApiError;
