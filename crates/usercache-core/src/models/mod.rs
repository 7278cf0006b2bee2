//! Data models for user records.
//!
//! - `UserRecord`: an opaque user object with a required `id`
//! - `UserId`: the identifier that keys the local snapshot

pub mod user;

pub use user::{UserId, UserRecord};
