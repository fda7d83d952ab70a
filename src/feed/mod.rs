//! Feed subscriptions.
//!
//! A feed is created when the user subscribes and mutated on every refresh
//! attempt. This crate never deletes feeds on its own.

pub mod repository;
pub mod types;

pub use repository::FeedRepository;
pub use types::{Feed, NewFeed, RefreshInterval, UpdateStatus};
