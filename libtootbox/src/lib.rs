//! Tootbox - relay chat messages into rate-gated Mastodon posts
//!
//! This library provides the durable per-user outbox, the remote rate
//! gate, and the drain scheduler that together turn buffered chat
//! input into spaced-out posts on a user's Mastodon account.

pub mod accumulator;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod mastodon;
pub mod mock;
pub mod outbox;
pub mod remote;
pub mod scheduler;
pub mod settings;
pub mod types;

// Re-export commonly used types
pub use accumulator::InputAccumulator;
pub use config::Config;
pub use db::Database;
pub use error::{ObservationError, PublishError, Result, TootboxError};
pub use mastodon::MastodonGateway;
pub use outbox::Outbox;
pub use remote::{Publisher, RateGate};
pub use scheduler::{DrainScheduler, Notifier, NullNotifier};
pub use settings::SettingsStore;
pub use types::{QueuedItem, UserCredentials};
