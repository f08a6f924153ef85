//! Telegram channel relay library
//!
//! This library provides tools to:
//! - Log in to an existing Telegram account from the terminal
//! - Resolve destination groups by title
//! - Poll the account's update stream with `getDifference`
//! - Relay new posts from a source channel to every destination group
//! - Export Prometheus metrics about polling and delivery

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod platform;
pub mod poller;
pub mod relay;
pub mod resolver;
pub mod session;

// Re-export common types
pub use config::{Config, RetryPolicy};
pub use error::{Error, Result};
pub use platform::{Platform, TelegramPlatform};
pub use poller::{PollOutcome, PollSettings, SourceChannel, UpdatePoller};
pub use relay::{Delivery, Relay, RelayReport};
pub use session::{get_client, SessionLock};

pub mod commands;
