//! Platform capabilities consumed by the relay
//!
//! The relay only needs four calls from Telegram. They are expressed as the
//! [`Platform`] trait so resolver, poller and relay can run against the real
//! client ([`TelegramPlatform`]) or an in-memory implementation in tests.

use async_trait::async_trait;

use crate::error::Result;

pub mod telegram;

pub use telegram::TelegramPlatform;

/// Kind of a discoverable chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// Plain (basic) group chat.
    Group,
    /// Broadcast channel or supergroup.
    Channel,
    /// Empty, forbidden or otherwise inaccessible chat.
    Unavailable,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Group => "group",
            ChatKind::Channel => "channel",
            ChatKind::Unavailable => "unavailable",
        }
    }
}

/// A chat as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub id: i64,
    pub title: String,
    pub kind: ChatKind,
}

impl ChatSummary {
    pub fn new(id: i64, title: impl Into<String>, kind: ChatKind) -> Self {
        Self {
            id,
            title: title.into(),
            kind,
        }
    }
}

/// Position in the account's update stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub pts: i32,
    pub date: i32,
}

/// A message eligible for relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    pub id: i32,
    pub text: String,
}

/// A single update event from a difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// A new message was posted to a channel.
    NewChannelMessage {
        channel_id: i64,
        message: SourceMessage,
    },
    /// Anything else; ignored by the relay.
    Other,
}

/// A batch of changes since a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceBatch {
    /// Cursor to continue from.
    pub cursor: Cursor,
    /// Chats referenced by `events`.
    pub chats: Vec<ChatSummary>,
    pub events: Vec<UpdateEvent>,
    /// `false` when the platform has more changes queued behind this batch.
    pub complete: bool,
}

/// Response to "what changed since this cursor".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DifferenceResponse {
    /// Nothing happened; only the server date moved.
    NoChanges { date: i32 },
    /// Too much history to summarize; the platform reports the pts to resume from.
    TooLong { pts: i32 },
    Difference(DifferenceBatch),
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// List chats the account can discover (groups usable for discussion).
    async fn discoverable_chats(&self) -> Result<Vec<ChatSummary>>;

    /// Current position of the update stream.
    async fn current_cursor(&self) -> Result<Cursor>;

    /// Changes since `cursor`, bounded by `pts_total_limit` events.
    async fn difference(&self, cursor: Cursor, pts_total_limit: i32) -> Result<DifferenceResponse>;

    /// Send `text` to a basic group. `random_id` lets the server drop retried duplicates.
    async fn send_text(&self, chat_id: i64, text: &str, random_id: i64) -> Result<()>;
}
