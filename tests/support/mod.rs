//! In-memory platform shared by the integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tg_relay::platform::{ChatSummary, Cursor, DifferenceResponse, Platform};
use tg_relay::{Error, Result};

#[derive(Default)]
pub struct MemoryPlatform {
    pub chats: Vec<ChatSummary>,
    pub state: Option<Cursor>,
    responses: Mutex<VecDeque<Result<DifferenceResponse>>>,
    sent: Mutex<Vec<(i64, String)>>,
    cursors: Mutex<Vec<Cursor>>,
}

impl MemoryPlatform {
    pub fn new(chats: Vec<ChatSummary>, state: Cursor) -> Self {
        Self {
            chats,
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn push(&self, response: DifferenceResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(Error::TelegramError(message.to_string())));
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Cursors passed to every difference request, in order.
    pub fn requested_cursors(&self) -> Vec<Cursor> {
        self.cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn discoverable_chats(&self) -> Result<Vec<ChatSummary>> {
        Ok(self.chats.clone())
    }

    async fn current_cursor(&self) -> Result<Cursor> {
        self.state
            .ok_or_else(|| Error::TelegramError("AUTH_KEY_UNREGISTERED".to_string()))
    }

    async fn difference(&self, cursor: Cursor, _pts_total_limit: i32) -> Result<DifferenceResponse> {
        self.cursors.lock().unwrap().push(cursor);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::TelegramError("connection closed".to_string())))
    }

    async fn send_text(&self, chat_id: i64, text: &str, _random_id: i64) -> Result<()> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}
