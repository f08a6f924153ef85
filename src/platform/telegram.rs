//! [`Platform`] over the grammers MTProto client using raw TL calls.

use async_trait::async_trait;
use grammers_client::Client;
use grammers_tl_types as tl;

use super::{
    ChatKind, ChatSummary, Cursor, DifferenceBatch, DifferenceResponse, Platform, SourceMessage,
    UpdateEvent,
};
use crate::error::Result;

/// Telegram-backed platform.
#[derive(Clone)]
pub struct TelegramPlatform {
    client: Client,
}

impl TelegramPlatform {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Platform for TelegramPlatform {
    async fn discoverable_chats(&self) -> Result<Vec<ChatSummary>> {
        let response = self
            .client
            .invoke(&tl::functions::channels::GetGroupsForDiscussion {})
            .await?;

        let chats = match response {
            tl::enums::messages::Chats::Chats(c) => c.chats,
            tl::enums::messages::Chats::Slice(s) => s.chats,
        };

        Ok(chats.iter().map(chat_summary).collect())
    }

    async fn current_cursor(&self) -> Result<Cursor> {
        let tl::enums::updates::State::State(state) =
            self.client.invoke(&tl::functions::updates::GetState {}).await?;
        Ok(Cursor {
            pts: state.pts,
            date: state.date,
        })
    }

    async fn difference(&self, cursor: Cursor, pts_total_limit: i32) -> Result<DifferenceResponse> {
        let request = tl::functions::updates::GetDifference {
            pts: cursor.pts,
            pts_limit: None,
            pts_total_limit: Some(pts_total_limit),
            date: cursor.date,
            qts: 0,
            qts_limit: None,
        };

        let response = self.client.invoke(&request).await?;
        Ok(convert_difference(response))
    }

    async fn send_text(&self, chat_id: i64, text: &str, random_id: i64) -> Result<()> {
        let request = tl::functions::messages::SendMessage {
            no_webpage: false,
            silent: false,
            background: false,
            clear_draft: false,
            noforwards: false,
            update_stickersets_order: false,
            invert_media: false,
            allow_paid_floodskip: false,
            peer: tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id }),
            reply_to: None,
            message: text.to_string(),
            random_id,
            reply_markup: None,
            entities: None,
            schedule_date: None,
            send_as: None,
            quick_reply_shortcut: None,
            effect: None,
            allow_paid_stars: None,
            suggested_post: None,
        };

        self.client.invoke(&request).await?;
        Ok(())
    }
}

fn chat_summary(chat: &tl::enums::Chat) -> ChatSummary {
    match chat {
        tl::enums::Chat::Chat(c) => ChatSummary::new(c.id, c.title.clone(), ChatKind::Group),
        tl::enums::Chat::Channel(c) => ChatSummary::new(c.id, c.title.clone(), ChatKind::Channel),
        tl::enums::Chat::ChannelForbidden(c) => {
            ChatSummary::new(c.id, c.title.clone(), ChatKind::Unavailable)
        }
        tl::enums::Chat::Forbidden(c) => {
            ChatSummary::new(c.id, c.title.clone(), ChatKind::Unavailable)
        }
        tl::enums::Chat::Empty(c) => ChatSummary::new(c.id, String::new(), ChatKind::Unavailable),
    }
}

fn state_cursor(state: &tl::enums::updates::State) -> Cursor {
    let tl::enums::updates::State::State(s) = state;
    Cursor {
        pts: s.pts,
        date: s.date,
    }
}

fn convert_difference(response: tl::enums::updates::Difference) -> DifferenceResponse {
    match response {
        tl::enums::updates::Difference::Empty(d) => DifferenceResponse::NoChanges { date: d.date },
        tl::enums::updates::Difference::TooLong(d) => DifferenceResponse::TooLong { pts: d.pts },
        tl::enums::updates::Difference::Difference(d) => {
            DifferenceResponse::Difference(DifferenceBatch {
                cursor: state_cursor(&d.state),
                chats: d.chats.iter().map(chat_summary).collect(),
                events: d.other_updates.iter().map(update_event).collect(),
                complete: true,
            })
        }
        tl::enums::updates::Difference::Slice(d) => {
            DifferenceResponse::Difference(DifferenceBatch {
                cursor: state_cursor(&d.intermediate_state),
                chats: d.chats.iter().map(chat_summary).collect(),
                events: d.other_updates.iter().map(update_event).collect(),
                complete: false,
            })
        }
    }
}

fn update_event(update: &tl::enums::Update) -> UpdateEvent {
    let tl::enums::Update::NewChannelMessage(update) = update else {
        return UpdateEvent::Other;
    };
    let tl::enums::Message::Message(message) = &update.message else {
        return UpdateEvent::Other;
    };
    let tl::enums::Peer::Channel(peer) = &message.peer_id else {
        return UpdateEvent::Other;
    };

    UpdateEvent::NewChannelMessage {
        channel_id: peer.channel_id,
        message: SourceMessage {
            id: message.id,
            text: message.message.clone(),
        },
    }
}
