//! Destination chat resolution by title

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::platform::{ChatKind, ChatSummary, Platform};

/// Ids of discoverable plain groups whose title exactly equals one of `names`.
///
/// Platform order is kept. A chat id reported more than once is returned once.
pub async fn resolve_destinations<P>(platform: &P, names: &[String]) -> Result<Vec<i64>>
where
    P: Platform + ?Sized,
{
    let chats = platform.discoverable_chats().await?;
    debug!(discovered = chats.len(), "Discoverable chats fetched");

    let destinations = match_destinations(&chats, names);

    if destinations.is_empty() {
        warn!(
            names = ?names,
            "No discoverable group matches the configured names, messages will not be relayed"
        );
    } else {
        info!(
            count = destinations.len(),
            ids = ?destinations,
            "Resolved destination chats"
        );
    }

    Ok(destinations)
}

/// Pure matching step of [`resolve_destinations`].
pub fn match_destinations(chats: &[ChatSummary], names: &[String]) -> Vec<i64> {
    let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();

    chats
        .iter()
        .filter(|chat| chat.kind == ChatKind::Group)
        .filter(|chat| wanted.contains(chat.title.as_str()))
        .filter(|chat| seen.insert(chat.id))
        .map(|chat| chat.id)
        .collect()
}
