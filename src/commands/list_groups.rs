//! List discoverable chats
//!
//! Shows what the relay can see when it resolves `CHATS`, so titles can be
//! copied into the configuration verbatim.

use serde::Serialize;

use crate::auth::{authorize, TerminalAuth};
use crate::config::Config;
use crate::error::Result;
use crate::platform::{ChatKind, ChatSummary, Platform, TelegramPlatform};
use crate::resolver::match_destinations;
use crate::session::{get_client, SessionLock};

#[derive(Debug, Serialize)]
struct GroupRow<'a> {
    id: i64,
    kind: &'static str,
    title: &'a str,
    destination: bool,
}

fn rows<'a>(chats: &'a [ChatSummary], names: &[String]) -> Vec<GroupRow<'a>> {
    let destinations = match_destinations(chats, names);
    chats
        .iter()
        .map(|chat| GroupRow {
            id: chat.id,
            kind: chat.kind.as_str(),
            title: &chat.title,
            destination: chat.kind == ChatKind::Group && destinations.contains(&chat.id),
        })
        .collect()
}

fn render_table(rows: &[GroupRow<'_>]) -> String {
    let mut out = format!("{:<14} {:<12} {:<5} {}\n", "ID", "KIND", "DEST", "TITLE");
    for row in rows {
        out.push_str(&format!(
            "{:<14} {:<12} {:<5} {}\n",
            row.id,
            row.kind,
            if row.destination { "yes" } else { "" },
            row.title
        ));
    }
    out
}

pub async fn run(config: &Config, json: bool) -> Result<()> {
    let _lock = SessionLock::acquire(config.lock_file())?;
    let client = get_client(config)?;
    authorize(&client, &config.api_hash, &TerminalAuth::new(config.phone.clone())).await?;

    let platform = TelegramPlatform::new(client.client.clone());
    let chats = platform.discoverable_chats().await;
    client.disconnect().await;
    let chats = chats?;
    let rows = rows(&chats, &config.destinations);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", render_table(&rows));
        println!("\nTotal: {}", rows.len());
    }

    Ok(())
}
