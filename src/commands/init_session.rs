//! Session initialization command
//!
//! Logs the configured account in and leaves an authorized session file behind,
//! so later `run` invocations start without prompting.

use crate::auth::{authorize, TerminalAuth};
use crate::config::Config;
use crate::error::Result;
use crate::session::{get_client, SessionLock};

pub async fn run(config: &Config) -> Result<()> {
    let _lock = SessionLock::acquire(config.lock_file())?;

    println!("Initialising Telegram session for {}", config.phone);
    println!("Session file: {}\n", config.session_file());

    let client = get_client(config)?;
    let auth = TerminalAuth::new(config.phone.clone());

    let signed_in = authorize(&client, &config.api_hash, &auth).await;
    client.disconnect().await;

    if signed_in? {
        println!("\n✅ Signed in, session saved to {}", config.session_file());
    } else {
        println!("✅ Session is already authorized, nothing to do");
    }

    Ok(())
}
