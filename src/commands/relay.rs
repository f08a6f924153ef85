//! Relay command: log in, resolve destinations, then poll and relay forever.

use tracing::{info, warn};

use crate::auth::{authorize, TerminalAuth};
use crate::config::Config;
use crate::error::Result;
use crate::platform::TelegramPlatform;
use crate::poller::{PollSettings, SourceChannel, UpdatePoller};
use crate::relay::Relay;
use crate::resolver::resolve_destinations;
use crate::session::{get_client, SessionLock};

/// Run-time switches from the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Log messages instead of sending them.
    pub dry_run: bool,
}

pub async fn run(config: &Config, options: RunOptions) -> Result<()> {
    let names = config.require_destinations()?;
    let _lock = SessionLock::acquire(config.lock_file())?;
    let client = get_client(config)?;

    let auth = TerminalAuth::new(config.phone.clone());
    authorize(&client, &config.api_hash, &auth).await?;

    let platform = TelegramPlatform::new(client.client.clone());

    let destinations = resolve_destinations(&platform, names).await?;
    let mut relay = Relay::new(destinations).dry_run(options.dry_run);
    if options.dry_run {
        warn!("Dry run: messages will be logged, not sent");
    }

    let mut poller = UpdatePoller::start(
        &platform,
        SourceChannel::new(&config.source_channel),
        config.pts_total_limit,
    )
    .await?;

    info!(
        source = %config.source_channel,
        destinations = relay.destinations().len(),
        "Relay started"
    );

    let settings = PollSettings {
        interval: config.poll_interval,
        retry: config.retry,
    };
    let result = poller
        .run(&platform, &mut relay, settings, shutdown_signal())
        .await;
    client.disconnect().await;
    result
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}
