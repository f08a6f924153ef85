//! Update polling loop
//!
//! Keeps a cursor into the account's update stream, asks Telegram for the
//! difference since that cursor and hands new posts from the source channel
//! to the [`Relay`].

use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::RetryPolicy;
use crate::error::Result;
use crate::metrics;
use crate::platform::{ChatKind, Cursor, DifferenceBatch, DifferenceResponse, Platform, UpdateEvent};
use crate::relay::{Relay, RelayReport};

/// Case-insensitive match on the source channel title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceChannel {
    title: String,
}

impl SourceChannel {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_lowercase(),
        }
    }

    pub fn matches(&self, title: &str) -> bool {
        title.to_lowercase() == self.title
    }
}

/// What a single poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Idle,
    /// History gap; the cursor jumped to the reported pts without relaying.
    Resynced { pts: i32 },
    Processed {
        reports: Vec<RelayReport>,
        /// More changes are waiting behind this batch.
        complete: bool,
    },
}

/// Loop timing.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub retry: RetryPolicy,
}

pub struct UpdatePoller {
    cursor: Cursor,
    source: SourceChannel,
    pts_total_limit: i32,
}

impl UpdatePoller {
    pub fn new(cursor: Cursor, source: SourceChannel, pts_total_limit: i32) -> Self {
        Self {
            cursor,
            source,
            pts_total_limit,
        }
    }

    /// Start from the platform's current state.
    pub async fn start<P>(platform: &P, source: SourceChannel, pts_total_limit: i32) -> Result<Self>
    where
        P: Platform + ?Sized,
    {
        let cursor = platform.current_cursor().await?;
        info!(pts = cursor.pts, date = cursor.date, "Update cursor initialised");
        Ok(Self::new(cursor, source, pts_total_limit))
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Fetch one difference and relay matching posts.
    pub async fn poll_once<P>(&mut self, platform: &P, relay: &mut Relay) -> Result<PollOutcome>
    where
        P: Platform + ?Sized,
    {
        let response = platform.difference(self.cursor, self.pts_total_limit).await?;

        let outcome = match response {
            DifferenceResponse::NoChanges { date } => {
                self.cursor.date = date;
                PollOutcome::Idle
            }
            DifferenceResponse::TooLong { pts } => {
                warn!(
                    from = self.cursor.pts,
                    to = pts,
                    "Update history too long, resynchronising cursor; posts in the gap are skipped"
                );
                self.cursor.pts = pts;
                PollOutcome::Resynced { pts }
            }
            DifferenceResponse::Difference(batch) => {
                let complete = batch.complete;
                let reports = self.dispatch(platform, relay, &batch).await;
                self.cursor = batch.cursor;
                PollOutcome::Processed { reports, complete }
            }
        };

        metrics::record_poll(&outcome);
        Ok(outcome)
    }

    async fn dispatch<P>(&self, platform: &P, relay: &mut Relay, batch: &DifferenceBatch) -> Vec<RelayReport>
    where
        P: Platform + ?Sized,
    {
        let sources: HashSet<i64> = batch
            .chats
            .iter()
            .filter(|chat| chat.kind == ChatKind::Channel && self.source.matches(&chat.title))
            .map(|chat| chat.id)
            .collect();

        let mut reports = Vec::new();
        for event in &batch.events {
            match event {
                UpdateEvent::NewChannelMessage {
                    channel_id,
                    message,
                } => {
                    if !sources.contains(channel_id) {
                        continue;
                    }
                    if message.text.is_empty() {
                        debug!(message_id = message.id, "Source post has no text, skipping");
                        continue;
                    }
                    reports.push(relay.relay(platform, message).await);
                }
                UpdateEvent::Other => {}
            }
        }
        reports
    }

    /// Poll until `shutdown` resolves or polling fails more often than the retry policy allows.
    ///
    /// `shutdown` also interrupts an in-flight poll; a fan-out cut short that way
    /// leaves the last-relayed marker unchanged.
    pub async fn run<P, S>(
        &mut self,
        platform: &P,
        relay: &mut Relay,
        settings: PollSettings,
        shutdown: S,
    ) -> Result<()>
    where
        P: Platform + ?Sized,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut failures: u32 = 0;

        info!(
            interval_ms = settings.interval.as_millis() as u64,
            max_retries = settings.retry.max_retries,
            "Polling for updates"
        );

        loop {
            let started = Instant::now();
            let result = tokio::select! {
                biased;
                result = self.poll_once(platform, relay) => result,
                _ = &mut shutdown => {
                    info!("Shutdown requested during poll, stopping poller");
                    return Ok(());
                }
            };
            metrics::record_poll_duration(started.elapsed());

            let pause = match result {
                Ok(outcome) => {
                    failures = 0;
                    metrics::set_consecutive_failures(0);
                    match outcome {
                        PollOutcome::Processed { complete: false, .. } => Duration::ZERO,
                        _ => settings.interval,
                    }
                }
                Err(err) => {
                    failures += 1;
                    metrics::set_consecutive_failures(failures);
                    if failures > settings.retry.max_retries {
                        error!(error = %err, failures, "Polling failed, giving up");
                        return Err(err);
                    }
                    let delay = settings.retry.delay_for(failures);
                    warn!(
                        error = %err,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "Polling failed, retrying"
                    );
                    delay
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!(pts = self.cursor.pts, "Shutdown requested, stopping poller");
                    return Ok(());
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}
