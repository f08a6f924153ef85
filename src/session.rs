//! Session management for the Telegram client
//!
//! Provides:
//! - File-based session locking so two relays never share one session
//! - Client creation on top of the grammers sender pool

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use grammers_client::Client;
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::{Error, Result};

/// Session lock guard that ensures exclusive access to the Telegram session.
pub struct SessionLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl SessionLock {
    /// Acquire an exclusive lock at `path`.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                lock_file: Some(lock_file),
            }),
            Err(_) => {
                error!(
                    lock = %path.display(),
                    "Telegram session is already in use by another process"
                );
                Err(Error::SessionLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(ref file) = self.lock_file {
            let _ = file.unlock();
        }
        if self.lock_file.take().is_some() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Open (or create) the SQLite session file.
pub fn open_session<P: AsRef<Path>>(path: P) -> Result<Arc<SqliteSession>> {
    let path = path.as_ref();
    let session = SqliteSession::open(path).map_err(|e| {
        Error::SessionNotFound(format!("Failed to open session {}: {}", path.display(), e))
    })?;
    Ok(Arc::new(session))
}

/// Holder for SenderPool components and Client
pub struct TelegramClient {
    pub client: Client,
    handle: SenderPoolHandle,
    runner: tokio::task::JoinHandle<()>,
}

impl TelegramClient {
    /// Create a new TelegramClient from session
    pub fn connect(session: Arc<SqliteSession>, api_id: i32) -> Self {
        let pool = SenderPool::new(session, api_id);
        let client = Client::new(&pool);

        // Updates are pulled with getDifference, the pushed stream is not consumed.
        let SenderPool { runner, handle, .. } = pool;

        let runner_handle = tokio::spawn(async move {
            runner.run().await;
        });
        debug!("Telegram sender pool started");

        Self {
            client,
            handle,
            runner: runner_handle,
        }
    }

    /// Close all connections and wait for the sender pool to stop.
    pub async fn disconnect(self) {
        if !self.handle.quit() {
            debug!("Telegram sender pool already stopped");
        }
        if let Err(err) = self.runner.await {
            error!("Telegram sender pool task failed: {}", err);
        }
    }
}

impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Open the configured session and connect a client.
pub fn get_client(config: &Config) -> Result<TelegramClient> {
    let session = open_session(config.session_file())?;
    Ok(TelegramClient::connect(session, config.api_id))
}
