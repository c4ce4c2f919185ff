//! Background data refresh system
//!
//! Periodically re-syncs the build marker and reloads every site resource,
//! using tokio channels to report progress to the caller.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::data::{DataClient, SiteResource};

/// Messages sent from background refresh to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshMessage {
    /// Refresh started
    RefreshStarted,
    /// Site metadata was fetched; carries the build it announced
    BuildSynced(Option<i64>),
    /// A resource loaded successfully
    ResourceLoaded(SiteResource),
    /// An error occurred during refresh
    RefreshError(String),
    /// Refresh completed
    RefreshCompleted,
}

/// Configuration for the refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval between refresh cycles
    pub interval: Duration,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            enabled: true,
        }
    }
}

/// Handle for controlling the background refresh system
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    /// Flag to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Creates a new RefreshHandle and spawns the background refresh task
    ///
    /// The first cycle runs immediately, then once per interval.
    ///
    /// # Arguments
    /// * `client` - Client used to sync and reload
    /// * `config` - Configuration for the refresh interval
    ///
    /// # Returns
    /// A RefreshHandle that receives updates via the `receiver` channel
    pub fn spawn(client: DataClient, config: RefreshConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval);

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if run_cycle(&client, &msg_tx).await.is_err() {
                                // Receiver dropped
                                break;
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Shuts down the background refresh task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Runs one sync-and-reload cycle, reporting each step
async fn run_cycle(
    client: &DataClient,
    tx: &mpsc::Sender<RefreshMessage>,
) -> Result<(), mpsc::error::SendError<RefreshMessage>> {
    tx.send(RefreshMessage::RefreshStarted).await?;

    match client.sync_build().await {
        Ok(build) => tx.send(RefreshMessage::BuildSynced(build)).await?,
        Err(e) => tx.send(RefreshMessage::RefreshError(e.to_string())).await?,
    }

    let bundle = client.load_all().await;
    for (resource, result) in bundle.results {
        let message = match result {
            Ok(_) => RefreshMessage::ResourceLoaded(resource),
            Err(e) => RefreshMessage::RefreshError(format!("{}: {}", resource.name(), e)),
        };
        tx.send(message).await?;
    }

    tx.send(RefreshMessage::RefreshCompleted).await
}

/// Checks for pending refresh messages without blocking
///
/// # Arguments
/// * `handle` - The RefreshHandle to check
///
/// # Returns
/// * `Some(RefreshMessage)` if a message was available
/// * `None` if no messages are pending
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}
