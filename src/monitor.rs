use crate::block_listener::BlockListener;
use crate::chain::ChainClient;
use crate::config::FeedDescriptor;
use crate::event_listener::FeedListener;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How the listeners of one monitor run ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorReport {
    pub cancelled: usize,
    pub failed: usize,
}

impl MonitorReport {
    pub fn terminated(&self) -> usize {
        self.cancelled + self.failed
    }
}

/// Starts the block listener and one feed listener per feed and waits for all of them.
pub struct Monitor {
    client: Arc<dyn ChainClient>,
    feeds: Vec<FeedDescriptor>,
}

impl Monitor {
    pub fn new(client: Arc<dyn ChainClient>, feeds: Vec<FeedDescriptor>) -> Self {
        Monitor { client, feeds }
    }

    /// Runs until every listener has ended, cancelling them all on SIGINT or SIGTERM.
    pub async fn start(self) -> MonitorReport {
        let shutdown = CancellationToken::new();
        let signals = spawn_signal_handler(shutdown.clone());

        let report = self.run(shutdown.clone()).await;

        shutdown.cancel();
        if let Err(err) = signals.await {
            warn!(error = %err, "Signal handler task failed");
        }
        report
    }

    /// Runs every listener against `shutdown`. Returns only once all of them have
    /// terminated; a listener that ends is not restarted.
    pub async fn run(self, shutdown: CancellationToken) -> MonitorReport {
        let mut listeners = JoinSet::new();

        let blocks = BlockListener::new(self.client.clone());
        let token = shutdown.clone();
        listeners.spawn(async move { blocks.run(token).await.is_ok() });

        for feed in self.feeds {
            let listener = FeedListener::new(self.client.clone(), feed);
            let token = shutdown.clone();
            listeners.spawn(async move { listener.run(token).await.is_ok() });
        }

        info!(listeners = listeners.len(), "Listeners started");

        let mut report = MonitorReport::default();
        while let Some(joined) = listeners.join_next().await {
            match joined {
                Ok(true) => report.cancelled += 1,
                Ok(false) => report.failed += 1,
                Err(err) => {
                    error!(error = %err, "Listener task aborted");
                    report.failed += 1;
                }
            }
            if !listeners.is_empty() {
                info!(remaining = listeners.len(), "Listener terminated");
            }
        }

        info!(
            cancelled = report.cancelled,
            failed = report.failed,
            "All listeners stopped"
        );
        report
    }
}

/// Cancels `shutdown` on SIGINT/SIGTERM. The task also ends once `shutdown` is
/// cancelled by someone else.
pub fn spawn_signal_handler(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
            _ = shutdown.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(err) => {
            warn!(error = %err, "Failed installing SIGTERM handler");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed installing SIGINT handler");
        std::future::pending::<()>().await;
    }
}
