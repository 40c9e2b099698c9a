use crate::chain::{ChainClient, ChainError};
use futures::stream::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("failed subscribing to block creation: {0}")]
    Subscribe(ChainError),
    #[error("failed while listening for new blocks: {0}")]
    Stream(ChainError),
    #[error("failed getting block by hash: {0}")]
    Fetch(ChainError),
}

/// Logs the number and transaction count of every new block.
pub struct BlockListener {
    client: Arc<dyn ChainClient>,
}

impl BlockListener {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        BlockListener { client }
    }

    /// Listens until `shutdown` fires. A single failed block fetch ends the listener.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BlockError> {
        let result = self.listen(&shutdown).await;
        if let Err(err) = &result {
            error!("{err}");
        }
        result
    }

    async fn listen(&self, shutdown: &CancellationToken) -> Result<(), BlockError> {
        let mut heads = self
            .client
            .subscribe_new_heads()
            .await
            .map_err(BlockError::Subscribe)?;

        info!("Monitoring blocks");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                next = heads.next() => match next {
                    Some(Ok(hash)) => {
                        let block = self
                            .client
                            .block_summary(hash)
                            .await
                            .map_err(BlockError::Fetch)?;
                        info!(
                            number = block.number,
                            transactions = block.transaction_count,
                            "New block"
                        );
                    }
                    Some(Err(err)) => return Err(BlockError::Stream(err)),
                    None => return Err(BlockError::Stream(ChainError::SubscriptionClosed)),
                },
            }
        }
    }
}
