use crate::chain::{AnswerUpdate, ChainClient, ChainError};
use crate::config::FeedDescriptor;
use crate::price::PriceUpdate;
use futures::stream::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed acquiring aggregator address: {0}")]
    Resolution(ChainError),
    #[error("failed acquiring decimals: {0}")]
    Decimals(ChainError),
    #[error("failed subscribing to price updates: {0}")]
    Subscribe(ChainError),
    #[error("failed while listening for price updates: {0}")]
    Stream(ChainError),
}

/// Logs every `AnswerUpdated` event of one price feed as a decimal price.
pub struct FeedListener {
    client: Arc<dyn ChainClient>,
    feed: FeedDescriptor,
    feed_address: String,
}

impl FeedListener {
    pub fn new(client: Arc<dyn ChainClient>, feed: FeedDescriptor) -> Self {
        let feed_address = format!("{:#x}", feed.address);
        FeedListener {
            client,
            feed,
            feed_address,
        }
    }

    /// Listens until `shutdown` fires or the feed fails. A failure is logged once
    /// here and returned; cancellation returns `Ok` silently.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), FeedError> {
        let result = self.listen(&shutdown).await;
        if let Err(err) = &result {
            error!(
                feedAddress = %self.feed_address,
                label = %self.feed.label,
                "{err}"
            );
        }
        result
    }

    async fn listen(&self, shutdown: &CancellationToken) -> Result<(), FeedError> {
        let aggregator = self
            .client
            .aggregator(self.feed.address)
            .await
            .map_err(FeedError::Resolution)?;

        // Read once; a proxy phase change to an aggregator with another scale is not tracked.
        let decimals = self
            .client
            .decimals(aggregator)
            .await
            .map_err(FeedError::Decimals)?;

        let description = match self.client.description(aggregator).await {
            Ok(description) => description,
            Err(err) => {
                warn!(
                    feedAddress = %self.feed_address,
                    label = %self.feed.label,
                    error = %err,
                    "Failed reading feed description"
                );
                String::new()
            }
        };

        let mut updates = self
            .client
            .subscribe_answers(aggregator)
            .await
            .map_err(FeedError::Subscribe)?;

        info!(
            feedAddress = %self.feed_address,
            label = %self.feed.label,
            aggregator = %format!("{aggregator:#x}"),
            decimals,
            description = %description,
            "Monitoring price"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                next = updates.next() => match next {
                    Some(Ok(answer)) => self.log_price(&answer, decimals),
                    Some(Err(err)) => return Err(FeedError::Stream(err)),
                    None => return Err(FeedError::Stream(ChainError::SubscriptionClosed)),
                },
            }
        }
    }

    fn log_price(&self, answer: &AnswerUpdate, decimals: u8) {
        let price = PriceUpdate::from_int256(answer.current, decimals).render();
        info!(label = %self.feed.label, price = %price, "New price");
        debug!(
            label = %self.feed.label,
            round_id = %answer.round_id,
            updated_at = %answer.updated_at,
            "Answer round"
        );
    }
}
