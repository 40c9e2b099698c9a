use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;
use web3::types::{Address, H256, U256};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc error: {0}")]
    Rpc(#[from] web3::Error),
    #[error("contract call failed: {0}")]
    Contract(#[from] web3::contract::Error),
    #[error("abi error: {0}")]
    Abi(#[from] web3::ethabi::Error),
    #[error("{call} timed out after {}s", .after.as_secs())]
    Timeout { call: &'static str, after: Duration },
    #[error("subscription closed by node")]
    SubscriptionClosed,
    #[error("block {0:#x} not found")]
    BlockNotFound(H256),
    #[error("missing field `{0}` in node response")]
    MissingField(&'static str),
    #[error("decimals value {0} does not fit in u8")]
    DecimalsOutOfRange(U256),
}

/// One `AnswerUpdated` event as emitted by an aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerUpdate {
    /// The int256 answer as a raw two's complement word.
    pub current: U256,
    pub round_id: U256,
    pub updated_at: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub transaction_count: usize,
}

pub type ChainStream<T> = BoxStream<'static, Result<T, ChainError>>;

/// The node capabilities the listeners depend on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the aggregator currently behind a proxy.
    async fn aggregator(&self, proxy: Address) -> Result<Address, ChainError>;

    async fn decimals(&self, aggregator: Address) -> Result<u8, ChainError>;

    async fn description(&self, aggregator: Address) -> Result<String, ChainError>;

    async fn subscribe_answers(
        &self,
        aggregator: Address,
    ) -> Result<ChainStream<AnswerUpdate>, ChainError>;

    /// Stream of new block header hashes.
    async fn subscribe_new_heads(&self) -> Result<ChainStream<H256>, ChainError>;

    async fn block_summary(&self, hash: H256) -> Result<BlockSummary, ChainError>;
}

/// Bounds an RPC call by `after`, reporting `call` on expiry.
pub async fn bounded<T, F>(call: &'static str, after: Duration, fut: F) -> Result<T, ChainError>
where
    F: std::future::Future<Output = Result<T, ChainError>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| ChainError::Timeout { call, after })?
}
