use crate::chain::{
    bounded, AnswerUpdate, BlockSummary, ChainClient, ChainError, ChainStream,
};
use crate::contract::{
    aggregator_contract, answer_updated_event, answer_updated_topic, decimals_from_word,
    decode_answer_updated, proxy_contract,
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::stream::StreamExt;
use std::time::Duration;
use tracing::info;
use web3::ethabi::RawLog;
use web3::{
    contract::Options,
    transports::WebSocket,
    types::{Address, BlockHeader, BlockId, FilterBuilder, Log, H256, U256},
    Web3,
};

/// A single WebSocket connection to a node, shared read-only by every listener.
#[derive(Clone)]
pub struct Web3Client {
    web3: Web3<WebSocket>,
}

impl Web3Client {
    /// Dials the node once; failing or exceeding `timeout` is fatal to the caller.
    pub async fn connect(node_url: &str, timeout: Duration) -> Result<Self> {
        require_websocket(node_url)?;
        let ws = tokio::time::timeout(timeout, WebSocket::new(node_url))
            .await
            .with_context(|| format!("timed out dialing node after {}s", timeout.as_secs()))?
            .context("failed dialing node")?;
        info!("Connected to Ethereum node");
        Ok(Web3Client {
            web3: Web3::new(ws),
        })
    }
}

/// Subscriptions need a duplex transport, so HTTP endpoints are refused up front.
fn require_websocket(node_url: &str) -> Result<()> {
    match node_url.split_once("://") {
        Some(("ws" | "wss", _)) => Ok(()),
        _ => bail!("unsupported node URL {node_url}: a ws:// or wss:// endpoint is required"),
    }
}

#[async_trait]
impl ChainClient for Web3Client {
    async fn aggregator(&self, proxy: Address) -> Result<Address, ChainError> {
        let contract = proxy_contract(self.web3.eth(), proxy)?;
        let address: Address = contract
            .query("aggregator", (), None, Options::default(), None)
            .await?;
        Ok(address)
    }

    async fn decimals(&self, aggregator: Address) -> Result<u8, ChainError> {
        let contract = aggregator_contract(self.web3.eth(), aggregator)?;
        let decimals: U256 = contract
            .query("decimals", (), None, Options::default(), None)
            .await?;
        decimals_from_word(decimals)
    }

    async fn description(&self, aggregator: Address) -> Result<String, ChainError> {
        let contract = aggregator_contract(self.web3.eth(), aggregator)?;
        let description: String = contract
            .query("description", (), None, Options::default(), None)
            .await?;
        Ok(description)
    }

    async fn subscribe_answers(
        &self,
        aggregator: Address,
    ) -> Result<ChainStream<AnswerUpdate>, ChainError> {
        let event = answer_updated_event()?;
        let filter = FilterBuilder::default()
            .address(vec![aggregator])
            .topics(Some(vec![answer_updated_topic(&event)]), None, None, None)
            .build();

        let sub = self.web3.eth_subscribe().subscribe_logs(filter).await?;
        let updates = sub.map(move |item: web3::Result<Log>| -> Result<AnswerUpdate, ChainError> {
            let log = item?;
            decode_answer_updated(
                &event,
                RawLog {
                    topics: log.topics,
                    data: log.data.0,
                },
            )
        });
        Ok(updates.boxed())
    }

    async fn subscribe_new_heads(&self) -> Result<ChainStream<H256>, ChainError> {
        let sub = self.web3.eth_subscribe().subscribe_new_heads().await?;
        let hashes = sub.map(|item: web3::Result<BlockHeader>| -> Result<H256, ChainError> {
            item?.hash.ok_or(ChainError::MissingField("hash"))
        });
        Ok(hashes.boxed())
    }

    async fn block_summary(&self, hash: H256) -> Result<BlockSummary, ChainError> {
        let block = self
            .web3
            .eth()
            .block(BlockId::Hash(hash))
            .await?
            .ok_or(ChainError::BlockNotFound(hash))?;
        let number = block.number.ok_or(ChainError::MissingField("number"))?;
        Ok(BlockSummary {
            number: number.as_u64(),
            transaction_count: block.transactions.len(),
        })
    }
}

/// Applies a query timeout to every call of the wrapped client.
pub struct Bounded<C> {
    inner: C,
    timeout: Duration,
}

impl<C> Bounded<C> {
    pub fn new(inner: C, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<C: ChainClient> ChainClient for Bounded<C> {
    async fn aggregator(&self, proxy: Address) -> Result<Address, ChainError> {
        bounded("aggregator", self.timeout, self.inner.aggregator(proxy)).await
    }

    async fn decimals(&self, aggregator: Address) -> Result<u8, ChainError> {
        bounded("decimals", self.timeout, self.inner.decimals(aggregator)).await
    }

    async fn description(&self, aggregator: Address) -> Result<String, ChainError> {
        bounded("description", self.timeout, self.inner.description(aggregator)).await
    }

    async fn subscribe_answers(
        &self,
        aggregator: Address,
    ) -> Result<ChainStream<AnswerUpdate>, ChainError> {
        bounded(
            "eth_subscribe(logs)",
            self.timeout,
            self.inner.subscribe_answers(aggregator),
        )
        .await
    }

    async fn subscribe_new_heads(&self) -> Result<ChainStream<H256>, ChainError> {
        bounded(
            "eth_subscribe(newHeads)",
            self.timeout,
            self.inner.subscribe_new_heads(),
        )
        .await
    }

    async fn block_summary(&self, hash: H256) -> Result<BlockSummary, ChainError> {
        bounded("eth_getBlockByHash", self.timeout, self.inner.block_summary(hash)).await
    }
}
