//! In-memory `ChainClient` and log capture used by the listener tests.

use crate::chain::{AnswerUpdate, BlockSummary, ChainClient, ChainError, ChainStream};
use async_trait::async_trait;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use web3::types::{Address, H256, U256};

type Pending<T> = Mutex<HashMap<Address, UnboundedReceiver<Result<T, ChainError>>>>;

#[derive(Default)]
pub struct MockChain {
    aggregators: HashMap<Address, Address>,
    decimals: HashMap<Address, u8>,
    descriptions: HashMap<Address, String>,
    failing_proxies: HashSet<Address>,
    blocks: HashMap<H256, BlockSummary>,
    block_delay: Option<Duration>,
    answers: Pending<AnswerUpdate>,
    heads: Mutex<Option<UnboundedReceiver<Result<H256, ChainError>>>>,
    pub decimals_calls: AtomicUsize,
    pub answer_subscriptions: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, proxy: Address, aggregator: Address, decimals: u8) -> Self {
        self.aggregators.insert(proxy, aggregator);
        self.decimals.insert(aggregator, decimals);
        self
    }

    pub fn with_description(mut self, aggregator: Address, description: &str) -> Self {
        self.descriptions.insert(aggregator, description.to_string());
        self
    }

    pub fn with_failing_proxy(mut self, proxy: Address) -> Self {
        self.failing_proxies.insert(proxy);
        self
    }

    pub fn with_block(mut self, hash: H256, number: u64, transaction_count: usize) -> Self {
        self.blocks.insert(
            hash,
            BlockSummary {
                number,
                transaction_count,
            },
        );
        self
    }

    pub fn with_block_delay(mut self, delay: Duration) -> Self {
        self.block_delay = Some(delay);
        self
    }

    /// Sender feeding the `AnswerUpdated` subscription of `aggregator`.
    /// Without one, the subscription stays idle forever.
    pub fn answers(&self, aggregator: Address) -> UnboundedSender<Result<AnswerUpdate, ChainError>> {
        let (tx, rx) = mpsc::unbounded();
        self.answers.lock().unwrap().insert(aggregator, rx);
        tx
    }

    /// Sender feeding the new heads subscription.
    pub fn heads(&self) -> UnboundedSender<Result<H256, ChainError>> {
        let (tx, rx) = mpsc::unbounded();
        *self.heads.lock().unwrap() = Some(rx);
        tx
    }
}

pub fn rpc_failure() -> ChainError {
    ChainError::Rpc(web3::Error::Unreachable)
}

pub fn answer(current: u64) -> AnswerUpdate {
    AnswerUpdate {
        current: U256::from(current),
        round_id: U256::from(1u64),
        updated_at: U256::from(1_700_000_000u64),
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn aggregator(&self, proxy: Address) -> Result<Address, ChainError> {
        if self.failing_proxies.contains(&proxy) {
            return Err(rpc_failure());
        }
        self.aggregators.get(&proxy).copied().ok_or_else(rpc_failure)
    }

    async fn decimals(&self, aggregator: Address) -> Result<u8, ChainError> {
        self.decimals_calls.fetch_add(1, Ordering::SeqCst);
        self.decimals.get(&aggregator).copied().ok_or_else(rpc_failure)
    }

    async fn description(&self, aggregator: Address) -> Result<String, ChainError> {
        self.descriptions.get(&aggregator).cloned().ok_or_else(rpc_failure)
    }

    async fn subscribe_answers(
        &self,
        aggregator: Address,
    ) -> Result<ChainStream<AnswerUpdate>, ChainError> {
        self.answer_subscriptions.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().unwrap().remove(&aggregator) {
            Some(rx) => Ok(rx.boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }

    async fn subscribe_new_heads(&self) -> Result<ChainStream<H256>, ChainError> {
        match self.heads.lock().unwrap().take() {
            Some(rx) => Ok(rx.boxed()),
            None => Ok(stream::pending().boxed()),
        }
    }

    async fn block_summary(&self, hash: H256) -> Result<BlockSummary, ChainError> {
        if let Some(delay) = self.block_delay {
            tokio::time::sleep(delay).await;
        }
        self.blocks
            .get(&hash)
            .copied()
            .ok_or(ChainError::BlockNotFound(hash))
    }
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Records every tracing event emitted while installed on the current thread.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<CapturedEvent>>>);

impl CapturedLogs {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.message == message)
            .collect()
    }

    pub fn errors(&self) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == Level::ERROR)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.0.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: HashMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record(field, format!("{value:?}"));
    }
}

impl FieldVisitor {
    fn record(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

/// Yields to the scheduler until `condition` holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
