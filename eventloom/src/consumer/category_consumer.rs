use super::position_store::PositionStore;
use crate::config::ConsumerConfig;
use crate::errors::{ConsumerError, ConsumerResult, HandlerError};
use crate::message::Message;
use crate::message_store::{CategoryQuery, MessageStore, MessageStoreExt};
use crate::service_host::{Service, ServiceError};
use crate::types::{Category, ConsumerName, GlobalPosition};
use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{debug, info, instrument};

/// What a handler returns for one message.
pub type HandlerResult = Result<(), HandlerError>;

/// Reacts to the messages of a category.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handles one message. An error stops the current poll before the
    /// consumer's position moves past this message.
    async fn handle(&self, message: &Message) -> HandlerResult;
}

#[async_trait]
impl<F> MessageHandler for F
where
    F: Fn(&Message) -> HandlerResult + Send + Sync,
{
    async fn handle(&self, message: &Message) -> HandlerResult {
        self(message)
    }
}

/// Reads a category in global order and hands each message to a handler.
///
/// The consumer's position is recorded after every handled message, so a
/// restarted consumer resumes right after the last message it finished.
pub struct Consumer<S, P, H> {
    name: ConsumerName,
    category: Category,
    store: S,
    positions: P,
    handler: H,
    config: ConsumerConfig,
}

impl<S, P, H> Consumer<S, P, H>
where
    S: MessageStore,
    P: PositionStore,
    H: MessageHandler,
{
    /// Creates a consumer with the default [`ConsumerConfig`].
    pub fn new(name: ConsumerName, category: Category, store: S, positions: P, handler: H) -> Self {
        Self {
            name,
            category,
            store,
            positions,
            handler,
            config: ConsumerConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ConsumerConfig) -> Self {
        self.config = config;
        self
    }

    /// The consumer's name, which keys its position.
    pub const fn name(&self) -> &ConsumerName {
        &self.name
    }

    /// The category being consumed.
    pub const fn category(&self) -> &Category {
        &self.category
    }

    /// The active configuration.
    pub const fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// The global position the next poll starts from.
    pub async fn next_position(&self) -> ConsumerResult<GlobalPosition> {
        Ok(self
            .positions
            .get(&self.name)
            .await?
            .map_or_else(GlobalPosition::initial, GlobalPosition::next))
    }

    /// Handles every message available past the recorded position.
    ///
    /// Returns the number of messages handled. Store, position and handler
    /// errors are returned as-is; messages handled before the error keep their
    /// recorded position.
    #[instrument(skip(self), fields(consumer = %self.name, category = %self.category))]
    pub async fn run_once(&self) -> ConsumerResult<usize> {
        let position = self.next_position().await?;
        let query = self.query(position);
        let mut messages = self.store.category_messages(&self.category, query);
        let mut processed = 0;

        while let Some(message) = messages.try_next().await? {
            self.handler
                .handle(&message)
                .await
                .map_err(|source| ConsumerError::Handler {
                    consumer: self.name.to_string(),
                    global_position: message.global_position,
                    source,
                })?;
            self.positions
                .set(&self.name, message.global_position)
                .await?;
            processed += 1;
        }

        if processed > 0 {
            debug!(processed, from = %position, "handled messages");
        }
        Ok(processed)
    }

    /// Polls repeatedly, sleeping for the poll interval after empty polls.
    ///
    /// Runs forever when `max_iterations` is `None`. The first error ends the
    /// loop; use a [`ServiceHost`](crate::service_host::ServiceHost) to retry.
    pub async fn run(&self, max_iterations: Option<u64>) -> ConsumerResult<()> {
        info!(consumer = %self.name, category = %self.category, "consumer started");
        let mut iterations = 0;
        loop {
            let processed = self.run_once().await?;
            iterations += 1;
            if max_iterations.is_some_and(|max| iterations >= max) {
                return Ok(());
            }
            if processed == 0 {
                tokio::time::sleep(self.config.poll_interval.as_duration()).await;
            }
        }
    }

    fn query(&self, position: GlobalPosition) -> CategoryQuery {
        CategoryQuery {
            position: Some(position),
            batch_size: Some(self.config.batch_size),
            correlation: self.config.correlation.clone(),
            consumer_group: self.config.consumer_group,
            condition: self.config.condition.clone(),
        }
    }
}

impl<S, P, H> std::fmt::Debug for Consumer<S, P, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S, P, H> Service for Consumer<S, P, H>
where
    S: MessageStore,
    P: PositionStore,
    H: MessageHandler,
{
    fn name(&self) -> &str {
        self.name.as_ref()
    }

    async fn run_once(&mut self) -> Result<(), ServiceError> {
        Consumer::run_once(self).await?;
        Ok(())
    }
}
