//! Writing to counters.
//!
//! Each command reads the counter, checks its rules against the current state
//! and appends with the version it read as the expected version. A concurrent
//! writer makes the append fail with a version conflict; the command then
//! reloads and tries again, up to [`MAX_ATTEMPTS`] times.

use super::events::{Incremented, Reset};
use super::projection::{counter_projection, Counter, CATEGORY};
use super::types::{CounterId, Step, MAX_COUNTER_VALUE};
use eventloom::{
    EntityStore, EntityStoreError, ExpectedVersion, MessageData, MessageError, MessageStore,
    MessageStoreError, MessageType, StreamPosition,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Attempts per command before a version conflict is reported.
pub const MAX_ATTEMPTS: usize = 3;

/// Why a counter command did not take effect.
#[derive(Debug, Error)]
pub enum CounterError {
    /// The increment would take the counter past [`MAX_COUNTER_VALUE`].
    #[error("Counter '{id}' would exceed {MAX_COUNTER_VALUE} (current value {value})")]
    LimitExceeded {
        /// The counter.
        id: CounterId,
        /// Its value when the command ran.
        value: i64,
    },

    /// Other writers kept winning the race.
    #[error("Counter '{id}' kept changing; gave up after {attempts} attempts")]
    Contended {
        /// The counter.
        id: CounterId,
        /// Attempts made.
        attempts: usize,
    },

    /// Reading the counter failed.
    #[error(transparent)]
    Load(#[from] EntityStoreError),

    /// Writing the counter failed.
    #[error(transparent)]
    Store(#[from] MessageStoreError),

    /// A message could not be encoded.
    #[error(transparent)]
    Encode(#[from] MessageError),
}

/// Counter commands over one message store.
pub struct CounterCommands<S> {
    entities: EntityStore<Counter, S>,
    store: S,
}

impl<S> CounterCommands<S>
where
    S: MessageStore + Clone,
{
    /// Creates the command side, sharing `store` with a private entity store.
    pub fn new(store: S) -> Result<Self, EntityStoreError> {
        let entities = EntityStore::builder(store.clone())
            .category(CATEGORY)
            .projection(counter_projection())
            .entity_factory(Counter::default)
            .build()?;
        Ok(Self { entities, store })
    }

    /// The entity store used to read counters.
    pub const fn entities(&self) -> &EntityStore<Counter, S> {
        &self.entities
    }

    /// Adds `step` to the counter. Returns the position of the new message.
    #[instrument(skip(self, id, step), fields(id = %id, step = %step))]
    pub async fn increment(&self, id: &CounterId, step: Step) -> Result<StreamPosition, CounterError> {
        self.with_retry(id, |counter| {
            let amount = step.into_inner();
            if counter.value + amount > MAX_COUNTER_VALUE {
                return Err(CounterError::LimitExceeded {
                    id: id.clone(),
                    value: counter.value,
                });
            }
            Ok(Some(encode(&Incremented { amount })?))
        })
        .await
        .map(|position| position.unwrap_or_else(StreamPosition::initial))
    }

    /// Sets the counter back to zero. Resetting a zero counter writes nothing
    /// and returns `None`.
    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn reset(&self, id: &CounterId) -> Result<Option<StreamPosition>, CounterError> {
        self.with_retry(id, |counter| {
            if counter.value == 0 {
                return Ok(None);
            }
            Ok(Some(encode(&Reset {
                previous: counter.value,
            })?))
        })
        .await
    }

    async fn with_retry<F>(
        &self,
        id: &CounterId,
        decide: F,
    ) -> Result<Option<StreamPosition>, CounterError>
    where
        F: Fn(&Counter) -> Result<Option<MessageData>, CounterError> + Send + Sync,
    {
        let stream_name = self.entities.stream_name(id.as_ref());

        for attempt in 1..=MAX_ATTEMPTS {
            let (counter, version) = self.entities.fetch_versioned(id.as_ref()).await?;
            let Some(message) = decide(&counter)? else {
                return Ok(None);
            };

            match self
                .store
                .write_message(&stream_name, message, ExpectedVersion::from(version))
                .await
            {
                Ok(position) => {
                    debug!(%position, attempt, "counter updated");
                    return Ok(Some(position));
                }
                Err(MessageStoreError::WrongExpectedVersion { current, .. }) => {
                    warn!(
                        attempt,
                        current = ?current.map(StreamPosition::into_inner),
                        "counter changed concurrently, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CounterError::Contended {
            id: id.clone(),
            attempts: MAX_ATTEMPTS,
        })
    }
}

fn encode<T: MessageType + Serialize>(payload: &T) -> Result<MessageData, CounterError> {
    Ok(MessageData::from_payload(payload)?)
}
