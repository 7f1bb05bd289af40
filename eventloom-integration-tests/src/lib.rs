//! Integration test support for `Eventloom`
//!
//! Shared fixtures for the tests in `tests/`: a counter entity with its
//! projection, helpers to write its messages to an [`InMemoryMessageStore`] and
//! a tracing setup that honours `RUST_LOG`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use eventloom::{
    EntityStore, EntityStoreResult, ExpectedVersion, MessageData, MessageStore,
    MessageStoreResult, MessageType, Projection, StreamPosition,
};
use eventloom_memory::InMemoryMessageStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Once};

/// Category of the counter streams.
pub const COUNTER_CATEGORY: &str = "counter";

/// A counter entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Running total.
    pub value: i64,
    /// Number of increments applied.
    pub increments: u64,
}

/// Payload of an `Incremented` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incremented {
    /// Amount added to the counter.
    pub amount: i64,
}

impl MessageType for Incremented {
    const TYPE: &'static str = "Incremented";
}

/// The counter projection: `Incremented` adds its amount, `Reset` zeroes the value.
pub fn counter_projection() -> Arc<Projection<Counter>> {
    let projection = Projection::builder("counter")
        .apply_typed(|counter: &mut Counter, event: Incremented| {
            counter.value += event.amount;
            counter.increments += 1;
            Ok(())
        })
        .apply("Reset", |counter: &mut Counter, _| {
            counter.value = 0;
            Ok(())
        })
        .build()
        .expect("counter projection registers each type once");
    Arc::new(projection)
}

/// An entity store for counters over `store`.
pub fn counter_store<S: MessageStore>(store: S) -> EntityStoreResult<EntityStore<Counter, S>> {
    EntityStore::builder(store)
        .category(COUNTER_CATEGORY)
        .projection(counter_projection())
        .entity_factory(Counter::default)
        .build()
}

/// An `Incremented` message adding `amount`.
pub fn incremented(amount: i64) -> MessageData {
    MessageData::from_payload(&Incremented { amount })
        .expect("Incremented always serializes")
}

/// Appends one `Incremented` message per amount to `counter-{id}`.
pub async fn increment(
    store: &InMemoryMessageStore,
    id: &str,
    amounts: &[i64],
) -> MessageStoreResult<StreamPosition> {
    let batch = amounts.iter().copied().map(incremented).collect();
    store
        .write(&format!("{COUNTER_CATEGORY}-{id}"), batch, ExpectedVersion::Any)
        .await
}

/// Installs a test subscriber once per process; output follows `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
