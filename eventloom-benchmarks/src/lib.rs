//! Eventloom Benchmarks
//!
//! Criterion benchmarks for the in-memory message store, entity hydration with
//! and without a warm cache, and category consumer throughput. This library
//! holds the fixtures they share.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]

use eventloom::{ExpectedVersion, MessageData, MessageStore, MessageStoreResult};
use eventloom_examples::counter::{Incremented, CATEGORY};
use eventloom_memory::InMemoryMessageStore;

/// `count` increments of one.
pub fn increments(count: u64) -> Vec<MessageData> {
    (0..count)
        .map(|_| {
            MessageData::from_payload(&Incremented { amount: 1 })
                .expect("Incremented should always serialize")
        })
        .collect()
}

/// A store holding `streams` counters with `per_stream` increments each.
pub async fn populated_store(streams: u64, per_stream: u64) -> MessageStoreResult<InMemoryMessageStore> {
    let store = InMemoryMessageStore::new();
    for id in 0..streams {
        store
            .write(
                &format!("{CATEGORY}-{id}"),
                increments(per_stream),
                ExpectedVersion::NoStream,
            )
            .await?;
    }
    Ok(store)
}
