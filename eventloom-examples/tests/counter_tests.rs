//! The counter example end to end on the in-memory message store.

use async_trait::async_trait;
use eventloom::{
    Category, CategoryQuery, Consumer, ConsumerConfig, ConsumerName, ExpectedVersion,
    InMemoryPositionStore, Message, MessageData, MessageStore, MessageStoreResult, StreamPosition,
    StreamQuery,
};
use eventloom_examples::counter::{
    Counter, CounterCommands, CounterError, CounterId, Incremented, Step, Totals, CATEGORY,
    MAX_ATTEMPTS,
};
use eventloom_memory::InMemoryMessageStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn id(value: &str) -> CounterId {
    CounterId::try_new(value).unwrap()
}

fn step(value: i64) -> Step {
    Step::try_new(value).unwrap()
}

/// Appends a competing increment before each of the first `interferences` writes.
#[derive(Clone)]
struct Interfering {
    inner: InMemoryMessageStore,
    interferences: Arc<AtomicUsize>,
}

impl Interfering {
    fn new(interferences: usize) -> Self {
        Self {
            inner: InMemoryMessageStore::new(),
            interferences: Arc::new(AtomicUsize::new(interferences)),
        }
    }
}

#[async_trait]
impl MessageStore for Interfering {
    async fn write(
        &self,
        stream_name: &str,
        messages: Vec<MessageData>,
        expected_version: ExpectedVersion,
    ) -> MessageStoreResult<StreamPosition> {
        let interfere = self
            .interferences
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if interfere {
            let competing = MessageData::from_payload(&Incremented { amount: 1 }).unwrap();
            self.inner
                .write(stream_name, vec![competing], ExpectedVersion::Any)
                .await?;
        }
        self.inner.write(stream_name, messages, expected_version).await
    }

    async fn get_stream_messages(
        &self,
        stream_name: &str,
        query: &StreamQuery,
    ) -> MessageStoreResult<Vec<Message>> {
        self.inner.get_stream_messages(stream_name, query).await
    }

    async fn get_category_messages(
        &self,
        category: &str,
        query: &CategoryQuery,
    ) -> MessageStoreResult<Vec<Message>> {
        self.inner.get_category_messages(category, query).await
    }

    async fn get_last_stream_message(
        &self,
        stream_name: &str,
        message_type: Option<&str>,
    ) -> MessageStoreResult<Option<Message>> {
        self.inner
            .get_last_stream_message(stream_name, message_type)
            .await
    }
}

#[tokio::test]
async fn increments_accumulate_in_the_counter_stream() {
    let store = InMemoryMessageStore::new();
    let commands = CounterCommands::new(store.clone()).unwrap();

    assert_eq!(
        assert_ok!(commands.increment(&id("hits"), step(2)).await),
        StreamPosition::new(0)
    );
    assert_eq!(
        assert_ok!(commands.increment(&id("hits"), step(3)).await),
        StreamPosition::new(1)
    );

    let counter = commands.entities().fetch("hits").await.unwrap();
    assert_eq!(
        counter,
        Counter {
            value: 5,
            increments: 2,
            resets: 0
        }
    );
    assert_eq!(store.stream_names(), vec!["counter-hits".to_string()]);
}

#[tokio::test]
async fn increments_past_the_limit_are_refused() {
    let store = InMemoryMessageStore::new();
    store
        .write(
            "counter-big",
            vec![MessageData::from_payload(&Incremented { amount: 999_500 }).unwrap()],
            ExpectedVersion::NoStream,
        )
        .await
        .unwrap();
    let commands = CounterCommands::new(store.clone()).unwrap();

    let err = assert_err!(commands.increment(&id("big"), step(1000)).await);
    insta::assert_snapshot!(err, @"Counter 'big' would exceed 1000000 (current value 999500)");
    assert_eq!(
        store.stream_version("counter-big").await.unwrap(),
        Some(StreamPosition::new(0))
    );

    assert_ok!(commands.increment(&id("big"), step(500)).await);
    assert_eq!(commands.entities().fetch("big").await.unwrap().value, 1_000_000);
}

#[tokio::test]
async fn resetting_a_zero_counter_writes_nothing() {
    let store = InMemoryMessageStore::new();
    let commands = CounterCommands::new(store.clone()).unwrap();

    assert_eq!(assert_ok!(commands.reset(&id("idle")).await), None);
    assert!(store.is_empty());

    commands.increment(&id("idle"), step(7)).await.unwrap();
    assert_eq!(
        assert_ok!(commands.reset(&id("idle")).await),
        Some(StreamPosition::new(1))
    );
    let counter = commands.entities().fetch("idle").await.unwrap();
    assert_eq!(counter.value, 0);
    assert_eq!(counter.resets, 1);
}

#[tokio::test]
async fn a_concurrent_write_is_retried_against_the_new_state() {
    let store = Interfering::new(1);
    let commands = CounterCommands::new(store.clone()).unwrap();

    assert_eq!(
        assert_ok!(commands.increment(&id("race"), step(10)).await),
        StreamPosition::new(1)
    );
    let counter = commands.entities().fetch("race").await.unwrap();
    assert_eq!(counter.value, 11);
    assert_eq!(counter.increments, 2);
}

#[tokio::test]
async fn persistent_contention_gives_up() {
    let store = Interfering::new(MAX_ATTEMPTS);
    let commands = CounterCommands::new(store.clone()).unwrap();

    let err = assert_err!(commands.increment(&id("busy"), step(1)).await);
    assert!(matches!(err, CounterError::Contended { attempts, .. } if attempts == MAX_ATTEMPTS));
    insta::assert_snapshot!(err, @"Counter 'busy' kept changing; gave up after 3 attempts");

    let counter = commands.entities().fetch("busy").await.unwrap();
    assert_eq!(counter.value, 3);
}

#[tokio::test]
async fn totals_follow_increments_and_resets() {
    let store = InMemoryMessageStore::new();
    let commands = CounterCommands::new(store.clone()).unwrap();
    for amount in [1, 2, 3] {
        commands.increment(&id("a"), step(amount)).await.unwrap();
    }
    commands.increment(&id("b"), step(10)).await.unwrap();
    commands.reset(&id("a")).await.unwrap();
    commands.increment(&id("a"), step(4)).await.unwrap();

    let totals = Totals::new();
    let consumer = Consumer::new(
        ConsumerName::try_new("totals").unwrap(),
        Category::try_new(CATEGORY).unwrap(),
        store.clone(),
        InMemoryPositionStore::new(),
        totals.clone(),
    )
    .with_config(ConsumerConfig::new(0).unwrap());

    assert_eq!(assert_ok!(consumer.run_once().await), 6);
    assert_eq!(totals.get("a"), Some(4));
    assert_eq!(totals.get("b"), Some(10));
    assert_eq!(totals.get("c"), None);
    assert_eq!(totals.grand_total(), 14);

    commands.increment(&id("c"), step(1)).await.unwrap();
    assert_eq!(assert_ok!(consumer.run_once().await), 1);
    assert_eq!(totals.grand_total(), 15);
}
