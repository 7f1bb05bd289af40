//! The message store contract.
//!
//! [`MessageStore`] is everything the runtime asks of the underlying log: append with
//! an optimistic concurrency check, bounded stream and category reads, and a lookup
//! of a stream's last message. [`MessageStoreExt`] layers lazy, unbounded reads on
//! top of the bounded ones for every store.
//!
//! ```rust,ignore
//! use futures::TryStreamExt;
//! use eventloom::{MessageStoreExt, StreamQuery};
//!
//! let messages: Vec<_> = store
//!     .stream_messages("account-1", StreamQuery::default())
//!     .try_collect()
//!     .await?;
//! ```

use crate::errors::MessageStoreResult;
use crate::message::{ExpectedVersion, Message, MessageData};
use crate::types::{BatchSize, ConsumerGroup, GlobalPosition, StreamPosition};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;

/// Parameters for one bounded stream read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamQuery {
    /// First stream position to return; 0 when absent.
    pub position: Option<StreamPosition>,
    /// Maximum number of messages to return; 1000 when absent.
    pub batch_size: Option<BatchSize>,
    /// Storage-level retrieval condition.
    pub condition: Option<String>,
}

impl StreamQuery {
    /// A query starting at `position`.
    pub fn from_position(position: StreamPosition) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: BatchSize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Sets a retrieval condition.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// The position the read starts at.
    pub fn start(&self) -> StreamPosition {
        self.position.unwrap_or_else(StreamPosition::initial)
    }

    /// The effective page size.
    pub fn limit(&self) -> usize {
        self.batch_size.unwrap_or_default().into_inner()
    }
}

/// Parameters for one bounded category read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryQuery {
    /// First global position to return; 1 when absent.
    pub position: Option<GlobalPosition>,
    /// Maximum number of messages to return; 1000 when absent.
    pub batch_size: Option<BatchSize>,
    /// Only return messages whose correlation stream belongs to this category.
    pub correlation: Option<String>,
    /// Only return this member's partition of the category.
    pub consumer_group: Option<ConsumerGroup>,
    /// Storage-level retrieval condition.
    pub condition: Option<String>,
}

impl CategoryQuery {
    /// A query starting at `position`.
    pub fn from_position(position: GlobalPosition) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: BatchSize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Filters by correlation category.
    #[must_use]
    pub fn with_correlation(mut self, correlation: impl Into<String>) -> Self {
        self.correlation = Some(correlation.into());
        self
    }

    /// Restricts the read to one consumer-group partition.
    #[must_use]
    pub const fn with_consumer_group(mut self, group: ConsumerGroup) -> Self {
        self.consumer_group = Some(group);
        self
    }

    /// Sets a retrieval condition.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// The position the read starts at.
    pub fn start(&self) -> GlobalPosition {
        self.position.unwrap_or_else(GlobalPosition::initial)
    }

    /// The effective page size.
    pub fn limit(&self) -> usize {
        self.batch_size.unwrap_or_default().into_inner()
    }
}

/// Client contract for an append-only, globally ordered message log.
///
/// Implementations own the optimistic concurrency check, category filtering and
/// consumer-group partitioning; the runtime only passes parameters through.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends `messages` to `stream_name` and returns the position of the last one.
    ///
    /// The batch is atomic and `expected_version` is checked once against the
    /// stream's version before the first message is written. Ids are generated for
    /// messages that carry none.
    async fn write(
        &self,
        stream_name: &str,
        messages: Vec<MessageData>,
        expected_version: ExpectedVersion,
    ) -> MessageStoreResult<StreamPosition>;

    /// Appends a single message.
    async fn write_message(
        &self,
        stream_name: &str,
        message: MessageData,
        expected_version: ExpectedVersion,
    ) -> MessageStoreResult<StreamPosition> {
        self.write(stream_name, vec![message], expected_version)
            .await
    }

    /// Reads one page of a stream in ascending position order.
    async fn get_stream_messages(
        &self,
        stream_name: &str,
        query: &StreamQuery,
    ) -> MessageStoreResult<Vec<Message>>;

    /// Reads one page of a category in ascending global position order.
    async fn get_category_messages(
        &self,
        category: &str,
        query: &CategoryQuery,
    ) -> MessageStoreResult<Vec<Message>>;

    /// Returns the stream's last message, optionally the last of a given type.
    async fn get_last_stream_message(
        &self,
        stream_name: &str,
        message_type: Option<&str>,
    ) -> MessageStoreResult<Option<Message>>;

    /// The position of the stream's last message; `None` for an empty stream.
    async fn stream_version(&self, stream_name: &str) -> MessageStoreResult<Option<StreamPosition>> {
        Ok(self
            .get_last_stream_message(stream_name, None)
            .await?
            .map(|message| message.position))
    }
}

#[async_trait]
impl<T> MessageStore for Arc<T>
where
    T: MessageStore + ?Sized,
{
    async fn write(
        &self,
        stream_name: &str,
        messages: Vec<MessageData>,
        expected_version: ExpectedVersion,
    ) -> MessageStoreResult<StreamPosition> {
        (**self)
            .write(stream_name, messages, expected_version)
            .await
    }

    async fn get_stream_messages(
        &self,
        stream_name: &str,
        query: &StreamQuery,
    ) -> MessageStoreResult<Vec<Message>> {
        (**self).get_stream_messages(stream_name, query).await
    }

    async fn get_category_messages(
        &self,
        category: &str,
        query: &CategoryQuery,
    ) -> MessageStoreResult<Vec<Message>> {
        (**self).get_category_messages(category, query).await
    }

    async fn get_last_stream_message(
        &self,
        stream_name: &str,
        message_type: Option<&str>,
    ) -> MessageStoreResult<Option<Message>> {
        (**self)
            .get_last_stream_message(stream_name, message_type)
            .await
    }
}

/// Lazy, unbounded reads for every [`MessageStore`].
///
/// Each stream fetches pages on demand, moves its cursor to one past the last
/// message's own position and ends after the first page shorter than the batch
/// size. Messages written after that short page are picked up by the next call.
pub trait MessageStoreExt: MessageStore {
    /// Every message of `stream_name` from `query`'s position onward.
    fn stream_messages<'a>(
        &'a self,
        stream_name: &'a str,
        query: StreamQuery,
    ) -> BoxStream<'a, MessageStoreResult<Message>> {
        let limit = query.limit();
        paginate(
            query,
            limit,
            move |query: StreamQuery| {
                async move { self.get_stream_messages(stream_name, &query).await }.boxed()
            },
            |query, last| query.position = Some(last.position.next()),
        )
    }

    /// Every message of `category` from `query`'s global position onward.
    fn category_messages<'a>(
        &'a self,
        category: &'a str,
        query: CategoryQuery,
    ) -> BoxStream<'a, MessageStoreResult<Message>> {
        let limit = query.limit();
        paginate(
            query,
            limit,
            move |query: CategoryQuery| {
                async move { self.get_category_messages(category, &query).await }.boxed()
            },
            |query, last| query.position = Some(last.global_position.next()),
        )
    }
}

impl<T: MessageStore + ?Sized> MessageStoreExt for T {}

struct Pager<Q, F> {
    query: Q,
    limit: usize,
    fetch: F,
    advance: fn(&mut Q, &Message),
    buffer: VecDeque<Message>,
    exhausted: bool,
}

fn paginate<'a, Q, F>(
    query: Q,
    limit: usize,
    fetch: F,
    advance: fn(&mut Q, &Message),
) -> BoxStream<'a, MessageStoreResult<Message>>
where
    Q: Clone + Send + 'a,
    F: Fn(Q) -> BoxFuture<'a, MessageStoreResult<Vec<Message>>> + Send + 'a,
{
    let pager = Pager {
        query,
        limit,
        fetch,
        advance,
        buffer: VecDeque::new(),
        exhausted: false,
    };

    stream::try_unfold(pager, |mut pager| async move {
        loop {
            if let Some(message) = pager.buffer.pop_front() {
                return Ok(Some((message, pager)));
            }
            if pager.exhausted {
                return Ok(None);
            }

            let page = match (pager.fetch)(pager.query.clone()).await {
                Ok(page) => page,
                Err(err) => return Err(err),
            };
            pager.exhausted = page.len() < pager.limit;
            if let Some(last) = page.last() {
                (pager.advance)(&mut pager.query, last);
            }
            pager.buffer.extend(page);
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MessageStoreError;
    use chrono::Utc;
    use futures::TryStreamExt;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Serves a fixed stream and records every page request.
    struct PagedLog {
        messages: Vec<Message>,
        requests: Mutex<Vec<u64>>,
        fail_after: Option<usize>,
    }

    impl PagedLog {
        fn with_messages(count: u64) -> Self {
            let messages = (0..count)
                .map(|i| Message {
                    id: Uuid::now_v7(),
                    stream_name: "thing-1".to_string(),
                    message_type: "Happened".to_string(),
                    position: StreamPosition::new(i),
                    global_position: GlobalPosition::new(i * 2 + 1),
                    data: serde_json::json!({ "n": i }),
                    metadata: serde_json::Value::Null,
                    time: Utc::now(),
                })
                .collect();
            Self {
                messages,
                requests: Mutex::new(Vec::new()),
                fail_after: None,
            }
        }

        fn requests(&self) -> Vec<u64> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageStore for PagedLog {
        async fn write(
            &self,
            stream_name: &str,
            _messages: Vec<MessageData>,
            _expected_version: ExpectedVersion,
        ) -> MessageStoreResult<StreamPosition> {
            Err(MessageStoreError::Internal(format!(
                "read-only log cannot write to {stream_name}"
            )))
        }

        async fn get_stream_messages(
            &self,
            _stream_name: &str,
            query: &StreamQuery,
        ) -> MessageStoreResult<Vec<Message>> {
            let mut requests = self.requests.lock().unwrap();
            if self.fail_after.is_some_and(|n| requests.len() >= n) {
                return Err(MessageStoreError::Unavailable("gone".to_string()));
            }
            requests.push(query.start().into_inner());
            Ok(self
                .messages
                .iter()
                .filter(|m| m.position >= query.start())
                .take(query.limit())
                .cloned()
                .collect())
        }

        async fn get_category_messages(
            &self,
            _category: &str,
            query: &CategoryQuery,
        ) -> MessageStoreResult<Vec<Message>> {
            self.requests
                .lock()
                .unwrap()
                .push(query.start().into_inner());
            Ok(self
                .messages
                .iter()
                .filter(|m| m.global_position >= query.start())
                .take(query.limit())
                .cloned()
                .collect())
        }

        async fn get_last_stream_message(
            &self,
            _stream_name: &str,
            _message_type: Option<&str>,
        ) -> MessageStoreResult<Option<Message>> {
            Ok(self.messages.last().cloned())
        }
    }

    fn batch(n: usize) -> BatchSize {
        BatchSize::try_new(n).unwrap()
    }

    #[tokio::test]
    async fn stream_pages_advance_past_last_position() {
        let log = PagedLog::with_messages(7);
        let query = StreamQuery::default().with_batch_size(batch(3));

        let messages: Vec<Message> = log
            .stream_messages("thing-1", query)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(messages.len(), 7);
        assert_eq!(log.requests(), vec![0, 3, 6]);
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_empty_page() {
        let log = PagedLog::with_messages(6);
        let query = StreamQuery::default().with_batch_size(batch(3));

        let count = log
            .stream_messages("thing-1", query)
            .try_fold(0usize, |n, _| async move { Ok(n + 1) })
            .await
            .unwrap();

        assert_eq!(count, 6);
        assert_eq!(log.requests(), vec![0, 3, 6]);
    }

    #[tokio::test]
    async fn category_cursor_uses_global_position() {
        let log = PagedLog::with_messages(5);
        let query = CategoryQuery::from_position(GlobalPosition::new(3)).with_batch_size(batch(2));

        let positions: Vec<u64> = log
            .category_messages("thing", query)
            .map_ok(|m| m.global_position.into_inner())
            .try_collect()
            .await
            .unwrap();

        assert_eq!(positions, vec![3, 5, 7, 9]);
        assert_eq!(log.requests(), vec![3, 6, 10]);
    }

    #[tokio::test]
    async fn page_error_ends_the_stream_with_that_error() {
        let mut log = PagedLog::with_messages(10);
        log.fail_after = Some(1);
        let query = StreamQuery::default().with_batch_size(batch(4));

        let result: MessageStoreResult<Vec<Message>> =
            log.stream_messages("thing-1", query).try_collect().await;

        assert_eq!(
            result.unwrap_err(),
            MessageStoreError::Unavailable("gone".to_string())
        );
    }

    #[tokio::test]
    async fn pages_are_fetched_lazily() {
        let log = PagedLog::with_messages(10);
        let query = StreamQuery::default().with_batch_size(batch(4));

        let first_two: Vec<Message> = log
            .stream_messages("thing-1", query)
            .take(2)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(first_two.len(), 2);
        assert_eq!(log.requests(), vec![0]);
    }

    #[tokio::test]
    async fn stream_version_is_last_position() {
        let log = PagedLog::with_messages(4);
        assert_eq!(
            log.stream_version("thing-1").await.unwrap(),
            Some(StreamPosition::new(3))
        );
        assert_eq!(
            PagedLog::with_messages(0)
                .stream_version("thing-1")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn shared_store_delegates() {
        let log: Arc<dyn MessageStore> = Arc::new(PagedLog::with_messages(2));
        let messages: Vec<Message> = log
            .stream_messages("thing-1", StreamQuery::default())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn query_defaults() {
        assert_eq!(StreamQuery::default().start(), StreamPosition::new(0));
        assert_eq!(StreamQuery::default().limit(), 1000);
        assert_eq!(CategoryQuery::default().start(), GlobalPosition::new(1));
    }
}
