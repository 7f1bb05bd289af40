//! In-memory message store for `Eventloom`
//!
//! This crate provides a process-local implementation of the `MessageStore`
//! trait from the eventloom crate, useful for tests, demos and development
//! where durability is not required. It follows the read and write rules of a
//! Message DB style log: optimistic concurrency per stream, 0-based stream
//! positions, 1-based global positions, category reads with correlation and
//! consumer-group filters.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use eventloom::errors::{MessageStoreError, MessageStoreResult};
use eventloom::message::{ExpectedVersion, Message, MessageData};
use eventloom::message_store::{CategoryQuery, MessageStore, StreamQuery};
use eventloom::stream_name;
use eventloom::types::{ConsumerGroup, GlobalPosition, StreamPosition};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Default)]
struct Log {
    // Every message in global order; index + 1 is the global position
    messages: Vec<Message>,
    // Stream name to indexes into `messages`, in stream order
    streams: HashMap<String, Vec<usize>>,
}

impl Log {
    fn version(&self, stream_name: &str) -> Option<StreamPosition> {
        self.streams
            .get(stream_name)
            .and_then(|indexes| indexes.last())
            .map(|&index| self.messages[index].position)
    }

    fn stream(&self, stream_name: &str) -> impl Iterator<Item = &Message> {
        self.streams
            .get(stream_name)
            .into_iter()
            .flatten()
            .map(move |&index| &self.messages[index])
    }
}

/// Thread-safe in-memory message store.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryMessageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages in the whole log.
    pub fn len(&self) -> usize {
        self.log.read().messages.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.log.read().messages.is_empty()
    }

    /// Names of every stream written to, sorted.
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.log.read().streams.keys().cloned().collect();
        names.sort();
        names
    }
}

/// The consumer-group member that owns `stream_name` in a group of `size`.
///
/// Streams are assigned by the FNV-1a hash of their cardinal id, so every
/// stream of one entity lands with the same member regardless of category type
/// qualifiers or compound ids. Category names have no cardinal id and map to
/// member 0. Returns `None` when `size` is zero.
pub fn consumer_group_member(stream_name: &str, size: u64) -> Option<u64> {
    if size == 0 {
        return None;
    }
    let key = stream_name::cardinal_id(stream_name).unwrap_or_default();
    Some(fnv1a_64(key.as_bytes()) % size)
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

fn validate_consumer_group(group: ConsumerGroup) -> MessageStoreResult<()> {
    if group.size == 0 {
        return Err(MessageStoreError::ConsumerGroup(
            "Consumer group size must not be less than 1".to_string(),
        ));
    }
    if group.member >= group.size {
        return Err(MessageStoreError::ConsumerGroup(format!(
            "Consumer group member {} must be less than the group size {}",
            group.member, group.size
        )));
    }
    Ok(())
}

fn reject_condition(condition: Option<&String>) -> MessageStoreResult<()> {
    match condition {
        Some(_) => Err(MessageStoreError::ConditionNotActivated),
        None => Ok(()),
    }
}

fn correlated(message: &Message, correlation: &str) -> bool {
    message
        .correlation_stream_name()
        .is_some_and(|name| stream_name::category(name) == correlation)
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn write(
        &self,
        stream_name: &str,
        messages: Vec<MessageData>,
        expected_version: ExpectedVersion,
    ) -> MessageStoreResult<StreamPosition> {
        if messages.is_empty() {
            return Err(MessageStoreError::EmptyBatch(stream_name.to_string()));
        }

        let mut log = self.log.write();

        let current = log.version(stream_name);
        if !expected_version.is_satisfied_by(current) {
            return Err(MessageStoreError::WrongExpectedVersion {
                stream_name: stream_name.to_string(),
                expected: expected_version,
                current,
            });
        }

        let count = messages.len();
        let time = Utc::now();
        let mut position = current.map_or_else(StreamPosition::initial, StreamPosition::next);
        let mut last = position;
        let mut indexes = Vec::with_capacity(count);

        for data in messages {
            let index = log.messages.len();
            log.messages.push(Message {
                id: data.id.unwrap_or_else(Uuid::now_v7),
                stream_name: stream_name.to_string(),
                message_type: data.message_type,
                position,
                global_position: GlobalPosition::new(index as u64 + 1),
                data: data.data,
                metadata: data.metadata,
                time,
            });
            indexes.push(index);
            last = position;
            position = position.next();
        }
        log.streams
            .entry(stream_name.to_string())
            .or_default()
            .extend(indexes);

        debug!(stream_name, count, position = %last, "wrote messages");
        Ok(last)
    }

    async fn get_stream_messages(
        &self,
        stream_name: &str,
        query: &StreamQuery,
    ) -> MessageStoreResult<Vec<Message>> {
        if stream_name::is_category(stream_name) {
            return Err(MessageStoreError::InvalidStreamName(stream_name.to_string()));
        }
        reject_condition(query.condition.as_ref())?;

        let start = query.start();
        let log = self.log.read();
        Ok(log
            .stream(stream_name)
            .skip_while(|message| message.position < start)
            .take(query.limit())
            .cloned()
            .collect())
    }

    async fn get_category_messages(
        &self,
        category: &str,
        query: &CategoryQuery,
    ) -> MessageStoreResult<Vec<Message>> {
        if !stream_name::is_category(category) {
            return Err(MessageStoreError::InvalidCategory(category.to_string()));
        }
        reject_condition(query.condition.as_ref())?;
        if let Some(group) = query.consumer_group {
            validate_consumer_group(group)?;
        }

        let log = self.log.read();
        let start = query.start().into_inner().saturating_sub(1);
        let skip = usize::try_from(start).unwrap_or(usize::MAX);

        Ok(log
            .messages
            .iter()
            .skip(skip)
            .filter(|message| message.category() == category)
            .filter(|message| {
                query
                    .correlation
                    .as_deref()
                    .map_or(true, |correlation| correlated(message, correlation))
            })
            .filter(|message| {
                query.consumer_group.map_or(true, |group| {
                    consumer_group_member(&message.stream_name, group.size) == Some(group.member)
                })
            })
            .take(query.limit())
            .cloned()
            .collect())
    }

    async fn get_last_stream_message(
        &self,
        stream_name: &str,
        message_type: Option<&str>,
    ) -> MessageStoreResult<Option<Message>> {
        let log = self.log.read();
        Ok(log
            .stream(stream_name)
            .filter(|message| message_type.map_or(true, |t| message.matches_type(t)))
            .last()
            .cloned())
    }
}
