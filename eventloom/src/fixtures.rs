//! Test doubles shared by the unit tests.

use crate::errors::{MessageStoreError, MessageStoreResult};
use crate::message::{ExpectedVersion, Message, MessageData};
use crate::message_store::{CategoryQuery, MessageStore, StreamQuery};
use crate::stream_name;
use crate::types::{GlobalPosition, StreamPosition};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A minimal log kept in a vector.
///
/// Supports expected-version writes and plain stream/category reads. Consumer
/// groups and correlation filters are left to the in-memory adapter crate.
#[derive(Debug, Clone, Default)]
pub struct VecLog {
    messages: Arc<Mutex<Vec<Message>>>,
    stream_reads: Arc<AtomicUsize>,
    failing_reads: Arc<AtomicUsize>,
}

impl VecLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends messages of the given types to `stream_name`.
    pub async fn append(&self, stream_name: &str, types: &[&str]) -> StreamPosition {
        let batch = types.iter().map(|t| MessageData::new(*t)).collect();
        self.write(stream_name, batch, ExpectedVersion::Any)
            .await
            .unwrap()
    }

    /// Number of bounded stream reads served so far.
    pub fn stream_reads(&self) -> usize {
        self.stream_reads.load(Ordering::SeqCst)
    }

    /// Makes the next `count` reads fail with `Unavailable`.
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    fn check_failure(&self) -> MessageStoreResult<()> {
        let remaining = self.failing_reads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_reads.store(remaining - 1, Ordering::SeqCst);
            return Err(MessageStoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for VecLog {
    async fn write(
        &self,
        stream_name: &str,
        messages: Vec<MessageData>,
        expected_version: ExpectedVersion,
    ) -> MessageStoreResult<StreamPosition> {
        let mut log = self.messages.lock().unwrap();
        let current = log
            .iter()
            .filter(|m| m.stream_name == stream_name)
            .map(|m| m.position)
            .last();
        if !expected_version.is_satisfied_by(current) {
            return Err(MessageStoreError::WrongExpectedVersion {
                stream_name: stream_name.to_string(),
                expected: expected_version,
                current,
            });
        }

        let mut position = current.map_or_else(StreamPosition::initial, StreamPosition::next);
        let mut last = None;
        for data in messages {
            let global_position = GlobalPosition::new(log.len() as u64 + 1);
            log.push(Message {
                id: data.id.unwrap_or_else(Uuid::now_v7),
                stream_name: stream_name.to_string(),
                message_type: data.message_type,
                position,
                global_position,
                data: data.data,
                metadata: data.metadata,
                time: Utc::now(),
            });
            last = Some(position);
            position = position.next();
        }
        last.ok_or_else(|| MessageStoreError::EmptyBatch(stream_name.to_string()))
    }

    async fn get_stream_messages(
        &self,
        stream_name: &str,
        query: &StreamQuery,
    ) -> MessageStoreResult<Vec<Message>> {
        self.check_failure()?;
        self.stream_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.stream_name == stream_name && m.position >= query.start())
            .take(query.limit())
            .cloned()
            .collect())
    }

    async fn get_category_messages(
        &self,
        category: &str,
        query: &CategoryQuery,
    ) -> MessageStoreResult<Vec<Message>> {
        self.check_failure()?;
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                stream_name::category(&m.stream_name) == category
                    && m.global_position >= query.start()
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
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.stream_name == stream_name)
            .filter(|m| message_type.map_or(true, |t| m.matches_type(t)))
            .last()
            .cloned())
    }
}
