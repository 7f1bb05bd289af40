//! Messages as they are written to and read back from the message store.
//!
//! A [`MessageData`] is what callers hand to [`crate::MessageStore::write`]; the store
//! assigns the positions and time and returns [`Message`]s on reads. Payloads stay as
//! `serde_json::Value` so that projections can deserialize only what they need.

use crate::errors::{MessageError, MessageResult};
use crate::types::{GlobalPosition, StreamPosition};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Metadata key naming the stream a message was written in response to.
///
/// Category reads filtered by correlation match on the category of this value.
pub const CORRELATION_STREAM_NAME: &str = "correlationStreamName";

/// Associates a payload type with its message type name.
///
/// ```rust
/// use eventloom::MessageType;
///
/// struct Deposited { amount: i64 }
///
/// impl MessageType for Deposited {
///     const TYPE: &'static str = "Deposited";
/// }
/// ```
pub trait MessageType {
    /// The name stored in the message's `type` column.
    const TYPE: &'static str;
}

/// A message about to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    /// Message id; the store generates one when absent.
    pub id: Option<Uuid>,
    /// Message type name.
    pub message_type: String,
    /// Message payload.
    pub data: Value,
    /// Message metadata. `Value::Null` when there is none.
    pub metadata: Value,
}

impl MessageData {
    /// Creates a message of the given type with an empty object payload and no metadata.
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            id: None,
            message_type: message_type.into(),
            data: Value::Object(serde_json::Map::new()),
            metadata: Value::Null,
        }
    }

    /// Creates a message from a typed payload.
    pub fn from_payload<T>(payload: &T) -> MessageResult<Self>
    where
        T: MessageType + Serialize,
    {
        let data = serde_json::to_value(payload).map_err(|source| MessageError::Encode {
            message_type: T::TYPE.to_string(),
            source,
        })?;
        Ok(Self::new(T::TYPE).with_data(data))
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets an explicit message id.
    #[must_use]
    pub const fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Records the stream this message responds to in its metadata.
    ///
    /// Non-object metadata is replaced by an object holding only the correlation.
    #[must_use]
    pub fn correlated_with(mut self, stream_name: impl Into<String>) -> Self {
        if !self.metadata.is_object() {
            self.metadata = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(map) = &mut self.metadata {
            map.insert(
                CORRELATION_STREAM_NAME.to_string(),
                Value::String(stream_name.into()),
            );
        }
        self
    }
}

/// A message read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id.
    pub id: Uuid,
    /// Stream the message belongs to.
    pub stream_name: String,
    /// Message type name.
    pub message_type: String,
    /// 0-based position within the stream.
    pub position: StreamPosition,
    /// 1-based position within the whole log.
    pub global_position: GlobalPosition,
    /// Message payload.
    pub data: Value,
    /// Message metadata.
    pub metadata: Value,
    /// When the store recorded the message.
    pub time: DateTime<Utc>,
}

impl Message {
    /// Whether this message carries the given type name.
    pub fn matches_type(&self, message_type: &str) -> bool {
        self.message_type == message_type
    }

    /// Whether this message carries `T`'s type name.
    pub fn is<T: MessageType>(&self) -> bool {
        self.matches_type(T::TYPE)
    }

    /// Deserializes the payload.
    pub fn data_as<T: DeserializeOwned>(&self) -> MessageResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|source| MessageError::Payload {
            message_type: self.message_type.clone(),
            position: self.position,
            source,
        })
    }

    /// Deserializes the metadata.
    pub fn metadata_as<T: DeserializeOwned>(&self) -> MessageResult<T> {
        serde_json::from_value(self.metadata.clone()).map_err(|source| MessageError::Payload {
            message_type: self.message_type.clone(),
            position: self.position,
            source,
        })
    }

    /// The correlation stream name recorded in the metadata, if any.
    pub fn correlation_stream_name(&self) -> Option<&str> {
        self.metadata
            .get(CORRELATION_STREAM_NAME)
            .and_then(Value::as_str)
    }

    /// The category of the stream this message belongs to.
    pub fn category(&self) -> &str {
        crate::stream_name::category(&self.stream_name)
    }
}

/// Optimistic concurrency expectation for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// Write regardless of the stream's current version.
    #[default]
    Any,
    /// The stream must not exist yet.
    NoStream,
    /// The stream's last message must be at exactly this position.
    Exact(StreamPosition),
}

impl ExpectedVersion {
    /// Whether a stream whose last position is `current` satisfies this expectation.
    pub fn is_satisfied_by(self, current: Option<StreamPosition>) -> bool {
        match self {
            Self::Any => true,
            Self::NoStream => current.is_none(),
            Self::Exact(expected) => current == Some(expected),
        }
    }
}

impl From<StreamPosition> for ExpectedVersion {
    fn from(position: StreamPosition) -> Self {
        Self::Exact(position)
    }
}

impl From<Option<StreamPosition>> for ExpectedVersion {
    fn from(version: Option<StreamPosition>) -> Self {
        version.map_or(Self::NoStream, Self::Exact)
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::NoStream => write!(f, "no stream"),
            Self::Exact(position) => write!(f, "{position}"),
        }
    }
}
