//! Error types for `Eventloom`.
//!
//! Each subsystem has its own error enum and `Result` alias. Lower-level errors
//! convert into higher-level ones with `?`, so an entity store caller sees a single
//! [`EntityStoreError`] whether the failure came from the message store, a projection
//! handler or a snapshot.
//!
//! # Error Categories
//!
//! - **`MessageStoreError`**: failures reported by the log client
//! - **`ProjectionError`**: a handler could not apply a message
//! - **`DefinitionError`**: a store or projection was configured incorrectly
//! - **`EntityStoreError`**, **`SnapshotError`**: hydration and snapshot failures
//! - **`ConsumerError`**, **`PositionStoreError`**: category consumption failures
//! - **`ConfigError`**: invalid runtime configuration

use crate::message::ExpectedVersion;
use crate::types::{GlobalPosition, StreamPosition};
use thiserror::Error;

/// Errors building or parsing stream names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamNameError {
    /// A stream name must start with a category.
    #[error("Category must not be omitted from stream name")]
    MissingCategory,

    /// A compound id needs at least one id.
    #[error("Compound id requires at least one id")]
    MissingIds,
}

/// Errors decoding or encoding message payloads.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The payload or metadata did not match the requested type.
    #[error("failed to decode payload of {message_type} message at position {position}: {source}")]
    Payload {
        /// Type of the offending message.
        message_type: String,
        /// Stream position of the offending message.
        position: StreamPosition,
        /// Underlying decoding failure.
        source: serde_json::Error,
    },

    /// A typed payload could not be converted to JSON.
    #[error("failed to encode {message_type} payload: {source}")]
    Encode {
        /// Type of the message being built.
        message_type: String,
        /// Underlying encoding failure.
        source: serde_json::Error,
    },
}

/// Errors reported by a message store.
///
/// # Common Scenarios
///
/// - **`WrongExpectedVersion`**: another writer appended first; reload and retry
/// - **`InvalidStreamName`** / **`InvalidCategory`**: a category was passed where a
///   stream name was expected, or the reverse
/// - **`ConsumerGroup`**: a partial or out-of-range `(member, size)` pair
/// - **`ConditionNotActivated`**: the store refuses ad-hoc retrieval conditions
/// - **`Unavailable`**: transient transport failure; a supervisor will retry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageStoreError {
    /// The stream's version did not match the write's expectation.
    #[error(
        "Wrong expected version for stream '{stream_name}': expected {expected}, current is {}",
        describe_version(.current)
    )]
    WrongExpectedVersion {
        /// The stream written to.
        stream_name: String,
        /// What the writer expected.
        expected: ExpectedVersion,
        /// The stream's actual last position; `None` when the stream is empty.
        current: Option<StreamPosition>,
    },

    /// A category was given where a full stream name is required.
    #[error("'{0}' must be a stream name, not a category")]
    InvalidStreamName(String),

    /// A stream name was given where a category is required.
    #[error("'{0}' must be a category, not a stream name")]
    InvalidCategory(String),

    /// The consumer group parameters were inconsistent.
    #[error("Invalid consumer group: {0}")]
    ConsumerGroup(String),

    /// A write was requested with no messages.
    #[error("Cannot write an empty batch to stream '{0}'")]
    EmptyBatch(String),

    /// The store does not accept retrieval conditions.
    #[error("Retrieval with SQL condition is not activated")]
    ConditionNotActivated,

    /// Message data could not be serialized for storage.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The store could not be reached.
    #[error("Message store unavailable: {0}")]
    Unavailable(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_version(version: &Option<StreamPosition>) -> String {
    version.map_or_else(|| "no stream".to_string(), |position| position.to_string())
}

/// Errors raised while applying a message to an entity.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The message payload could not be decoded.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// The handler refused the message.
    #[error("Projection rejected {message_type} message: {reason}")]
    Rejected {
        /// Type of the rejected message.
        message_type: String,
        /// Handler-supplied reason.
        reason: String,
    },
}

impl ProjectionError {
    /// Creates a rejection for a message of the given type.
    pub fn rejected(message_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            message_type: message_type.into(),
            reason: reason.into(),
        }
    }
}

/// Errors in how a store, projection or consumer was put together.
///
/// These surface from `build()` calls, before any message is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// The entity store has no category.
    #[error("Category is not declared")]
    MissingCategory,

    /// The entity store has no projection.
    #[error("Projection is not declared")]
    MissingProjection,

    /// The entity store has no entity factory.
    #[error("Entity factory is not declared")]
    MissingEntityFactory,

    /// The declared category is not a valid category.
    #[error("'{0}' is not a valid category")]
    InvalidCategory(String),

    /// Two handlers were registered for the same message type.
    #[error("Projection '{projection}' already handles {message_type}")]
    DuplicateHandler {
        /// Name of the projection.
        projection: String,
        /// The type registered twice.
        message_type: String,
    },

    /// A second fallback handler was registered.
    #[error("Projection '{0}' already has a fallback handler")]
    DuplicateFallback(String),

    /// A snapshot interval was configured without a snapshot store.
    #[error("Snapshot interval requires a snapshot store")]
    SnapshotIntervalWithoutStore,
}

/// Errors writing or reading snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The underlying message store failed.
    #[error(transparent)]
    MessageStore(#[from] MessageStoreError),

    /// The snapshot stream name could not be composed.
    #[error(transparent)]
    StreamName(#[from] StreamNameError),

    /// The snapshot message lacks a required field.
    #[error("Malformed snapshot in stream '{stream_name}': {reason}")]
    Malformed {
        /// The snapshot stream.
        stream_name: String,
        /// What was missing or wrong.
        reason: String,
    },

    /// The entity could not be encoded or decoded.
    #[error("Snapshot codec failed for stream '{stream_name}': {source}")]
    Codec {
        /// The snapshot stream.
        stream_name: String,
        /// Underlying codec failure.
        source: serde_json::Error,
    },
}

/// Errors raised by the entity store.
#[derive(Debug, Error)]
pub enum EntityStoreError {
    /// The store was built incorrectly.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// The message store failed while reading the entity's stream.
    #[error(transparent)]
    MessageStore(#[from] MessageStoreError),

    /// A projection handler failed; the cache was left untouched.
    #[error("Failed to project entity '{entity_id}': {source}")]
    Projection {
        /// Id of the entity being hydrated.
        entity_id: String,
        /// The handler's error.
        source: ProjectionError,
    },

    /// A snapshot could not be read or written.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Errors reading or recording consumer positions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionStoreError {
    /// The backing storage could not be reached.
    #[error("Position store unavailable: {0}")]
    Unavailable(String),

    /// The recorded position could not be interpreted.
    #[error("Corrupt position for consumer '{consumer}': {reason}")]
    Corrupt {
        /// Consumer whose position is corrupt.
        consumer: String,
        /// What was wrong.
        reason: String,
    },

    /// Shared state was poisoned by a panicking writer.
    #[error("Position store lock poisoned: {0}")]
    Poisoned(String),
}

/// Boxed error returned by message handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while consuming a category.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The category read failed.
    #[error(transparent)]
    MessageStore(#[from] MessageStoreError),

    /// The position could not be read or recorded.
    #[error(transparent)]
    PositionStore(#[from] PositionStoreError),

    /// The handler failed; the position was not advanced past this message.
    #[error("Consumer '{consumer}' failed to handle message at global position {global_position}: {source}")]
    Handler {
        /// The consumer's name.
        consumer: String,
        /// Global position of the failed message.
        global_position: GlobalPosition,
        /// The handler's error.
        source: HandlerError,
    },
}

/// Errors validating runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A configured value was out of range.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The backoff base delay exceeds its maximum.
    #[error("Backoff base delay ({base_ms}ms) exceeds maximum delay ({maximum_ms}ms)")]
    BackoffRange {
        /// Configured base delay in milliseconds.
        base_ms: u64,
        /// Configured maximum delay in milliseconds.
        maximum_ms: u64,
    },
}

/// Result type for message operations.
pub type MessageResult<T> = Result<T, MessageError>;

/// Result type for message store operations.
pub type MessageStoreResult<T> = Result<T, MessageStoreError>;

/// Result type for projection handlers.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Result type for entity store operations.
pub type EntityStoreResult<T> = Result<T, EntityStoreError>;

/// Result type for position store operations.
pub type PositionStoreResult<T> = Result<T, PositionStoreError>;

/// Result type for consumer operations.
pub type ConsumerResult<T> = Result<T, ConsumerError>;
