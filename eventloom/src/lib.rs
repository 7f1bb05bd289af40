//! `Eventloom` - client runtime for stream-per-entity event sourcing
//!
//! This library sits on top of an append-only, globally ordered message log and
//! provides the pieces an application needs to use it:
//!
//! - [`stream_name`]: composing and parsing `category:type-cardinal+id` stream names
//! - [`MessageStore`]: the contract a log client fulfils, with lazy pagination in
//!   [`MessageStoreExt`]
//! - [`entity_store`]: projections, an entity cache and incremental hydration
//! - [`snapshot`]: snapshot streams that bound replay cost
//! - [`consumer`]: category consumers that checkpoint their global position
//! - [`service_host`]: a supervisor that keeps polling services alive with backoff
//!
//! A process-local log lives in the `eventloom-memory` crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod consumer;
pub mod entity_store;
pub mod errors;
pub mod message;
pub mod message_store;
pub mod service_host;
pub mod snapshot;
pub mod stream_name;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use config::{BackoffConfig, ConsumerConfig, HostConfig};
pub use consumer::{
    Consumer, HandlerResult, InMemoryPositionStore, MessageHandler, PositionStore,
};
pub use entity_store::{
    EntityCache, EntityRecord, EntityStore, EntityStoreBuilder, Include, Projection,
    ProjectionBuilder, Retrieved,
};
pub use errors::{
    ConfigError, ConsumerError, ConsumerResult, DefinitionError, EntityStoreError,
    EntityStoreResult, HandlerError, MessageError, MessageResult, MessageStoreError, MessageStoreResult,
    PositionStoreError, PositionStoreResult, ProjectionError, ProjectionResult, SnapshotError,
    SnapshotResult, StreamNameError,
};
pub use message::{ExpectedVersion, Message, MessageData, MessageType};
pub use message_store::{CategoryQuery, MessageStore, MessageStoreExt, StreamQuery};
pub use service_host::{Backoff, RunSummary, Service, ServiceError, ServiceHost, ServiceSummary};
pub use snapshot::{Snapshot, SnapshotStorage, SnapshotStore};
pub use stream_name::StreamNameBuilder;
pub use types::{BatchSize, Category, ConsumerGroup, ConsumerName, GlobalPosition, StreamPosition};
