//! Entity snapshots stored as messages.
//!
//! A snapshot is one `Recorded` message in the entity's snapshot stream
//! (`{category}:snapshot-{id}`). Writing a new snapshot appends; reading looks only at
//! the stream's last message, so older snapshots are simply superseded.

use crate::errors::{SnapshotError, SnapshotResult};
use crate::message::{ExpectedVersion, MessageData};
use crate::message_store::MessageStore;
use crate::stream_name::StreamNameBuilder;
use crate::types::{Category, StreamPosition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Message type of snapshot messages.
pub const SNAPSHOT_MESSAGE_TYPE: &str = "Recorded";

/// Stream type qualifier of snapshot streams.
pub const SNAPSHOT_STREAM_TYPE: &str = "snapshot";

const ENTITY_DATA: &str = "entity_data";
const ENTITY_VERSION: &str = "entity_version";
const ENTITY_TIME: &str = "entity_time";

/// Encodes an entity for storage.
pub type Encoder<E> = fn(&E) -> Result<Value, serde_json::Error>;

/// Decodes a stored entity.
pub type Decoder<E> = fn(Value) -> Result<E, serde_json::Error>;

/// A stored snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<E> {
    /// The entity as it was at `version`.
    pub entity: E,
    /// Stream position of the last message reflected in `entity`.
    pub version: StreamPosition,
    /// When the snapshot was taken.
    pub time: DateTime<Utc>,
}

/// Reads and writes snapshots for one entity type.
///
/// [`SnapshotStore`] is the message-store backed implementation; the entity store
/// only depends on this trait.
#[async_trait]
pub trait SnapshotStorage<E: Send + Sync>: Send + Sync {
    /// Records `entity` as of `version`. Returns the snapshot message's position.
    async fn put(
        &self,
        entity_id: &str,
        entity: &E,
        version: StreamPosition,
        time: Option<DateTime<Utc>>,
    ) -> SnapshotResult<StreamPosition>;

    /// Returns the latest snapshot, if one was ever recorded.
    async fn get(&self, entity_id: &str) -> SnapshotResult<Option<Snapshot<E>>>;
}

/// Snapshot storage on top of a [`MessageStore`].
pub struct SnapshotStore<E, S> {
    store: S,
    category: String,
    encode: Encoder<E>,
    decode: Decoder<E>,
}

impl<E, S> SnapshotStore<E, S>
where
    E: Serialize + DeserializeOwned,
{
    /// A snapshot store using serde for the entity and a category derived from the
    /// entity's type name (`Counter` becomes `counter`).
    pub fn new(store: S) -> Self {
        Self::with_codec(store, |entity| serde_json::to_value(entity), serde_json::from_value)
    }
}

impl<E, S> SnapshotStore<E, S> {
    /// A snapshot store with a custom codec.
    pub fn with_codec(store: S, encode: Encoder<E>, decode: Decoder<E>) -> Self {
        Self {
            store,
            category: default_category::<E>(),
            encode,
            decode,
        }
    }

    /// Overrides the snapshot category.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category.into_inner();
        self
    }

    /// The category snapshot streams are written to.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The snapshot stream of one entity.
    pub fn snapshot_stream_name(&self, entity_id: &str) -> SnapshotResult<String> {
        Ok(StreamNameBuilder::new(self.category.as_str())
            .with_type(SNAPSHOT_STREAM_TYPE)
            .id(entity_id)
            .build()?)
    }
}

impl<E, S> std::fmt::Debug for SnapshotStore<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<E, S> SnapshotStorage<E> for SnapshotStore<E, S>
where
    E: Send + Sync,
    S: MessageStore,
{
    async fn put(
        &self,
        entity_id: &str,
        entity: &E,
        version: StreamPosition,
        time: Option<DateTime<Utc>>,
    ) -> SnapshotResult<StreamPosition> {
        let stream_name = self.snapshot_stream_name(entity_id)?;
        let entity_data = (self.encode)(entity).map_err(|source| SnapshotError::Codec {
            stream_name: stream_name.clone(),
            source,
        })?;

        let mut data = Map::new();
        data.insert(ENTITY_DATA.to_string(), entity_data);
        data.insert(ENTITY_VERSION.to_string(), Value::from(version.into_inner()));
        if let Some(time) = time {
            data.insert(ENTITY_TIME.to_string(), Value::String(time.to_rfc3339()));
        }

        let position = self
            .store
            .write_message(
                &stream_name,
                MessageData::new(SNAPSHOT_MESSAGE_TYPE).with_data(Value::Object(data)),
                ExpectedVersion::Any,
            )
            .await?;

        debug!(stream_name = %stream_name, %version, %position, "Recorded snapshot");
        Ok(position)
    }

    async fn get(&self, entity_id: &str) -> SnapshotResult<Option<Snapshot<E>>> {
        let stream_name = self.snapshot_stream_name(entity_id)?;
        let Some(message) = self.store.get_last_stream_message(&stream_name, None).await? else {
            return Ok(None);
        };

        let malformed = |reason: &str| SnapshotError::Malformed {
            stream_name: stream_name.clone(),
            reason: reason.to_string(),
        };

        let entity_data = message
            .data
            .get(ENTITY_DATA)
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| malformed("missing entity data"))?;
        let version = message
            .data
            .get(ENTITY_VERSION)
            .and_then(parse_version)
            .map(StreamPosition::new)
            .ok_or_else(|| malformed("missing or non-integer entity version"))?;
        let time = match message.data.get(ENTITY_TIME) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|_| malformed("unreadable entity time"))?,
            None => message.time,
        };

        let entity = (self.decode)(entity_data).map_err(|source| SnapshotError::Codec {
            stream_name: stream_name.clone(),
            source,
        })?;

        Ok(Some(Snapshot {
            entity,
            version,
            time,
        }))
    }
}

/// Reads a version written as an integer, an integral float or a numeric string.
fn parse_version(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|v| v.is_finite() && *v >= 0.0 && v.fract().abs() < f64::EPSILON)
                .map(|v| v as u64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn default_category<E>() -> String {
    let full = std::any::type_name::<E>();
    let without_generics = full.split('<').next().unwrap_or(full);
    let name = without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics);

    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}
