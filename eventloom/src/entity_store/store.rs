use super::cache::EntityCache;
use super::projection::Projection;
use super::record::EntityRecord;
use crate::errors::{DefinitionError, EntityStoreError, EntityStoreResult};
use crate::message::Message;
use crate::message_store::{MessageStore, MessageStoreExt, StreamQuery};
use crate::snapshot::SnapshotStorage;
use crate::stream_name;
use crate::types::{BatchSize, Category, StreamPosition};
use chrono::Utc;
use futures::TryStreamExt;
use std::num::NonZeroU64;
use std::sync::Arc;
use tracing::{debug, info, instrument};

type EntityFactory<E> = Arc<dyn Fn() -> E + Send + Sync>;
type NewEntityProbe<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Which shape [`EntityStore::get_with`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Include {
    /// Only the entity.
    #[default]
    Entity,
    /// The entity and its version.
    Version,
    /// The whole cached record.
    Record,
}

/// A hydrated entity in the shape requested by an [`Include`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieved<E> {
    /// The entity.
    Entity(E),
    /// The entity and the position of the last message applied to it.
    Version(E, StreamPosition),
    /// The cached record.
    Record(Arc<EntityRecord<E>>),
}

/// Hydrates entities from their streams.
///
/// Each `get` starts from the cached record (or a fresh entity, or the latest
/// snapshot), reads only the messages written after that record's version and
/// caches the result. A cache hit therefore never skips the log; it only shortens
/// the replay.
pub struct EntityStore<E, S> {
    store: S,
    category: Category,
    projection: Arc<Projection<E>>,
    entity_factory: EntityFactory<E>,
    batch_size: BatchSize,
    cache: Arc<EntityCache<E>>,
    snapshots: Option<Arc<dyn SnapshotStorage<E>>>,
    snapshot_interval: Option<NonZeroU64>,
    new_entity_probe: Option<NewEntityProbe<E>>,
}

impl<E, S> EntityStore<E, S>
where
    E: Clone + Send + Sync + 'static,
    S: MessageStore,
{
    /// Starts building a store over `store`.
    pub fn builder(store: S) -> EntityStoreBuilder<E, S> {
        EntityStoreBuilder {
            store,
            category: None,
            projection: None,
            entity_factory: None,
            batch_size: BatchSize::default(),
            cache: None,
            snapshots: None,
            snapshot_interval: None,
            new_entity_probe: None,
        }
    }

    /// The category entities are read from.
    pub const fn category(&self) -> &Category {
        &self.category
    }

    /// The store's cache.
    pub const fn cache(&self) -> &Arc<EntityCache<E>> {
        &self.cache
    }

    /// The stream holding one entity's messages.
    pub fn stream_name(&self, entity_id: &str) -> String {
        stream_name::entity_stream_name(&self.category, entity_id)
    }

    /// The current entity, or `None` if its stream has no messages.
    pub async fn get(&self, entity_id: &str) -> EntityStoreResult<Option<E>> {
        Ok(self
            .get_record(entity_id)
            .await?
            .map(|record| record.entity.clone()))
    }

    /// The current entity and its version.
    pub async fn get_versioned(
        &self,
        entity_id: &str,
    ) -> EntityStoreResult<Option<(E, StreamPosition)>> {
        Ok(self.get_record(entity_id).await?.and_then(|record| {
            record
                .version
                .map(|version| (record.entity.clone(), version))
        }))
    }

    /// The current cached record.
    pub async fn get_record(
        &self,
        entity_id: &str,
    ) -> EntityStoreResult<Option<Arc<EntityRecord<E>>>> {
        self.hydrate(entity_id, &mut |_| {}).await
    }

    /// The current entity in the requested shape.
    pub async fn get_with(
        &self,
        entity_id: &str,
        include: Include,
    ) -> EntityStoreResult<Option<Retrieved<E>>> {
        let Some(record) = self.get_record(entity_id).await? else {
            return Ok(None);
        };
        Ok(match include {
            Include::Entity => Some(Retrieved::Entity(record.entity.clone())),
            Include::Version => record
                .version
                .map(|version| Retrieved::Version(record.entity.clone(), version)),
            Include::Record => Some(Retrieved::Record(record)),
        })
    }

    /// Like [`EntityStore::get_record`], calling `probe` with every message applied.
    pub async fn get_probed<P>(
        &self,
        entity_id: &str,
        mut probe: P,
    ) -> EntityStoreResult<Option<Arc<EntityRecord<E>>>>
    where
        P: FnMut(&Message) + Send,
    {
        self.hydrate(entity_id, &mut probe).await
    }

    /// The current entity, or a freshly made one if its stream has no messages.
    pub async fn fetch(&self, entity_id: &str) -> EntityStoreResult<E> {
        Ok(self.fetch_versioned(entity_id).await?.0)
    }

    /// Like [`EntityStore::fetch`], with the version (`None` for a fresh entity).
    pub async fn fetch_versioned(
        &self,
        entity_id: &str,
    ) -> EntityStoreResult<(E, Option<StreamPosition>)> {
        Ok(match self.get_record(entity_id).await? {
            Some(record) => (record.entity.clone(), record.version),
            None => (self.new_entity(), None),
        })
    }

    /// The entity's current version, or `None` if its stream has no messages.
    pub async fn get_version(&self, entity_id: &str) -> EntityStoreResult<Option<StreamPosition>> {
        Ok(self
            .get_record(entity_id)
            .await?
            .and_then(|record| record.version))
    }

    /// Evicts the entity from the cache. The log is not touched.
    pub fn delete_cache_record(&self, entity_id: &str) -> bool {
        self.cache.delete(entity_id)
    }

    /// Applies the messages after `known_version` to `entity`.
    ///
    /// Reads from position 0 when `known_version` is `None`. Returns the position of
    /// the last applied message, or `known_version` when there was nothing new. On a
    /// handler error `entity` may hold a partial update and should be discarded.
    pub async fn refresh(
        &self,
        entity: &mut E,
        entity_id: &str,
        known_version: Option<StreamPosition>,
    ) -> EntityStoreResult<Option<StreamPosition>> {
        self.refresh_probed(entity, entity_id, known_version, &mut |_| {})
            .await
    }

    #[instrument(skip(self, entity, probe), fields(category = %self.category))]
    async fn refresh_probed(
        &self,
        entity: &mut E,
        entity_id: &str,
        known_version: Option<StreamPosition>,
        probe: &mut (dyn FnMut(&Message) + Send),
    ) -> EntityStoreResult<Option<StreamPosition>> {
        let stream_name = self.stream_name(entity_id);
        let query = StreamQuery {
            position: known_version.map(StreamPosition::next),
            batch_size: Some(self.batch_size),
            condition: None,
        };

        let mut messages = self.store.stream_messages(&stream_name, query);
        let mut projection = self.projection.bind(entity);
        let mut version = known_version;
        let mut applied = 0usize;

        while let Some(message) = messages.try_next().await? {
            projection
                .apply_message(&message)
                .map_err(|source| EntityStoreError::Projection {
                    entity_id: entity_id.to_string(),
                    source,
                })?;
            version = Some(message.position);
            applied += 1;
            probe(&message);
        }

        debug!(
            stream_name = %stream_name,
            applied,
            version = ?version.map(StreamPosition::into_inner),
            "Refreshed entity"
        );
        Ok(version)
    }

    async fn hydrate(
        &self,
        entity_id: &str,
        probe: &mut (dyn FnMut(&Message) + Send),
    ) -> EntityStoreResult<Option<Arc<EntityRecord<E>>>> {
        let cached = self.cache.get(entity_id);

        let mut start = match &cached {
            Some(record) => EntityRecord::clone(record),
            None => self.initial_record(entity_id).await?,
        };

        let current = self
            .refresh_probed(&mut start.entity, entity_id, start.version, probe)
            .await?;

        if current.is_none() {
            return Ok(cached);
        }
        if let Some(record) = &cached {
            if record.version == current {
                return Ok(cached);
            }
        }

        start.version = current;
        let record = self.snapshot_if_due(start).await?;
        Ok(Some(self.cache.insert(record)))
    }

    async fn initial_record(&self, entity_id: &str) -> EntityStoreResult<EntityRecord<E>> {
        if let Some(snapshots) = &self.snapshots {
            if let Some(snapshot) = snapshots.get(entity_id).await? {
                debug!(entity_id, version = %snapshot.version, "Seeded entity from snapshot");
                return Ok(
                    EntityRecord::new(entity_id, snapshot.entity, Some(snapshot.version))
                        .with_persisted(Some(snapshot.version), Some(snapshot.time)),
                );
            }
        }
        Ok(EntityRecord::new(entity_id, self.new_entity(), None))
    }

    async fn snapshot_if_due(&self, record: EntityRecord<E>) -> EntityStoreResult<EntityRecord<E>> {
        let (Some(snapshots), Some(interval), Some(version)) =
            (&self.snapshots, self.snapshot_interval, record.version)
        else {
            return Ok(record);
        };
        if record.unpersisted_messages() < interval.get() {
            return Ok(record);
        }

        let time = Utc::now();
        snapshots
            .put(&record.entity_id, &record.entity, version, Some(time))
            .await?;
        info!(entity_id = %record.entity_id, %version, "Snapshot recorded");
        Ok(record.with_persisted(Some(version), Some(time)))
    }

    fn new_entity(&self) -> E {
        let entity = (self.entity_factory)();
        if let Some(probe) = &self.new_entity_probe {
            probe(&entity);
        }
        entity
    }
}

impl<E, S> std::fmt::Debug for EntityStore<E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("category", &self.category)
            .field("projection", &self.projection)
            .field("batch_size", &self.batch_size)
            .field("cached", &self.cache.len())
            .field("snapshots", &self.snapshots.is_some())
            .field("snapshot_interval", &self.snapshot_interval)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EntityStore`].
///
/// Category, projection and entity factory are required; [`EntityStoreBuilder::build`]
/// reports the first one missing as a [`DefinitionError`].
pub struct EntityStoreBuilder<E, S> {
    store: S,
    category: Option<String>,
    projection: Option<Arc<Projection<E>>>,
    entity_factory: Option<EntityFactory<E>>,
    batch_size: BatchSize,
    cache: Option<Arc<EntityCache<E>>>,
    snapshots: Option<Arc<dyn SnapshotStorage<E>>>,
    snapshot_interval: Option<NonZeroU64>,
    new_entity_probe: Option<NewEntityProbe<E>>,
}

impl<E, S> EntityStoreBuilder<E, S>
where
    E: Clone + Send + Sync + 'static,
    S: MessageStore,
{
    /// Sets the category entities live in.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the projection applied to each message.
    #[must_use]
    pub fn projection(mut self, projection: impl Into<Arc<Projection<E>>>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Sets how fresh entities are made.
    #[must_use]
    pub fn entity_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        self.entity_factory = Some(Arc::new(factory));
        self
    }

    /// Sets the page size for stream reads.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: BatchSize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Uses an existing cache instead of a private one.
    #[must_use]
    pub fn cache(mut self, cache: Arc<EntityCache<E>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Seeds uncached entities from snapshots.
    #[must_use]
    pub fn snapshots(mut self, snapshots: impl SnapshotStorage<E> + 'static) -> Self {
        self.snapshots = Some(Arc::new(snapshots));
        self
    }

    /// Records a snapshot whenever `interval` or more messages were applied since the
    /// last one. Requires [`EntityStoreBuilder::snapshots`].
    #[must_use]
    pub const fn snapshot_interval(mut self, interval: NonZeroU64) -> Self {
        self.snapshot_interval = Some(interval);
        self
    }

    /// Calls `probe` with every freshly made entity.
    #[must_use]
    pub fn new_entity_probe<F>(mut self, probe: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.new_entity_probe = Some(Arc::new(probe));
        self
    }

    /// Validates the definition and builds the store.
    pub fn build(self) -> EntityStoreResult<EntityStore<E, S>> {
        let category = self
            .category
            .filter(|category| !category.trim().is_empty())
            .ok_or(DefinitionError::MissingCategory)?;
        let category = Category::try_new(category.clone())
            .map_err(|_| DefinitionError::InvalidCategory(category))?;
        let projection = self.projection.ok_or(DefinitionError::MissingProjection)?;
        let entity_factory = self
            .entity_factory
            .ok_or(DefinitionError::MissingEntityFactory)?;
        if self.snapshot_interval.is_some() && self.snapshots.is_none() {
            return Err(DefinitionError::SnapshotIntervalWithoutStore.into());
        }

        Ok(EntityStore {
            store: self.store,
            category,
            projection,
            entity_factory,
            batch_size: self.batch_size,
            cache: self.cache.unwrap_or_default(),
            snapshots: self.snapshots,
            snapshot_interval: self.snapshot_interval,
            new_entity_probe: self.new_entity_probe,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProjectionError;
    use crate::fixtures::VecLog;
    use crate::message::{ExpectedVersion, MessageData};
    use crate::snapshot::SnapshotStore;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    struct Counter {
        value: i64,
    }

    fn counter_projection() -> Projection<Counter> {
        Projection::builder("counter")
            .apply("Incremented", |counter: &mut Counter, message: &Message| {
                counter.value += message.data["amount"].as_i64().unwrap_or(1);
                Ok(())
            })
            .apply("Broken", |_: &mut Counter, message: &Message| {
                Err(ProjectionError::rejected(message.message_type.clone(), "corrupt"))
            })
            .build()
            .unwrap()
    }

    fn counter_store(log: VecLog) -> EntityStore<Counter, VecLog> {
        EntityStore::builder(log)
            .category("counter")
            .projection(counter_projection())
            .entity_factory(Counter::default)
            .build()
            .unwrap()
    }

    async fn increment(log: &VecLog, id: &str, amount: i64) -> StreamPosition {
        log.write_message(
            &format!("counter-{id}"),
            MessageData::new("Incremented").with_data(json!({ "amount": amount })),
            ExpectedVersion::Any,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn get_replays_the_stream() {
        let log = VecLog::new();
        increment(&log, "123", 3).await;
        increment(&log, "123", 4).await;
        log.append("counter-123", &["Renamed"]).await;
        let store = counter_store(log);

        let (counter, version) = store.get_versioned("123").await.unwrap().unwrap();

        assert_eq!(counter, Counter { value: 7 });
        assert_eq!(version, StreamPosition::new(2));
    }

    #[tokio::test]
    async fn missing_stream_gets_none_but_fetches_fresh() {
        let store = counter_store(VecLog::new());

        assert_eq!(store.get("404").await.unwrap(), None);
        assert_eq!(store.get_version("404").await.unwrap(), None);
        assert_eq!(store.fetch("404").await.unwrap(), Counter::default());
        assert_eq!(
            store.fetch_versioned("404").await.unwrap(),
            (Counter::default(), None)
        );
        assert!(store.cache().is_empty());
    }

    #[tokio::test]
    async fn cached_entity_replays_only_new_messages() {
        let log = VecLog::new();
        increment(&log, "1", 1).await;
        increment(&log, "1", 1).await;
        let store = counter_store(log.clone());

        let mut first_pass = Vec::new();
        store
            .get_probed("1", |m: &Message| first_pass.push(m.position))
            .await
            .unwrap();
        increment(&log, "1", 5).await;

        let mut second_pass = Vec::new();
        let record = store
            .get_probed("1", |m: &Message| second_pass.push(m.position))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first_pass, vec![StreamPosition::new(0), StreamPosition::new(1)]);
        assert_eq!(second_pass, vec![StreamPosition::new(2)]);
        assert_eq!(record.entity, Counter { value: 7 });
        assert_eq!(record.version, Some(StreamPosition::new(2)));
    }

    #[tokio::test]
    async fn unchanged_stream_keeps_the_cached_record() {
        let log = VecLog::new();
        increment(&log, "1", 2).await;
        let store = counter_store(log);

        let first = store.get_record("1").await.unwrap().unwrap();
        let second = store.get_record("1").await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn get_with_selects_the_shape() {
        let log = VecLog::new();
        increment(&log, "1", 2).await;
        let store = counter_store(log);

        assert_eq!(
            store.get_with("1", Include::Entity).await.unwrap(),
            Some(Retrieved::Entity(Counter { value: 2 }))
        );
        assert_eq!(
            store.get_with("1", Include::Version).await.unwrap(),
            Some(Retrieved::Version(Counter { value: 2 }, StreamPosition::new(0)))
        );
        let Some(Retrieved::Record(record)) = store.get_with("1", Include::Record).await.unwrap()
        else {
            panic!("expected a record");
        };
        assert_eq!(record.entity_id, "1");
        assert_eq!(store.get_with("2", Include::Version).await.unwrap(), None);
    }

    #[tokio::test]
    async fn projection_failure_leaves_cache_untouched() {
        let log = VecLog::new();
        increment(&log, "1", 2).await;
        let store = counter_store(log.clone());
        store.get("1").await.unwrap();

        increment(&log, "1", 3).await;
        log.append("counter-1", &["Broken"]).await;

        let err = assert_err!(store.get("1").await);
        assert!(matches!(err, EntityStoreError::Projection { ref entity_id, .. } if entity_id == "1"));

        let cached = store.cache().get("1").unwrap();
        assert_eq!(cached.entity, Counter { value: 2 });
        assert_eq!(cached.version, Some(StreamPosition::new(0)));
    }

    #[tokio::test]
    async fn read_failure_is_surfaced() {
        let log = VecLog::new();
        increment(&log, "1", 2).await;
        log.fail_next_reads(1);
        let store = counter_store(log);

        assert!(matches!(
            store.get("1").await,
            Err(EntityStoreError::MessageStore(_))
        ));
        assert_eq!(assert_ok!(store.get("1").await), Some(Counter { value: 2 }));
    }

    #[tokio::test]
    async fn deleting_the_cache_record_forces_full_replay() {
        let log = VecLog::new();
        increment(&log, "1", 2).await;
        increment(&log, "1", 2).await;
        let store = counter_store(log);
        store.get("1").await.unwrap();

        assert!(store.delete_cache_record("1"));
        assert!(!store.delete_cache_record("1"));

        let mut replayed = 0;
        store.get_probed("1", |_: &Message| replayed += 1).await.unwrap();
        assert_eq!(replayed, 2);
    }

    #[tokio::test]
    async fn refresh_is_repeatable_from_the_same_version() {
        let log = VecLog::new();
        for amount in 1..=4 {
            increment(&log, "1", amount).await;
        }
        let store = counter_store(log);

        let mut once = Counter { value: 100 };
        let mut twice = Counter { value: 100 };
        let v1 = store
            .refresh(&mut once, "1", Some(StreamPosition::new(1)))
            .await
            .unwrap();
        let v2 = store
            .refresh(&mut twice, "1", Some(StreamPosition::new(1)))
            .await
            .unwrap();

        assert_eq!(once, twice);
        assert_eq!(once, Counter { value: 107 });
        assert_eq!(v1, Some(StreamPosition::new(3)));
        assert_eq!(v1, v2);

        let mut untouched = Counter::default();
        let unchanged = store
            .refresh(&mut untouched, "1", Some(StreamPosition::new(3)))
            .await
            .unwrap();
        assert_eq!(unchanged, Some(StreamPosition::new(3)));
        assert_eq!(untouched, Counter::default());
    }

    #[tokio::test]
    async fn new_entity_probe_sees_fresh_entities() {
        let made = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&made);
        let store = EntityStore::builder(VecLog::new())
            .category("counter")
            .projection(counter_projection())
            .entity_factory(Counter::default)
            .new_entity_probe(move |_: &Counter| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        store.fetch("1").await.unwrap();

        // One for the attempted hydration, one for the fetch default.
        assert_eq!(made.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stream_name_uses_category() {
        let store = counter_store(VecLog::new());
        assert_eq!(store.stream_name("abc"), "counter-abc");
        assert_eq!(store.category().as_ref(), "counter");
    }

    #[test]
    fn missing_parts_are_definition_errors() {
        let missing_category = EntityStore::<Counter, _>::builder(VecLog::new())
            .projection(counter_projection())
            .entity_factory(Counter::default)
            .build();
        assert!(matches!(
            missing_category,
            Err(EntityStoreError::Definition(DefinitionError::MissingCategory))
        ));

        let missing_projection = EntityStore::<Counter, _>::builder(VecLog::new())
            .category("counter")
            .entity_factory(Counter::default)
            .build();
        assert!(matches!(
            missing_projection,
            Err(EntityStoreError::Definition(DefinitionError::MissingProjection))
        ));

        let missing_factory = EntityStore::<Counter, _>::builder(VecLog::new())
            .category("counter")
            .projection(counter_projection())
            .build();
        assert!(matches!(
            missing_factory,
            Err(EntityStoreError::Definition(DefinitionError::MissingEntityFactory))
        ));

        let stream_as_category = EntityStore::<Counter, _>::builder(VecLog::new())
            .category("counter-1")
            .projection(counter_projection())
            .entity_factory(Counter::default)
            .build();
        assert!(matches!(
            stream_as_category,
            Err(EntityStoreError::Definition(DefinitionError::InvalidCategory(_)))
        ));
    }

    #[test]
    fn snapshot_interval_needs_a_snapshot_store() {
        let result = EntityStore::<Counter, _>::builder(VecLog::new())
            .category("counter")
            .projection(counter_projection())
            .entity_factory(Counter::default)
            .snapshot_interval(NonZeroU64::MIN)
            .build();
        assert!(matches!(
            result,
            Err(EntityStoreError::Definition(
                DefinitionError::SnapshotIntervalWithoutStore
            ))
        ));
    }

    #[tokio::test]
    async fn snapshot_seeds_uncached_entities() {
        let log = VecLog::new();
        for amount in [1, 1, 1, 10, 20] {
            increment(&log, "1", amount).await;
        }
        let snapshots = SnapshotStore::new(log.clone());
        snapshots
            .put("1", &Counter { value: 500 }, StreamPosition::new(2), None)
            .await
            .unwrap();

        let store = EntityStore::builder(log)
            .category("counter")
            .projection(counter_projection())
            .entity_factory(Counter::default)
            .snapshots(snapshots)
            .build()
            .unwrap();

        let mut replayed = Vec::new();
        let record = store
            .get_probed("1", |m: &Message| replayed.push(m.position.into_inner()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(replayed, vec![3, 4]);
        assert_eq!(record.entity, Counter { value: 530 });
        assert_eq!(record.version, Some(StreamPosition::new(4)));
        assert_eq!(record.persisted_version, Some(StreamPosition::new(2)));
        assert!(record.persisted_time.is_some());
    }

    #[tokio::test]
    async fn snapshots_are_written_every_interval() {
        let log = VecLog::new();
        for _ in 0..3 {
            increment(&log, "1", 1).await;
        }
        let store = EntityStore::builder(log.clone())
            .category("counter")
            .projection(counter_projection())
            .entity_factory(Counter::default)
            .snapshots(SnapshotStore::<Counter, _>::new(log.clone()))
            .snapshot_interval(NonZeroU64::new(3).unwrap())
            .build()
            .unwrap();

        let record = store.get_record("1").await.unwrap().unwrap();
        assert_eq!(record.persisted_version, Some(StreamPosition::new(2)));

        increment(&log, "1", 1).await;
        let record = store.get_record("1").await.unwrap().unwrap();
        assert_eq!(record.persisted_version, Some(StreamPosition::new(2)));
        assert_eq!(record.version, Some(StreamPosition::new(3)));

        let written = SnapshotStore::<Counter, _>::new(log)
            .get("1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(written.entity, Counter { value: 3 });
        assert_eq!(written.version, StreamPosition::new(2));
    }
}
