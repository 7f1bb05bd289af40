use super::record::EntityRecord;
use crate::types::StreamPosition;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// In-memory map from entity id to its last hydrated record.
///
/// The cache belongs to one entity store and is never evicted in the background.
/// It serializes individual map operations only; two concurrent hydrations of the
/// same id may both read the old record and the later `put` wins.
#[derive(Debug)]
pub struct EntityCache<E> {
    records: RwLock<HashMap<String, Arc<EntityRecord<E>>>>,
}

impl<E> Default for EntityCache<E> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

// Records are replaced whole, so a map left behind by a panicking writer is still
// consistent and poisoning is ignored.
impl<E> EntityCache<E> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record for `entity_id`.
    pub fn get(&self, entity_id: &str) -> Option<Arc<EntityRecord<E>>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .cloned()
    }

    /// Stores a new record for `entity_id`, replacing any existing one.
    pub fn put(
        &self,
        entity_id: impl Into<String>,
        entity: E,
        version: Option<StreamPosition>,
        persisted_version: Option<StreamPosition>,
        persisted_time: Option<DateTime<Utc>>,
    ) -> Arc<EntityRecord<E>> {
        let record = EntityRecord::new(entity_id, entity, version)
            .with_persisted(persisted_version, persisted_time);
        self.insert(record)
    }

    /// Stores a prepared record, replacing any existing one for its id.
    pub fn insert(&self, record: EntityRecord<E>) -> Arc<EntityRecord<E>> {
        let record = Arc::new(record);
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.entity_id.clone(), Arc::clone(&record));
        record
    }

    /// Removes the record for `entity_id`. Returns whether one was present.
    pub fn delete(&self, entity_id: &str) -> bool {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entity_id)
            .is_some()
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every record.
    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_replaces_the_whole_record() {
        let cache = EntityCache::new();
        let first = cache.put("1", 10, Some(StreamPosition::new(0)), None, None);

        let persisted_at = Utc::now();
        let second = cache.put(
            "1",
            20,
            Some(StreamPosition::new(1)),
            Some(StreamPosition::new(1)),
            Some(persisted_at),
        );

        assert_eq!(first.entity, 10);
        assert_eq!(second.entity, 20);
        let stored = cache.get("1").unwrap();
        assert!(Arc::ptr_eq(&stored, &second));
        assert_eq!(stored.persisted_time, Some(persisted_at));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn readers_keep_their_snapshot_of_a_replaced_record() {
        let cache = EntityCache::new();
        cache.put("1", "old", Some(StreamPosition::new(0)), None, None);
        let held = cache.get("1").unwrap();

        cache.put("1", "new", Some(StreamPosition::new(1)), None, None);

        assert_eq!(held.entity, "old");
        assert_eq!(held.version, Some(StreamPosition::new(0)));
        assert_eq!(cache.get("1").unwrap().entity, "new");
    }

    #[test]
    fn delete_is_a_no_op_when_absent() {
        let cache: EntityCache<u32> = EntityCache::new();
        assert!(!cache.delete("missing"));

        cache.put("1", 1, None, None, None);
        assert!(cache.delete("1"));
        assert!(cache.get("1").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = EntityCache::new();
        cache.put("1", 1, None, None, None);
        cache.put("2", 2, None, None, None);
        cache.clear();
        assert!(cache.is_empty());
    }
}
