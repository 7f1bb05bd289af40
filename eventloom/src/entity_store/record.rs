use crate::types::StreamPosition;
use chrono::{DateTime, Utc};

/// A cached entity together with the stream position it reflects.
///
/// Records are values: the cache replaces them wholesale and never mutates one in
/// place, so `entity` always reflects exactly the messages up to and including
/// `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord<E> {
    /// Id of the entity within its category.
    pub entity_id: String,
    /// The hydrated state.
    pub entity: E,
    /// Position of the last applied message; `None` if nothing was ever applied.
    pub version: Option<StreamPosition>,
    /// Version captured by the most recent snapshot, if any.
    pub persisted_version: Option<StreamPosition>,
    /// When the most recent snapshot was recorded.
    pub persisted_time: Option<DateTime<Utc>>,
}

impl<E> EntityRecord<E> {
    /// A record with no persisted markers.
    pub fn new(entity_id: impl Into<String>, entity: E, version: Option<StreamPosition>) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity,
            version,
            persisted_version: None,
            persisted_time: None,
        }
    }

    /// Sets the persisted markers.
    #[must_use]
    pub fn with_persisted(
        mut self,
        version: Option<StreamPosition>,
        time: Option<DateTime<Utc>>,
    ) -> Self {
        self.persisted_version = version;
        self.persisted_time = time;
        self
    }

    /// Whether at least one message has been applied.
    pub const fn is_hydrated(&self) -> bool {
        self.version.is_some()
    }

    /// Number of applied messages not yet covered by a snapshot.
    pub fn unpersisted_messages(&self) -> u64 {
        let applied = self.version.map_or(0, |v| v.into_inner() + 1);
        let persisted = self.persisted_version.map_or(0, |v| v.into_inner() + 1);
        applied.saturating_sub(persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpersisted_messages_counts_from_snapshot() {
        let fresh = EntityRecord::new("1", (), None);
        assert!(!fresh.is_hydrated());
        assert_eq!(fresh.unpersisted_messages(), 0);

        let hydrated = EntityRecord::new("1", (), Some(StreamPosition::new(4)));
        assert_eq!(hydrated.unpersisted_messages(), 5);

        let snapshotted = hydrated.with_persisted(Some(StreamPosition::new(2)), None);
        assert_eq!(snapshotted.unpersisted_messages(), 2);
    }
}
