use crate::errors::{PositionStoreError, PositionStoreResult};
use crate::types::{ConsumerName, GlobalPosition};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Durable record of how far each consumer has read.
///
/// Positions are global positions of the last message a consumer handled
/// successfully.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// The last recorded position for `consumer`, if any.
    async fn get(&self, consumer: &ConsumerName) -> PositionStoreResult<Option<GlobalPosition>>;

    /// Records `position` as the last handled message for `consumer`.
    async fn set(&self, consumer: &ConsumerName, position: GlobalPosition)
        -> PositionStoreResult<()>;
}

#[async_trait]
impl<T> PositionStore for Arc<T>
where
    T: PositionStore + ?Sized,
{
    async fn get(&self, consumer: &ConsumerName) -> PositionStoreResult<Option<GlobalPosition>> {
        (**self).get(consumer).await
    }

    async fn set(
        &self,
        consumer: &ConsumerName,
        position: GlobalPosition,
    ) -> PositionStoreResult<()> {
        (**self).set(consumer, position).await
    }
}

/// Process-local position store.
///
/// Clones share the same positions. Nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPositionStore {
    positions: Arc<RwLock<HashMap<ConsumerName, GlobalPosition>>>,
}

impl InMemoryPositionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every recorded position.
    pub fn positions(&self) -> PositionStoreResult<HashMap<ConsumerName, GlobalPosition>> {
        self.positions
            .read()
            .map(|positions| positions.clone())
            .map_err(|e| PositionStoreError::Poisoned(e.to_string()))
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    async fn get(&self, consumer: &ConsumerName) -> PositionStoreResult<Option<GlobalPosition>> {
        let positions = self
            .positions
            .read()
            .map_err(|e| PositionStoreError::Poisoned(e.to_string()))?;
        Ok(positions.get(consumer).copied())
    }

    async fn set(
        &self,
        consumer: &ConsumerName,
        position: GlobalPosition,
    ) -> PositionStoreResult<()> {
        let mut positions = self
            .positions
            .write()
            .map_err(|e| PositionStoreError::Poisoned(e.to_string()))?;
        let _ = positions.insert(consumer.clone(), position);
        Ok(())
    }
}
