//! A read model of counter totals, kept by a category consumer.

use super::events::{Incremented, Reset};
use async_trait::async_trait;
use eventloom::{stream_name, HandlerResult, Message, MessageHandler};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Per-counter totals built from the `counter` category.
#[derive(Debug, Clone, Default)]
pub struct Totals {
    values: Arc<RwLock<BTreeMap<String, i64>>>,
}

impl Totals {
    /// An empty read model.
    pub fn new() -> Self {
        Self::default()
    }

    /// The total for one counter, if any message has been seen for it.
    pub fn get(&self, id: &str) -> Option<i64> {
        self.values.read().ok()?.get(id).copied()
    }

    /// Sum over every counter.
    pub fn grand_total(&self) -> i64 {
        self.values
            .read()
            .map(|values| values.values().sum())
            .unwrap_or_default()
    }

    /// All totals, ordered by counter id.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.values
            .read()
            .map(|values| values.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageHandler for Totals {
    async fn handle(&self, message: &Message) -> HandlerResult {
        let Some(id) = stream_name::cardinal_id(&message.stream_name) else {
            return Ok(());
        };

        let delta = if message.is::<Incremented>() {
            Some(message.data_as::<Incremented>()?.amount)
        } else if message.is::<Reset>() {
            Some(-message.data_as::<Reset>()?.previous)
        } else {
            None
        };

        if let Some(delta) = delta {
            let mut values = self
                .values
                .write()
                .map_err(|_| "totals lock poisoned")?;
            *values.entry(id.to_string()).or_default() += delta;
            debug!(id, delta, global_position = %message.global_position, "total updated");
        }
        Ok(())
    }
}
