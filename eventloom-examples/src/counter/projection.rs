//! The counter entity and how its messages build it.

use super::events::{Incremented, Reset};
use eventloom::{Projection, ProjectionError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Category of counter streams.
pub const CATEGORY: &str = "counter";

/// State of one counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Current value.
    pub value: i64,
    /// Increments applied since the stream began.
    pub increments: u64,
    /// Resets applied since the stream began.
    pub resets: u64,
}

/// The shared counter projection, built on first use.
pub fn counter_projection() -> Arc<Projection<Counter>> {
    static PROJECTION: OnceLock<Arc<Projection<Counter>>> = OnceLock::new();
    Arc::clone(PROJECTION.get_or_init(|| Arc::new(build_projection())))
}

fn build_projection() -> Projection<Counter> {
    let projection = Projection::builder("counter")
        .apply_typed(|counter: &mut Counter, event: Incremented| {
            if event.amount <= 0 {
                return Err(ProjectionError::rejected(
                    "Incremented",
                    format!("amount must be positive, got {}", event.amount),
                ));
            }
            counter.value += event.amount;
            counter.increments += 1;
            Ok(())
        })
        .apply_typed(|counter: &mut Counter, _: Reset| {
            counter.value = 0;
            counter.resets += 1;
            Ok(())
        })
        .build();

    projection.expect("counter projection registers each type once")
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventloom::{GlobalPosition, Message, StreamPosition};
    use serde_json::json;

    fn message(position: u64, message_type: &str, data: serde_json::Value) -> Message {
        Message {
            id: uuid_for(position),
            stream_name: "counter-1".to_string(),
            message_type: message_type.to_string(),
            position: StreamPosition::new(position),
            global_position: GlobalPosition::new(position + 1),
            data,
            metadata: serde_json::Value::Null,
            time: Default::default(),
        }
    }

    fn uuid_for(position: u64) -> uuid::Uuid {
        uuid::Uuid::from_u128(u128::from(position))
    }

    #[test]
    fn increments_and_resets_fold_into_the_counter() {
        let projection = counter_projection();
        let mut counter = Counter::default();
        let mut bound = projection.bind(&mut counter);

        assert!(bound
            .apply_message(&message(0, "Incremented", json!({ "amount": 3 })))
            .unwrap());
        assert!(bound
            .apply_message(&message(1, "Reset", json!({ "previous": 3 })))
            .unwrap());
        assert!(bound
            .apply_message(&message(2, "Incremented", json!({ "amount": 4 })))
            .unwrap());
        assert!(!bound
            .apply_message(&message(3, "Renamed", json!({})))
            .unwrap());

        assert_eq!(
            counter,
            Counter {
                value: 4,
                increments: 2,
                resets: 1
            }
        );
    }

    #[test]
    fn non_positive_increments_are_rejected() {
        let projection = counter_projection();
        let mut counter = Counter::default();
        let err = projection
            .apply(&mut counter, &message(0, "Incremented", json!({ "amount": 0 })))
            .unwrap_err();
        insta::assert_snapshot!(
            err,
            @"Projection rejected Incremented message: amount must be positive, got 0"
        );
    }
}
