//! A small counter domain on top of eventloom.
//!
//! Counters are streams in the `counter` category. [`CounterCommands`] writes
//! to them with optimistic concurrency, [`counter_projection`] folds them into
//! [`Counter`] values, and [`Totals`] is a read model kept up to date by a
//! category consumer.

pub mod commands;
pub mod events;
pub mod projection;
pub mod report;
pub mod types;

pub use commands::{CounterCommands, CounterError, MAX_ATTEMPTS};
pub use events::{Incremented, Reset};
pub use projection::{counter_projection, Counter, CATEGORY};
pub use report::Totals;
pub use types::{CounterId, CounterIdError, Step, StepError, MAX_COUNTER_VALUE};
