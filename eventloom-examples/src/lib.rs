//! Example implementations using the `Eventloom` runtime
//!
//! This crate shows how the pieces fit together on a small domain: counters
//! that are incremented and reset through their streams, hydrated by an entity
//! store and summarised by a category consumer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Counter example: writes with optimistic concurrency, hydration and a totals report
pub mod counter;
