//! Category consumption.
//!
//! A [`Consumer`] follows one category in global order, hands each message to a
//! [`MessageHandler`] and records its progress in a [`PositionStore`].

mod category_consumer;
mod position_store;

pub use category_consumer::{Consumer, HandlerResult, MessageHandler};
pub use position_store::{InMemoryPositionStore, PositionStore};
