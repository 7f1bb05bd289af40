//! Entity hydration.
//!
//! An [`EntityStore`] rebuilds entities by replaying their streams through a
//! [`Projection`] and keeps the results in an [`EntityCache`] so that later reads
//! only replay what is new.

mod cache;
mod projection;
mod record;
mod store;

pub use cache::EntityCache;
pub use projection::{BoundProjection, Handler, Projection, ProjectionBuilder};
pub use record::EntityRecord;
pub use store::{EntityStore, EntityStoreBuilder, Include, Retrieved};
