//! Message-type dispatch tables for entities.
//!
//! A [`Projection`] is built once per entity type and shared by reference. Each
//! handler receives the entity and one message; a message whose type has no handler
//! goes to the fallback when there is one and is skipped otherwise.
//!
//! ```rust
//! use eventloom::{Message, MessageType, Projection, ProjectionResult};
//! use serde::Deserialize;
//!
//! #[derive(Default)]
//! struct Counter { value: i64 }
//!
//! #[derive(Deserialize)]
//! struct Incremented { amount: i64 }
//!
//! impl MessageType for Incremented {
//!     const TYPE: &'static str = "Incremented";
//! }
//!
//! let projection = Projection::<Counter>::builder("counter")
//!     .apply_typed(|counter: &mut Counter, event: Incremented| {
//!         counter.value += event.amount;
//!         Ok(())
//!     })
//!     .apply("Reset", |counter: &mut Counter, _: &Message| {
//!         counter.value = 0;
//!         Ok(())
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert!(projection.handles_type("Incremented"));
//! assert!(!projection.handles_type("Renamed"));
//! ```

use crate::errors::{DefinitionError, ProjectionResult};
use crate::message::{Message, MessageType};
use serde::de::DeserializeOwned;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

/// A projection handler.
pub type Handler<E> = Box<dyn Fn(&mut E, &Message) -> ProjectionResult<()> + Send + Sync>;

/// An immutable table of handlers keyed by message type.
pub struct Projection<E> {
    name: String,
    handlers: HashMap<String, Handler<E>>,
    fallback: Option<Handler<E>>,
}

impl<E> Projection<E> {
    /// Starts building a projection.
    pub fn builder(name: impl Into<String>) -> ProjectionBuilder<E> {
        ProjectionBuilder {
            name: name.into(),
            handlers: HashMap::new(),
            fallback: None,
            errors: Vec::new(),
        }
    }

    /// The projection's name, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a handler is registered for the message's type.
    ///
    /// The fallback does not count.
    pub fn handles(&self, message: &Message) -> bool {
        self.handles_type(&message.message_type)
    }

    /// Whether a handler is registered for `message_type`.
    pub fn handles_type(&self, message_type: &str) -> bool {
        self.handlers.contains_key(message_type)
    }

    /// Whether a fallback handler is registered.
    pub const fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// The message types with a registered handler, in no particular order.
    pub fn message_types(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Applies `message` to `entity`. Returns whether any handler ran.
    pub fn apply(&self, entity: &mut E, message: &Message) -> ProjectionResult<bool> {
        let handler = self
            .handlers
            .get(&message.message_type)
            .or(self.fallback.as_ref());

        match handler {
            Some(handler) => {
                handler(entity, message)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Binds the projection to one entity instance.
    pub fn bind<'p, 'e>(&'p self, entity: &'e mut E) -> BoundProjection<'p, 'e, E> {
        BoundProjection {
            projection: self,
            entity,
        }
    }
}

impl<E> fmt::Debug for Projection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.message_types().collect();
        types.sort_unstable();
        f.debug_struct("Projection")
            .field("name", &self.name)
            .field("handlers", &types)
            .field("fallback", &self.has_fallback())
            .finish()
    }
}

/// A projection applied to one entity.
pub struct BoundProjection<'p, 'e, E> {
    projection: &'p Projection<E>,
    entity: &'e mut E,
}

impl<E> BoundProjection<'_, '_, E> {
    /// Applies one message to the bound entity. Returns whether any handler ran.
    pub fn apply_message(&mut self, message: &Message) -> ProjectionResult<bool> {
        self.projection.apply(self.entity, message)
    }

    /// The bound entity.
    pub fn entity(&self) -> &E {
        self.entity
    }
}

/// Builder for [`Projection`].
///
/// Registration problems are collected and reported by [`ProjectionBuilder::build`].
pub struct ProjectionBuilder<E> {
    name: String,
    handlers: HashMap<String, Handler<E>>,
    fallback: Option<Handler<E>>,
    errors: Vec<DefinitionError>,
}

impl<E: 'static> ProjectionBuilder<E> {
    /// Registers a handler for a message type name.
    #[must_use]
    pub fn apply<F>(mut self, message_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut E, &Message) -> ProjectionResult<()> + Send + Sync + 'static,
    {
        match self.handlers.entry(message_type.into()) {
            Entry::Vacant(entry) => {
                let _ = entry.insert(Box::new(handler));
            }
            Entry::Occupied(entry) => {
                self.errors.push(DefinitionError::DuplicateHandler {
                    projection: self.name.clone(),
                    message_type: entry.key().clone(),
                });
            }
        }
        self
    }

    /// Registers a handler for a typed payload, keyed by `T::TYPE`.
    ///
    /// The payload is decoded before the handler runs; a payload that does not
    /// decode is a projection error.
    #[must_use]
    pub fn apply_typed<T, F>(self, handler: F) -> Self
    where
        T: MessageType + DeserializeOwned + 'static,
        F: Fn(&mut E, T) -> ProjectionResult<()> + Send + Sync + 'static,
    {
        self.apply(T::TYPE, move |entity: &mut E, message: &Message| {
            let payload = message.data_as::<T>()?;
            handler(entity, payload)
        })
    }

    /// Registers the catch-all handler for types without a handler.
    #[must_use]
    pub fn fallback<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut E, &Message) -> ProjectionResult<()> + Send + Sync + 'static,
    {
        if self.fallback.is_some() {
            self.errors
                .push(DefinitionError::DuplicateFallback(self.name.clone()));
        } else {
            self.fallback = Some(Box::new(handler));
        }
        self
    }

    /// Finishes the projection, failing on the first registration error.
    pub fn build(mut self) -> Result<Projection<E>, DefinitionError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        Ok(Projection {
            name: self.name,
            handlers: self.handlers,
            fallback: self.fallback,
        })
    }
}
