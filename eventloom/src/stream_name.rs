//! Stream name grammar.
//!
//! A stream name has the form `category[:type[+type...]][-id[+id...]]`. The category
//! (with its optional type qualifiers) comes before the first `-`; everything after it
//! is the id, which may be a compound of `+`-separated ids whose first element is the
//! cardinal id used for consumer-group partitioning.
//!
//! ```rust
//! use eventloom::stream_name::{self, StreamNameBuilder};
//!
//! let name = StreamNameBuilder::new("order")
//!     .cardinal_id("ABC")
//!     .id("123")
//!     .build()
//!     .unwrap();
//! assert_eq!(name, "order-ABC+123");
//! assert_eq!(stream_name::cardinal_id(&name), Some("ABC"));
//! assert_eq!(stream_name::category(&name), "order");
//! ```
//!
//! Everything here is a pure string function. Parsing never fails: a name without
//! an id is a category, and the getters return `None` or empty lists accordingly.

use crate::errors::StreamNameError;
use crate::types::Category;

/// Separates the category from the id.
pub const ID_SEPARATOR: char = '-';

/// Separates the elements of compound ids and compound types.
pub const COMPOUND_SEPARATOR: char = '+';

/// Separates the entity name from its type qualifiers.
pub const TYPE_SEPARATOR: char = ':';

/// Composes stream names.
///
/// Ids are emitted in the order cardinal id, then each `id` call, then each `ids`
/// element. Types are emitted in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamNameBuilder {
    category: String,
    cardinal_id: Option<String>,
    ids: Vec<String>,
    types: Vec<String>,
}

impl StreamNameBuilder {
    /// Starts a stream name in the given category.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Self::default()
        }
    }

    /// Sets the cardinal id, which always comes first among the ids.
    #[must_use]
    pub fn cardinal_id(mut self, id: impl Into<String>) -> Self {
        self.cardinal_id = Some(id.into());
        self
    }

    /// Appends one id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.ids.push(id.into());
        self
    }

    /// Appends several ids.
    #[must_use]
    pub fn ids<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Appends one type qualifier.
    #[must_use]
    pub fn with_type(mut self, stream_type: impl Into<String>) -> Self {
        self.types.push(stream_type.into());
        self
    }

    /// Appends several type qualifiers.
    #[must_use]
    pub fn with_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Produces the stream name.
    pub fn build(self) -> Result<String, StreamNameError> {
        if self.category.is_empty() {
            return Err(StreamNameError::MissingCategory);
        }

        let mut name = self.category;

        if !self.types.is_empty() {
            name.push(TYPE_SEPARATOR);
            name.push_str(&join(&self.types));
        }

        let ids: Vec<String> = self.cardinal_id.into_iter().chain(self.ids).collect();
        if !ids.is_empty() {
            name.push(ID_SEPARATOR);
            name.push_str(&join(&ids));
        }

        Ok(name)
    }
}

fn join(parts: &[String]) -> String {
    parts.join(&COMPOUND_SEPARATOR.to_string())
}

/// Composes `category-id`, the stream name of one entity.
pub fn stream_name(category: &str, id: &str) -> Result<String, StreamNameError> {
    StreamNameBuilder::new(category).id(id).build()
}

/// Composes the stream name of one entity in an already validated category.
pub fn entity_stream_name(category: &Category, id: &str) -> String {
    format!("{category}{ID_SEPARATOR}{id}")
}

/// Joins ids into a compound id.
pub fn compound_id<I, T>(ids: I) -> Result<String, StreamNameError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let ids: Vec<String> = ids.into_iter().map(|id| id.as_ref().to_string()).collect();
    if ids.is_empty() {
        return Err(StreamNameError::MissingIds);
    }
    Ok(join(&ids))
}

/// Splits a compound id into its elements.
pub fn parse_compound_id(id: &str) -> Vec<&str> {
    id.split(COMPOUND_SEPARATOR).collect()
}

/// Splits a stream name on its first `-` into category and id.
pub fn split(stream_name: &str) -> (&str, Option<&str>) {
    match stream_name.split_once(ID_SEPARATOR) {
        Some((category, id)) => (category, Some(id)),
        None => (stream_name, None),
    }
}

/// The category, including any type qualifiers.
pub fn category(stream_name: &str) -> &str {
    split(stream_name).0
}

/// The whole (possibly compound) id.
pub fn id(stream_name: &str) -> Option<&str> {
    split(stream_name).1
}

/// The individual ids of the stream; empty for a category.
pub fn ids(stream_name: &str) -> Vec<&str> {
    id(stream_name).map(parse_compound_id).unwrap_or_default()
}

/// The first id of the stream.
pub fn cardinal_id(stream_name: &str) -> Option<&str> {
    id(stream_name).and_then(|id| parse_compound_id(id).into_iter().next())
}

/// Whether the name has no id segment.
pub fn is_category(stream_name: &str) -> bool {
    !stream_name.contains(ID_SEPARATOR)
}

/// The raw type qualifier segment after `:`, if any.
pub fn category_type(stream_name: &str) -> Option<&str> {
    category(stream_name)
        .split_once(TYPE_SEPARATOR)
        .map(|(_, types)| types)
}

/// The individual type qualifiers; empty when there are none.
pub fn types(stream_name: &str) -> Vec<&str> {
    category_type(stream_name)
        .map(parse_compound_id)
        .unwrap_or_default()
}

/// The category without type qualifiers.
pub fn entity_name(stream_name: &str) -> &str {
    let category = category(stream_name);
    category
        .split_once(TYPE_SEPARATOR)
        .map_or(category, |(entity, _)| entity)
}
