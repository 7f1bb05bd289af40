//! Core types for the `Eventloom` runtime.
//!
//! Positions, names and sizes are wrapped in smart-constructed newtypes so that an
//! invalid value (an empty consumer name, a category carrying an id segment, a zero
//! batch size) is rejected where it enters the system rather than deep inside a
//! polling loop.

use nutype::nutype;

/// Position of a message within its own stream.
///
/// Stream positions are 0-based: the first message written to a stream has
/// position 0. An entity's version is the stream position of the last message
/// applied to it.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Into,
    Serialize,
    Deserialize
))]
pub struct StreamPosition(u64);

impl StreamPosition {
    /// The position of the first message in any stream.
    pub fn initial() -> Self {
        Self::new(0)
    }

    /// Returns the position immediately after this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self::new(self.into_inner() + 1)
    }
}

/// Position of a message within the whole log.
///
/// Global positions are 1-based and strictly increasing across every stream.
/// Category consumers checkpoint on this value.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Into,
    Serialize,
    Deserialize
))]
pub struct GlobalPosition(u64);

impl GlobalPosition {
    /// The position category reads start from when nothing has been recorded yet.
    pub fn initial() -> Self {
        Self::new(1)
    }

    /// Returns the position immediately after this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self::new(self.into_inner() + 1)
    }
}

/// Name identifying a consumer's recorded position.
///
/// Two consumers sharing a name share a position, so names should be stable
/// across deployments.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct ConsumerName(String);

/// A category name: the stream-name prefix shared by every entity of one type.
///
/// Categories may carry type qualifiers (`account:command`) but never the `-`
/// id separator; a value containing one is a stream name, not a category.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255, predicate = |s: &str| !s.contains('-')),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct Category(String);

/// Number of messages requested per page from the message store.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 100_000),
    default = 1000,
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Default,
        Serialize,
        Deserialize
    )
)]
pub struct BatchSize(usize);

/// A `(member, size)` pair selecting one partition of a category.
///
/// The message store guarantees that the partitions for members `0..size` are
/// disjoint and together cover the whole category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ConsumerGroup {
    /// Zero-based index of this member within the group.
    pub member: u64,
    /// Total number of members in the group.
    pub size: u64,
}

impl ConsumerGroup {
    /// Creates a consumer group pair. Validation happens in the message store,
    /// which is the authority on partitioning.
    pub const fn new(member: u64, size: u64) -> Self {
        Self { member, size }
    }
}
