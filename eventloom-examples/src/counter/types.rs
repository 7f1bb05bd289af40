//! Domain types for the counter example.

use nutype::nutype;

/// Identifies one counter; becomes the id segment of its stream name.
///
/// Ids are restricted to characters that cannot be confused with the stream
/// name separators.
#[nutype(
    sanitize(trim),
    validate(
        not_empty,
        len_char_max = 64,
        predicate = |id: &str| id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    ),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        PartialOrd,
        Ord,
        AsRef,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct CounterId(String);

/// Largest value a counter may reach.
pub const MAX_COUNTER_VALUE: i64 = 1_000_000;

/// A positive step applied by one increment.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 1_000),
    derive(Debug, Clone, Copy, PartialEq, Eq, Display, Into, Serialize, Deserialize)
)]
pub struct Step(i64);
