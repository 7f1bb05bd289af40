//! Messages written to counter streams.

use eventloom::MessageType;
use serde::{Deserialize, Serialize};

/// A counter grew by `amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incremented {
    /// How much was added.
    pub amount: i64,
}

impl MessageType for Incremented {
    const TYPE: &'static str = "Incremented";
}

/// A counter went back to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reset {
    /// The value before the reset.
    pub previous: i64,
}

impl MessageType for Reset {
    const TYPE: &'static str = "Reset";
}
