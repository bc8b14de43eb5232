//! Counter names reported for an export. Forwarding them to a metrics sink
//! is up to the caller.

use std::fmt::{self, Display};

/// Number of records iterated.
pub const FETCH_SIZE: &str = "fetch.size";

/// Wire size of the database response, in bytes.
pub const FETCH_BYTES: &str = "fetch.bytes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub name: &'static str,
    pub value: i64,
}

impl Counter {
    pub fn new(name: &'static str, value: i64) -> Self {
        Self { name, value }
    }
}

impl Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}
