//! Identifiers for transactions and categories, and the allocator that hands them out.

use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// The id of a `Transaction`. Assigned at creation and never changed.
    TransactionId
);

id_type!(
    /// The id of a `Category`. Assigned at creation and never changed.
    CategoryId
);

/// Hands out ids derived from the creation time in milliseconds.
///
/// Ids are strictly increasing for the life of the allocator, so an id is never reused even if the
/// record that held it is deleted, and two records created in the same millisecond still get
/// different ids.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct IdAllocator {
    last: i64,
}

impl IdAllocator {
    /// Creates an allocator that will never return an id at or below `floor`.
    pub fn new(floor: i64) -> Self {
        Self { last: floor }
    }

    /// Raises the floor, e.g. after importing records that carry their own ids.
    pub fn observe(&mut self, id: i64) {
        self.last = self.last.max(id);
    }

    /// # Errors
    /// - `Conflict` if the largest id seen so far is `i64::MAX`, so no larger id exists.
    pub fn next(&mut self) -> Result<i64> {
        self.next_at(Utc::now().timestamp_millis())
    }

    fn next_at(&mut self, now_millis: i64) -> Result<i64> {
        let Some(after_last) = self.last.checked_add(1) else {
            return Err(Error::conflict(format!(
                "No id is left after {}, ids from imported data have used them all",
                self.last
            )));
        };
        let id = now_millis.max(after_last);
        self.last = id;
        Ok(id)
    }

    pub fn next_transaction_id(&mut self) -> Result<TransactionId> {
        self.next().map(TransactionId)
    }

    pub fn next_category_id(&mut self) -> Result<CategoryId> {
        self.next().map(CategoryId)
    }
}
