//! Newtype IDs for type-safe identifiers.
//!
//! ERP record ids are positive integers. Wrapping them prevents passing a
//! TemplateId where a VariantId is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Macro to generate newtype ID structs.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Create an ID from its numeric value.
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the numeric value.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

define_id!(
    /// A sellable product variant.
    VariantId
);
define_id!(
    /// The parent product grouping variants.
    TemplateId
);
define_id!(
    /// A sales channel (storefront).
    ChannelId
);
define_id!(WarehouseId);
define_id!(CategoryId);
define_id!(RewriteId);

/// Parse a strictly decimal id (no sign, no whitespace).
pub(crate) fn parse_decimal(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
