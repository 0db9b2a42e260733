//! Opaque identifiers for persisted rows.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing id read from storage or supplied by a caller.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generates a fresh globally unique id.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Stable item identifier. Existing data may carry non-UUID ids.
    ItemId
);

opaque_id!(
    /// Stable tag identifier.
    TagId
);

#[cfg(test)]
mod tests {
    use super::{ItemId, TagId};

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(ItemId::generate(), ItemId::generate());
        assert_ne!(TagId::generate(), TagId::generate());
    }

    #[test]
    fn legacy_ids_round_trip_verbatim() {
        let id = ItemId::from("AB12-legacy");
        assert_eq!(id.as_str(), "AB12-legacy");
        assert_eq!(id.to_string(), "AB12-legacy");
    }
}
