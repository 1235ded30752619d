//! Stable opaque identifiers used across the workflow state graph.
//!
//! The state graph (slides ↔ sections ↔ chunks) is cycle-free by
//! construction. References between entities are always by id, resolved
//! through a lookup, never as owning back-pointers.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_id!(PresentationId);
opaque_id!(SectionId);
opaque_id!(SlideId);
opaque_id!(DocKey);
opaque_id!(ChunkKey);
opaque_id!(StepId);
opaque_id!(TraceId);
opaque_id!(SessionId);
