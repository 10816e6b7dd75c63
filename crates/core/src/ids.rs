use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::CoreError;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.0.to_string()[..8])
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(RequestId);
uuid_id!(DrainId);

/// An absolute IRI naming a resource, predicate or context.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Iri(String);

impl Iri {
    /// Wraps a string without validation. Use for constants and values
    /// that already came out of a store.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Validates that the value is non-empty, has a scheme and carries no
    /// whitespace.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let has_scheme = value
            .split_once(':')
            .is_some_and(|(scheme, _)| !scheme.is_empty());
        if !has_scheme || value.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidIri(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Trailing path segment or fragment, used for display.
    pub fn local_name(&self) -> &str {
        let cut = self
            .0
            .rfind(['#', '/'])
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.0[cut..]
    }

    /// Appends `segment` with exactly one `/` between the two parts.
    pub fn join(&self, segment: &str) -> Self {
        let base = self.0.trim_end_matches('/');
        Self(format!("{base}/{}", segment.trim_start_matches('/')))
    }
}

impl fmt::Debug for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Iri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Iri {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Iri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
