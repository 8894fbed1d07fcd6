// SPDX-License-Identifier: MIT

//! Identifier newtypes.
//!
//! `RequestId` wants a full 128 bits of entropy (spec: "globally unique,
//! preferably a random 128-bit identifier"), so it wraps `uuid::Uuid`
//! directly rather than a short prefixed id. `OwnerKey`/`WorkspaceKey`/
//! `WorkerId` are caller-supplied or derived strings, so they stay thin
//! string wrappers with the usual `Display`/`Borrow<str>` ergonomics.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Globally unique identifier for one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
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
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Stable identity of the caller on whose behalf a request runs (typically a user id).
    OwnerKey
);
string_id!(
    /// Stable routing key for a tenant workspace; see [`crate::sanitize_workspace_key`].
    WorkspaceKey
);
string_id!(
    /// Identifier for one live worker process, scoped to the parent's worker table.
    WorkerId
);

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
