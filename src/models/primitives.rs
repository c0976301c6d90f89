//! ID newtypes for type-safe API interactions.
//!
//! Strongly-typed wrappers around the API's UUID strings, preventing mixed-up
//! identifiers at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
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
    };
}

id_newtype! {
    /// A manga identifier.
    ///
    /// # Example
    ///
    /// ```
    /// use mangadex_rs::MangaId;
    ///
    /// let id = MangaId::new("32d76d19-8a05-4db0-9fc2-e0b0648fe9d0");
    /// assert_eq!(id.as_str(), "32d76d19-8a05-4db0-9fc2-e0b0648fe9d0");
    /// ```
    MangaId
}

id_newtype! {
    /// A chapter identifier.
    ChapterId
}

id_newtype! {
    /// A MangaDex list identifier.
    ListId
}

id_newtype! {
    /// A user identifier.
    UserId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_conversions() {
        let id = MangaId::from("abc");
        assert_eq!(id.to_string(), "abc");
        assert_eq!(id.as_ref(), "abc");
        assert_eq!(MangaId::new(String::from("abc")), id);
    }

    #[test]
    fn test_transparent_serde() {
        let id: ListId = serde_json::from_str("\"xyz\"").unwrap();
        assert_eq!(id, ListId::new("xyz"));
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"xyz\"");
    }
}
