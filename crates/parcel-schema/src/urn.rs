//! Canonical package references.
//!
//! Every package known to parcel is addressed by a Uniform Resource Name of
//! the form `urn:<namespace>:<id>`. The namespace selects the handler that
//! owns the package; the id is opaque to everything except that handler.
//!
//! # Example
//!
//! ```
//! use parcel_schema::Urn;
//!
//! let urn: Urn = "urn:choco:git:2.45.1".parse().unwrap();
//! assert_eq!(urn.namespace(), "choco");
//! assert_eq!(urn.split_version(), ("git", Some("2.45.1")));
//! assert_eq!(urn.to_string(), "urn:choco:git:2.45.1");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SCHEME: &str = "urn";

/// Separator between the segments of a reference, and between an id and a
/// trailing version segment.
pub const SEPARATOR: char = ':';

/// Errors produced while parsing a [`Urn`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UrnError {
    /// The text is not a well-formed `urn:<namespace>:<id>` reference.
    #[error("Malformed reference '{input}': {reason}")]
    Malformed {
        /// The text that failed to parse.
        input: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// An immutable, namespaced package reference.
///
/// Equality and hashing follow the serialized form, so two references are
/// equal exactly when their text forms are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Urn {
    namespace: String,
    id: String,
}

impl Urn {
    /// Create a reference from a namespace and an opaque id.
    ///
    /// # Errors
    ///
    /// Returns [`UrnError::Malformed`] if the namespace is not a token or the
    /// id is empty or contains whitespace.
    pub fn new(namespace: &str, id: &str) -> Result<Self, UrnError> {
        let display = format!("{SCHEME}{SEPARATOR}{namespace}{SEPARATOR}{id}");
        validate_namespace(namespace, &display)?;
        validate_id(id, &display)?;
        Ok(Self {
            namespace: namespace.to_string(),
            id: id.to_string(),
        })
    }

    /// Create a reference whose id carries a trailing version segment
    /// (`<id>:<version>`).
    ///
    /// # Errors
    ///
    /// Same as [`Urn::new`].
    pub fn with_version(namespace: &str, id: &str, version: &str) -> Result<Self, UrnError> {
        Self::new(namespace, &format!("{id}{SEPARATOR}{version}"))
    }

    /// Parse the text form `urn:<namespace>:<id>`.
    ///
    /// # Errors
    ///
    /// Returns [`UrnError::Malformed`] when the scheme is not exactly `urn`, the
    /// namespace is empty or not a token, or the id is empty.
    pub fn parse(input: &str) -> Result<Self, UrnError> {
        let malformed = |reason| UrnError::Malformed {
            input: input.to_string(),
            reason,
        };

        let mut parts = input.splitn(3, SEPARATOR);
        let scheme = parts.next().unwrap_or_default();
        if scheme != SCHEME {
            return Err(malformed("expected lowercase 'urn:' prefix"));
        }
        let namespace = parts.next().ok_or_else(|| malformed("missing namespace"))?;
        let id = parts.next().ok_or_else(|| malformed("missing id"))?;

        validate_namespace(namespace, input)?;
        validate_id(id, input)?;

        Ok(Self {
            namespace: namespace.to_string(),
            id: id.to_string(),
        })
    }

    /// The namespace identifying the owning handler.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The handler-specific id, including any version segment.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Split the id at its last separator into `(id, version)`.
    ///
    /// Addressing never interprets the result; handlers that encode a
    /// version in the id use this to recover it.
    pub fn split_version(&self) -> (&str, Option<&str>) {
        match self.id.rsplit_once(SEPARATOR) {
            Some((id, version)) if !id.is_empty() && !version.is_empty() => (id, Some(version)),
            _ => (&self.id, None),
        }
    }

    /// The trailing version segment, if the id has one.
    pub fn version(&self) -> Option<&str> {
        self.split_version().1
    }
}

fn validate_namespace(namespace: &str, input: &str) -> Result<(), UrnError> {
    let malformed = |reason| UrnError::Malformed {
        input: input.to_string(),
        reason,
    };

    if namespace.is_empty() {
        return Err(malformed("namespace is empty"));
    }
    if !namespace.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(malformed("namespace must start with a letter or digit"));
    }
    if !namespace
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(malformed("namespace may only contain letters, digits and '-'"));
    }
    Ok(())
}

fn validate_id(id: &str, input: &str) -> Result<(), UrnError> {
    if id.is_empty() {
        return Err(UrnError::Malformed {
            input: input.to_string(),
            reason: "id is empty",
        });
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(UrnError::Malformed {
            input: input.to_string(),
            reason: "id contains whitespace",
        });
    }
    Ok(())
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{SEPARATOR}{}{SEPARATOR}{}", self.namespace, self.id)
    }
}

impl FromStr for Urn {
    type Err = UrnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Urn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Urn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_store_reference() {
        let urn = Urn::parse("urn:msstore:9NBLGGH4R315").unwrap();
        assert_eq!(urn.namespace(), "msstore");
        assert_eq!(urn.id(), "9NBLGGH4R315");
        assert_eq!(urn.version(), None);
    }

    #[test]
    fn test_round_trip() {
        for s in [
            "urn:msstore:9NBLGGH4R315",
            "urn:choco:git:2.45.1",
            "urn:choco:vscode",
            "urn:my-source:a:b:c",
            "urn:X1:Mixed.Case_id",
            "urn:MSStore:9nblggh4r315",
        ] {
            assert_eq!(Urn::parse(s).unwrap().to_string(), s);
        }
        // Only the lowercase scheme is accepted, so no accepted text
        // prints back differently.
        assert!(Urn::parse("URN:msstore:9NBLGGH4R315").is_err());
    }

    #[test]
    fn test_split_version_uses_last_separator() {
        let urn = Urn::parse("urn:choco:a:b:1.0").unwrap();
        assert_eq!(urn.split_version(), ("a:b", Some("1.0")));

        let trailing = Urn::parse("urn:choco:git:").unwrap();
        assert_eq!(trailing.split_version(), ("git:", None));
    }

    #[test]
    fn test_scheme_must_be_lowercase() {
        for s in ["URN:msstore:9NBLGGH4R315", "Urn:choco:git:2.45.1"] {
            assert!(
                matches!(Urn::parse(s), Err(UrnError::Malformed { .. })),
                "{s:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_with_version() {
        let urn = Urn::with_version("choco", "git", "2.45.1").unwrap();
        assert_eq!(urn.to_string(), "urn:choco:git:2.45.1");
        assert_eq!(urn, Urn::parse("urn:choco:git:2.45.1").unwrap());
    }

    #[test]
    fn test_malformed_references() {
        for s in [
            "",
            "urn",
            "urn:",
            "urn:msstore",
            "urn::abc",
            "urn:msstore:",
            "uri:msstore:abc",
            "URN:msstore:abc",
            "urn:ms store:abc",
            "urn:-store:abc",
            "urn:msstore:has space",
        ] {
            assert!(
                matches!(Urn::parse(s), Err(UrnError::Malformed { .. })),
                "{s:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_serde_as_string() {
        let urn = Urn::parse("urn:msstore:9WZDNCRFJ3TJ").unwrap();
        let json = serde_json::to_string(&urn).unwrap();
        assert_eq!(json, "\"urn:msstore:9WZDNCRFJ3TJ\"");

        let back: Urn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, urn);
        assert!(serde_json::from_str::<Urn>("\"not-a-urn\"").is_err());
    }
}
