//! Strongly-typed identifiers for cloud.dk resources.
//!
//! cloud.dk identifiers are opaque strings assigned by the API. Wrapping them per
//! resource keeps a disk identifier from being passed where a server is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Macro to generate strongly-typed identifier wrapper types.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $doc:expr) => {
        $(#[$meta])*
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier, rejecting empty or blank input.
            ///
            /// # Errors
            ///
            /// Returns an error if the identifier is empty.
            pub fn parse_str(input: &str) -> Result<Self> {
                let trimmed = input.trim();
                if trimmed.is_empty() {
                    return Err(Error::InvalidRequest(format!(
                        "{} must not be empty",
                        stringify!($name)
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Converts into the inner string.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse_str(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::parse_str(&value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_type!(ServerId, "Cloud server identifier.");
id_type!(DiskId, "Disk identifier, scoped to a server.");
id_type!(NetworkInterfaceId, "Network interface identifier, scoped to a server.");
id_type!(FirewallRuleId, "Firewall rule identifier, scoped to a network interface.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let id = ServerId::parse_str("  a1b2c3  ").unwrap();
        assert_eq!(id.as_str(), "a1b2c3");
        assert_eq!(id.to_string(), "a1b2c3");
    }

    #[test]
    fn test_parse_rejects_blank() {
        let err = DiskId::parse_str("   ").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(err.to_string().contains("DiskId"));
    }

    #[test]
    fn test_from_str() {
        let id: FirewallRuleId = "rule-7".parse().unwrap();
        assert_eq!(id.into_string(), "rule-7");
    }

    #[test]
    fn test_serde_transparent() {
        let id = NetworkInterfaceId::parse_str("nic-1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"nic-1\"");

        let back: NetworkInterfaceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_deserialize_rejects_blank() {
        let err = serde_json::from_str::<ServerId>("\"  \"").unwrap_err();
        assert!(err.to_string().contains("ServerId must not be empty"));

        let trimmed: DiskId = serde_json::from_str("\" d1 \"").unwrap();
        assert_eq!(trimmed.as_str(), "d1");
    }
}
