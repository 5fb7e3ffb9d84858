//! CAIP-2 network identifiers and wildcard patterns.
//!
//! A network is identified by a [CAIP-2](https://standards.chainagnostic.org/CAIPs/caip-2)
//! string of the form `namespace:reference`, for example `eip155:8453` or
//! `solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp`. Registries additionally accept
//! [`NetworkPattern`]s containing a single `*` wildcard (e.g. `eip155:*`) so a
//! handler can be registered once for a whole network family.
//!
//! # Examples
//!
//! ```
//! use x402_types::network::{Network, NetworkPattern};
//!
//! let base: Network = "eip155:8453".parse().unwrap();
//! assert_eq!(base.namespace(), "eip155");
//! assert_eq!(base.reference(), "8453");
//!
//! let evm: NetworkPattern = "eip155:*".parse().unwrap();
//! assert!(evm.matches(&base));
//! ```

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static NETWORK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+:[a-zA-Z0-9-]+$").expect("valid regex"));

/// A validated CAIP-2 network identifier.
///
/// Contains exactly one colon separating a lowercase namespace from a
/// chain-specific reference. Serializes to/from the plain string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Network(String);

impl Network {
    /// Returns the namespace component (e.g. `eip155`).
    pub fn namespace(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// Returns the reference component (e.g. `8453`).
    pub fn reference(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    /// Returns the full identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when parsing an invalid network identifier or pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// The string is not a valid `namespace:reference` CAIP-2 identifier.
    #[error("Invalid network identifier `{0}`: expected `namespace:reference`")]
    InvalidFormat(String),
    /// A pattern contained more than one `*` wildcard.
    #[error("Invalid network pattern `{0}`: at most one `*` wildcard is allowed")]
    MultipleWildcards(String),
}

impl FromStr for Network {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.matches(':').count() != 1 || !NETWORK_RE.is_match(s) {
            return Err(NetworkError::InvalidFormat(s.to_string()));
        }
        Ok(Network(s.to_string()))
    }
}

impl TryFrom<&str> for Network {
    type Error = NetworkError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Network> for String {
    fn from(value: Network) -> Self {
        value.0
    }
}

impl Serialize for Network {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Network::from_str(&s).map_err(de::Error::custom)
    }
}

/// A network matcher: either an exact CAIP-2 identifier or a glob with a
/// single `*` wildcard segment.
///
/// The glob is compiled into an anchored regex (`^prefix.*suffix$`) once at
/// parse time. Patterns with more than one `*` are rejected at parse time:
/// such a registration is a programming error and would never match the
/// traffic the caller expects.
#[derive(Debug, Clone)]
pub struct NetworkPattern {
    raw: String,
    // None means the pattern is an exact network identifier.
    glob: Option<Regex>,
}

impl NetworkPattern {
    /// Returns `true` when this pattern is an exact identifier, not a glob.
    pub fn is_exact(&self) -> bool {
        self.glob.is_none()
    }

    /// Returns the original pattern string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Checks whether a concrete network matches this pattern.
    pub fn matches(&self, network: &Network) -> bool {
        match &self.glob {
            None => self.raw == network.as_str(),
            Some(re) => re.is_match(network.as_str()),
        }
    }
}

impl PartialEq for NetworkPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for NetworkPattern {}

impl fmt::Display for NetworkPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for NetworkPattern {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.matches('*').count() {
            0 => {
                // Exact patterns must be valid network identifiers themselves.
                let network: Network = s.parse()?;
                Ok(NetworkPattern {
                    raw: network.0,
                    glob: None,
                })
            }
            1 => {
                let (prefix, suffix) = s.split_once('*').expect("one wildcard present");
                if !s.contains(':') {
                    return Err(NetworkError::InvalidFormat(s.to_string()));
                }
                let re = Regex::new(&format!(
                    "^{}.*{}$",
                    regex::escape(prefix),
                    regex::escape(suffix)
                ))
                .map_err(|_| NetworkError::InvalidFormat(s.to_string()))?;
                Ok(NetworkPattern {
                    raw: s.to_string(),
                    glob: Some(re),
                })
            }
            _ => Err(NetworkError::MultipleWildcards(s.to_string())),
        }
    }
}

impl From<Network> for NetworkPattern {
    fn from(network: Network) -> Self {
        NetworkPattern {
            raw: network.0,
            glob: None,
        }
    }
}

impl Serialize for NetworkPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for NetworkPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NetworkPattern::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parse() {
        let network: Network = "eip155:8453".parse().unwrap();
        assert_eq!(network.namespace(), "eip155");
        assert_eq!(network.reference(), "8453");
        assert_eq!(network.to_string(), "eip155:8453");
    }

    #[test]
    fn test_network_parse_solana() {
        let network: Network = "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp".parse().unwrap();
        assert_eq!(network.namespace(), "solana");
        assert_eq!(network.reference(), "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp");
    }

    #[test]
    fn test_network_rejects_missing_colon() {
        assert!("eip155".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_rejects_two_colons() {
        assert!("eip155:8453:extra".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_rejects_uppercase_namespace() {
        assert!("EIP155:8453".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_serde_roundtrip() {
        let original: Network = "eip155:137".parse().unwrap();
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, "\"eip155:137\"");
        let back: Network = serde_json::from_str(&json).unwrap();
        assert_eq!(original, back);
    }

    #[test]
    fn test_pattern_exact_matches() {
        let pattern: NetworkPattern = "eip155:8453".parse().unwrap();
        assert!(pattern.is_exact());
        assert!(pattern.matches(&"eip155:8453".parse().unwrap()));
        assert!(!pattern.matches(&"eip155:137".parse().unwrap()));
    }

    #[test]
    fn test_pattern_wildcard_matches() {
        let pattern: NetworkPattern = "eip155:*".parse().unwrap();
        assert!(!pattern.is_exact());
        assert!(pattern.matches(&"eip155:8453".parse().unwrap()));
        assert!(pattern.matches(&"eip155:1".parse().unwrap()));
        assert!(!pattern.matches(&"solana:mainnet".parse().unwrap()));
    }

    #[test]
    fn test_pattern_rejects_multiple_wildcards() {
        let err = "eip155:*:*".parse::<NetworkPattern>().unwrap_err();
        assert!(matches!(err, NetworkError::MultipleWildcards(_)));
    }

    #[test]
    fn test_pattern_rejects_bare_wildcard() {
        assert!("*".parse::<NetworkPattern>().is_err());
    }
}
