// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Hash function selection for ring placement.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::Error;

/// The hash function used to place servers and keys on the ring.
///
/// Only strong, uniformly distributing hashes can back a consistent hash ring. [`HashMode::Modulo`]
/// is recognized so that configuration files naming it fail loudly at build time instead of
/// silently falling back to another mode.
///
/// # Examples
///
/// ```
/// use weighted_ring::HashMode;
///
/// let mode: HashMode = "xxh3".parse().unwrap();
/// assert_eq!(mode, HashMode::Xxh3);
/// assert!(mode.is_supported());
/// assert!(!HashMode::Modulo.is_supported());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[non_exhaustive]
pub enum HashMode {
    /// 128-bit XXH3 for point placement, 64-bit XXH3 for keys.
    #[default]
    Xxh3,

    /// Plain `hash % server_count` placement. Not a consistent hash; rejected by the ring.
    Modulo,
}

impl HashMode {
    /// Returns `true` if a ring can be built with this mode.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::Xxh3)
    }

    /// Returns the configuration name of this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xxh3 => "xxh3",
            Self::Modulo => "modulo",
        }
    }
}

impl Display for HashMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xxh3" => Ok(Self::Xxh3),
            "modulo" => Ok(Self::Modulo),
            _ => Err(Error::UnknownHashMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("XXH3".parse::<HashMode>(), Ok(HashMode::Xxh3));
        assert_eq!(" modulo ".parse::<HashMode>(), Ok(HashMode::Modulo));
    }

    #[test]
    fn parse_rejects_unknown_names() {
        assert_eq!("md5".parse::<HashMode>(), Err(Error::UnknownHashMode("md5".to_string())));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for mode in [HashMode::Xxh3, HashMode::Modulo] {
            assert_eq!(mode.to_string().parse::<HashMode>(), Ok(mode));
        }
    }

    #[test]
    fn default_is_supported() {
        assert!(HashMode::default().is_supported());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&HashMode::Xxh3).expect("serialize");
        assert_eq!(json, "\"xxh3\"");
        let mode: HashMode = serde_json::from_str("\"modulo\"").expect("deserialize");
        assert_eq!(mode, HashMode::Modulo);
    }
}
