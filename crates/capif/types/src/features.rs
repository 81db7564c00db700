//! Supported-features bitmask
//!
//! A features string is a hexadecimal number. Each character encodes four
//! feature bits, the rightmost character holds features 1-4 and characters
//! further left hold higher-numbered features. Strings of different length
//! are compared right-aligned, so a shorter string advertises nothing in the
//! nibbles it does not spell out.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Invalid features string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid supported features '{value}': expected hexadecimal digits")]
pub struct FeaturesError {
    pub value: String,
}

/// Hexadecimal supported-features bitmask
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SupportedFeatures(String);

impl SupportedFeatures {
    pub fn parse(value: impl Into<String>) -> Result<Self, FeaturesError> {
        let value = value.into();
        if value.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(value))
        } else {
            Err(FeaturesError { value })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no feature bit is set
    pub fn is_empty(&self) -> bool {
        self.nibbles().iter().all(|n| *n == 0)
    }

    /// Nibbles, most significant first
    fn nibbles(&self) -> Vec<u8> {
        self.0
            .chars()
            .filter_map(|c| c.to_digit(16))
            .map(|d| d as u8)
            .collect()
    }

    /// Check whether every feature in `requested` is advertised by `self`.
    ///
    /// Nibbles are compared most significant first. A requested bit that
    /// falls outside the advertised string counts as not advertised.
    pub fn covers(&self, requested: &SupportedFeatures) -> bool {
        let advertised = self.nibbles();
        let wanted = requested.nibbles();
        let width = advertised.len().max(wanted.len());

        (0..width).all(|pos| {
            let have = nibble_at(&advertised, width, pos);
            let want = nibble_at(&wanted, width, pos);
            want & !have == 0
        })
    }
}

/// Nibble `pos` of a right-aligned view `width` nibbles wide
fn nibble_at(nibbles: &[u8], width: usize, pos: usize) -> u8 {
    let pad = width - nibbles.len();
    if pos < pad {
        0
    } else {
        nibbles[pos - pad]
    }
}

impl FromStr for SupportedFeatures {
    type Err = FeaturesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SupportedFeatures {
    type Error = FeaturesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SupportedFeatures> for String {
    fn from(features: SupportedFeatures) -> Self {
        features.0
    }
}

impl fmt::Display for SupportedFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn features(s: &str) -> SupportedFeatures {
        SupportedFeatures::parse(s).unwrap()
    }

    #[test]
    fn test_rejects_non_hex() {
        assert!(SupportedFeatures::parse("0g").is_err());
        assert!(SupportedFeatures::parse("").is_ok());
        assert!(serde_json::from_str::<SupportedFeatures>("\"xyz\"").is_err());
    }

    #[test]
    fn test_covers_subset() {
        assert!(features("F").covers(&features("1")));
        assert!(features("3").covers(&features("3")));
        assert!(features("0A").covers(&features("8")));
        assert!(!features("2").covers(&features("1")));
    }

    #[test]
    fn test_shorter_advertised_string_excludes_high_features() {
        assert!(!features("F").covers(&features("10")));
        assert!(!features("FF").covers(&features("100")));
    }

    #[test]
    fn test_zero_padding_is_not_a_request() {
        assert!(features("1").covers(&features("0001")));
        assert!(features("1").covers(&features("")));
    }

    #[test]
    fn test_is_empty() {
        assert!(features("000").is_empty());
        assert!(!features("010").is_empty());
    }

    proptest! {
        #[test]
        fn property_every_mask_covers_itself(mask in "[0-9A-F]{0,8}") {
            let f = features(&mask);
            prop_assert!(f.covers(&f));
        }

        #[test]
        fn property_all_ones_covers_narrower_masks(mask in "[0-9a-f]{1,8}") {
            let full = features(&"F".repeat(mask.len()));
            prop_assert!(full.covers(&features(&mask)));
        }

        #[test]
        fn property_leading_nibble_beyond_advertised_is_rejected(
            mask in "[0-9A-F]{1,6}",
            lead in "[1-9A-F]",
        ) {
            let requested = features(&format!("{}{}", lead, mask));
            prop_assert!(!features(&mask).covers(&requested));
        }
    }
}
