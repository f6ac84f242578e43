//! Core key types for the playback engine.
//!
//! These types provide strongly-typed identifiers for frames and their
//! cache entries:
//! - `ProductKind`: Radar product family (e.g., reflectivity)
//! - `ProductCode`: Sub-classification within a multi-code family
//! - `TimePrefix`: Timestamped file prefix identifying one volume
//! - `FrameKey`: Identifies one renderable frame (product + code + prefix + tilt)
//! - `PrefixKey`: Tilt-agnostic identity used for cache eviction
//!
//! ## Frame Key Derivation
//!
//! The remote store names frame assets `{prefix}_{product}_idx{tilt}`, with
//! a `.png` image and a `.json` metadata document per name. `FrameKey`
//! reproduces that naming via `to_fetch_key()`.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Radar product families available for display.
///
/// The single-code family (reflectivity) addresses frames directly; the
/// multi-code families partition their time sequence by a user-selected
/// `ProductCode`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    #[default]
    Reflectivity,
    Hydrometeor,
    Precipitation,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Reflectivity => "reflectivity",
            ProductKind::Hydrometeor => "hydrometeor",
            ProductKind::Precipitation => "precipitation",
        }
    }

    pub fn label(&self) -> &'static str {
        self.as_str()
    }

    pub fn all() -> &'static [ProductKind] {
        &[
            ProductKind::Reflectivity,
            ProductKind::Hydrometeor,
            ProductKind::Precipitation,
        ]
    }

    /// Data level the product is served from ("2" or "3").
    ///
    /// Level 2 products have a single implicit code; level 3 products
    /// require a code selection before frames are addressable.
    pub fn level(&self) -> &'static str {
        match self {
            ProductKind::Reflectivity => "2",
            ProductKind::Hydrometeor | ProductKind::Precipitation => "3",
        }
    }

    /// Whether this product belongs to the single-code family.
    pub fn is_single_code(&self) -> bool {
        self.level() == "2"
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sub-classification within a multi-code product family (e.g., a radar
/// site/volume identifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductCode(pub String);

impl ProductCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Fixed placeholder code for the single-code family.
    ///
    /// Never surfaced to hosts; it only keeps `FrameKey` uniform across
    /// product families.
    pub fn sentinel() -> Self {
        Self("-".to_string())
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == "-"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProductCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Timestamped file prefix identifying one volume within a product's
/// time sequence.
///
/// Prefixes follow the `SITEYYYYMMDD_HHMMSS` convention, optionally with a
/// trailing `_CODE` segment for multi-code products (e.g.,
/// `KDMX20240501_120000` or `KDMX20240501_120000_DAA`). Lexicographic order
/// of prefixes is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimePrefix(pub String);

impl TimePrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this prefix carries the given code as its trailing segment.
    pub fn matches_code(&self, code: &ProductCode) -> bool {
        self.0
            .rsplit('_')
            .next()
            .is_some_and(|last| last == code.as_str())
    }

    /// Date digits (`YYYYMMDD`) parsed out of the prefix, skipping the
    /// 4-character site identifier.
    pub fn date_part(&self) -> Option<&str> {
        let head = self.0.split('_').next()?;
        head.get(4..12)
    }

    fn time_part(&self) -> Option<&str> {
        let part = self.0.split('_').nth(1)?;
        if part.len() == 6 && part.bytes().all(|b| b.is_ascii_digit()) {
            Some(part)
        } else {
            None
        }
    }

    /// Parse the prefix timestamp into a UTC-naive datetime.
    pub fn parse_datetime(&self) -> Option<NaiveDateTime> {
        let date = self.date_part()?;
        let time = self.time_part()?;
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y%m%d %H%M%S").ok()
    }

    /// Short `H:MM` label for timeline ticks.
    pub fn time_label(&self) -> Option<String> {
        let time = self.time_part()?;
        let hour: u32 = time.get(0..2)?.parse().ok()?;
        let minute = time.get(2..4)?;
        Some(format!("{}:{}", hour, minute))
    }
}

impl fmt::Display for TimePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TimePrefix {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unix timestamp in milliseconds.
///
/// Using milliseconds provides sub-second precision for debounce timers and
/// animation periods while staying cheap to compare and copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixMillis(pub i64);

impl UnixMillis {
    pub fn now() -> Self {
        let duration = web_time::SystemTime::now()
            .duration_since(web_time::UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs * 1000)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn plus_millis(&self, millis: i64) -> Self {
        Self(self.0 + millis)
    }
}

impl fmt::Display for UnixMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one renderable frame.
///
/// A frame is uniquely addressed by product family, code, time prefix, and
/// tilt (elevation sweep) index. Both the image cache and the metadata
/// cache key their entries by this identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub product: ProductKind,
    pub code: ProductCode,
    pub prefix: TimePrefix,
    /// Elevation sweep index within the volume (0-based).
    pub tilt: usize,
}

impl FrameKey {
    pub fn new(product: ProductKind, code: ProductCode, prefix: TimePrefix, tilt: usize) -> Self {
        Self {
            product,
            code,
            prefix,
            tilt,
        }
    }

    /// Remote asset name for this frame: `{prefix}_{product}_idx{tilt}`.
    ///
    /// The service appends `.png` / `.json` for the image and metadata
    /// documents respectively.
    pub fn to_fetch_key(&self) -> String {
        format!("{}_{}_idx{}", self.prefix, self.product.as_str(), self.tilt)
    }

    /// Tilt-agnostic identity used for prefix-level cache eviction.
    pub fn prefix_key(&self) -> PrefixKey {
        PrefixKey {
            product: self.product,
            code: self.code.clone(),
            prefix: self.prefix.clone(),
        }
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fetch_key())
    }
}

/// Prefix-level identity: product + code + time prefix, ignoring tilt.
///
/// Cache eviction operates at this granularity so every tilt of a stale
/// volume is purged together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefixKey {
    pub product: ProductKind,
    pub code: ProductCode,
    pub prefix: TimePrefix,
}

impl fmt::Display for PrefixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.product, self.code, self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_key_format() {
        let key = FrameKey::new(
            ProductKind::Reflectivity,
            ProductCode::sentinel(),
            TimePrefix::from("KDMX20240501_120000"),
            3,
        );
        assert_eq!(key.to_fetch_key(), "KDMX20240501_120000_reflectivity_idx3");
    }

    #[test]
    fn test_prefix_key_ignores_tilt() {
        let a = FrameKey::new(
            ProductKind::Hydrometeor,
            ProductCode::from("DAA"),
            TimePrefix::from("KDMX20240501_120000_DAA"),
            0,
        );
        let b = FrameKey::new(
            ProductKind::Hydrometeor,
            ProductCode::from("DAA"),
            TimePrefix::from("KDMX20240501_120000_DAA"),
            4,
        );
        assert_eq!(a.prefix_key(), b.prefix_key());
        assert_eq!(
            a.prefix_key().to_string(),
            "hydrometeor|DAA|KDMX20240501_120000_DAA"
        );
    }

    #[test]
    fn test_prefix_code_matching() {
        let prefix = TimePrefix::from("KDMX20240501_120000_DAA");
        assert!(prefix.matches_code(&ProductCode::from("DAA")));
        assert!(!prefix.matches_code(&ProductCode::from("N0H")));
    }

    #[test]
    fn test_prefix_datetime_parsing() {
        let prefix = TimePrefix::from("KDMX20240501_235957");
        let parsed = prefix.parse_datetime().unwrap();
        assert_eq!(
            parsed.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-05-01 23:59:57"
        );
        assert_eq!(prefix.date_part(), Some("20240501"));
        assert_eq!(prefix.time_label(), Some("23:59".to_string()));
    }

    #[test]
    fn test_time_label_strips_leading_zero() {
        let prefix = TimePrefix::from("KDMX20240501_051200");
        assert_eq!(prefix.time_label(), Some("5:12".to_string()));
    }

    #[test]
    fn test_malformed_prefix_has_no_timestamp() {
        assert!(TimePrefix::from("garbage").parse_datetime().is_none());
        assert!(TimePrefix::from("KDMX20240501").time_label().is_none());
    }

    #[test]
    fn test_product_levels() {
        assert!(ProductKind::Reflectivity.is_single_code());
        assert!(!ProductKind::Precipitation.is_single_code());
        assert_eq!(ProductKind::Hydrometeor.level(), "3");
    }

    #[test]
    fn test_sentinel_code() {
        assert!(ProductCode::sentinel().is_sentinel());
        assert!(!ProductCode::from("DAA").is_sentinel());
    }
}
