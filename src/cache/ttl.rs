//! TTL Policy Module
//!
//! Named TTL tiers mapped to second counts.

use serde::{Deserialize, Serialize};

// == TTL Tier ==
/// Named TTL classes used by callers instead of raw second counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlTier {
    Short,
    #[default]
    Medium,
    Long,
    Day,
}

impl TtlTier {
    /// Resolves a tier name. Unknown names resolve to `Medium`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "short" => TtlTier::Short,
            "long" => TtlTier::Long,
            "day" => TtlTier::Day,
            _ => TtlTier::Medium,
        }
    }
}

// == TTL Policy ==
/// Second counts for each [`TtlTier`], fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TtlPolicy {
    pub short: u64,
    pub medium: u64,
    pub long: u64,
    pub day: u64,
}

impl TtlPolicy {
    pub fn new(short: u64, medium: u64, long: u64, day: u64) -> Self {
        Self {
            short,
            medium,
            long,
            day,
        }
    }

    /// Returns the second count for a tier.
    pub fn seconds(&self, tier: TtlTier) -> u64 {
        match tier {
            TtlTier::Short => self.short,
            TtlTier::Medium => self.medium,
            TtlTier::Long => self.long,
            TtlTier::Day => self.day,
        }
    }

    /// Returns the second count for a tier name; omitted or unknown names use `medium`.
    pub fn ttl_value(&self, tier: Option<&str>) -> u64 {
        self.seconds(tier.map(TtlTier::from_name).unwrap_or_default())
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(300, 1800, 7200, 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.seconds(TtlTier::Short), 300);
        assert_eq!(policy.seconds(TtlTier::Medium), 1800);
        assert_eq!(policy.seconds(TtlTier::Long), 7200);
        assert_eq!(policy.seconds(TtlTier::Day), 86400);
    }

    #[test]
    fn test_unknown_tier_resolves_to_medium() {
        let policy = TtlPolicy::new(1, 2, 3, 4);
        assert_eq!(policy.ttl_value(Some("weekly")), 2);
        assert_eq!(policy.ttl_value(None), 2);
        assert_eq!(policy.ttl_value(Some("LONG")), 3);
        assert_eq!(policy.ttl_value(Some(" day ")), 4);
    }

    #[test]
    fn test_tier_deserialize() {
        let tier: TtlTier = serde_json::from_str(r#""short""#).unwrap();
        assert_eq!(tier, TtlTier::Short);
    }
}
