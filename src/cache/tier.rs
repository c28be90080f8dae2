//! Tier Policies
//!
//! Named TTL policies and the immutable registry resolving tier names on
//! every cache operation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Tier Policy
// =============================================================================

/// A named expiration policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Tier name used in keys, stats, and the admin API
    pub name: String,
    /// Entry lifetime in seconds
    pub ttl_seconds: i64,
    /// Human-readable description for stats output
    pub description: String,
}

impl TierPolicy {
    pub fn new(
        name: impl Into<String>,
        ttl_seconds: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ttl_seconds,
            description: description.into(),
        }
    }
}

// =============================================================================
// Tier Registry
// =============================================================================

/// Fixed set of tier policies, validated at construction
#[derive(Debug, Clone)]
pub struct TierRegistry {
    tiers: BTreeMap<String, TierPolicy>,
}

impl TierRegistry {
    /// Build a registry from a list of policies.
    ///
    /// Rejects empty registries, duplicate names, empty names, and
    /// non-positive TTLs.
    pub fn new(policies: Vec<TierPolicy>) -> Result<Self> {
        if policies.is_empty() {
            return Err(Error::Configuration(
                "tier registry must define at least one tier".to_string(),
            ));
        }

        let mut tiers = BTreeMap::new();
        for policy in policies {
            if policy.name.is_empty() {
                return Err(Error::Configuration("tier name must not be empty".to_string()));
            }
            if policy.ttl_seconds <= 0 {
                return Err(Error::Configuration(format!(
                    "tier '{}' has non-positive TTL {}",
                    policy.name, policy.ttl_seconds
                )));
            }
            if tiers.insert(policy.name.clone(), policy).is_some() {
                return Err(Error::Configuration("duplicate tier name".to_string()));
            }
        }

        Ok(Self { tiers })
    }

    /// Resolve a tier name to its policy
    pub fn resolve(&self, name: &str) -> Result<&TierPolicy> {
        self.tiers.get(name).ok_or_else(|| Error::UnknownTier {
            tier: name.to_string(),
        })
    }

    /// Check whether a tier name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tiers.contains_key(name)
    }

    /// Iterate policies in name order
    pub fn policies(&self) -> impl Iterator<Item = &TierPolicy> {
        self.tiers.values()
    }

    /// Number of registered tiers
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl Default for TierRegistry {
    /// The stock short/medium/long registry
    fn default() -> Self {
        Self::new(vec![
            TierPolicy::new("short", 3600, "Frequently changing data (weather, real-time)"),
            TierPolicy::new("medium", 86_400, "Daily data (rates, forecasts)"),
            TierPolicy::new("long", 2_592_000, "Stable data (solar resource, geocoding)"),
        ])
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_registry() {
        let registry = TierRegistry::default();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.resolve("short").unwrap().ttl_seconds, 3600);
        assert_eq!(registry.resolve("medium").unwrap().ttl_seconds, 86_400);
        assert_eq!(registry.resolve("long").unwrap().ttl_seconds, 2_592_000);
    }

    #[test]
    fn test_unknown_tier() {
        let registry = TierRegistry::default();
        assert_matches!(registry.resolve("weekly"), Err(Error::UnknownTier { .. }));
        assert!(!registry.contains("weekly"));
    }

    #[test]
    fn test_rejects_invalid_registries() {
        assert_matches!(TierRegistry::new(vec![]), Err(Error::Configuration(_)));

        assert_matches!(
            TierRegistry::new(vec![TierPolicy::new("bad", 0, "zero ttl")]),
            Err(Error::Configuration(_))
        );

        assert_matches!(
            TierRegistry::new(vec![
                TierPolicy::new("dup", 60, "a"),
                TierPolicy::new("dup", 120, "b"),
            ]),
            Err(Error::Configuration(_))
        );
    }

    #[test]
    fn test_custom_registry() {
        let registry = TierRegistry::new(vec![
            TierPolicy::new("session", 900, "Per-session scratch data"),
            TierPolicy::new("archive", 7 * 86_400, "Weekly archives"),
        ])
        .unwrap();
        assert_eq!(registry.len(), 2);
        let names: Vec<&str> = registry.policies().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["archive", "session"]);
    }
}
