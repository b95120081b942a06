//! Item model: types, quality tiers, and combat capability.
//!
//! An [`Item`] is a single instance with a stable [`ItemId`]. All
//! interchangeable copies share an [`ItemTypeId`], which is the only
//! identifier that survives across host sessions. Quantities that feed
//! scoring or mass comparisons use [`Decimal`] -- no floating point.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::ItemId;

/// Stable identifier shared by all interchangeable copies of an item.
///
/// Unlike [`ItemId`], type identifiers are stable across sessions and
/// are the only item reference that may be persisted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemTypeId(pub String);

impl ItemTypeId {
    /// Return the type identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ItemTypeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemTypeId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for ItemTypeId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Combat capability classification of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// The item attacks at a distance.
    Ranged,
    /// The item attacks in close quarters.
    Melee,
}

/// Quality tier of an item instance, from 0 (worst) to 7 (best).
///
/// Quality applies a small multiplicative bonus to the item's score:
/// tier 0 scores at x0.90, each tier adds 0.05, tier 7 scores at x1.25.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityTier(u8);

impl QualityTier {
    /// The highest quality tier.
    pub const MAX: Self = Self(7);

    /// Create a quality tier, clamping values above the maximum.
    pub const fn new(tier: u8) -> Self {
        if tier > Self::MAX.0 {
            Self::MAX
        } else {
            Self(tier)
        }
    }

    /// Return the raw tier value (0..=7).
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Multiplicative score bonus for this tier: `0.90 + 0.05 * tier`.
    pub fn score_multiplier(self) -> Decimal {
        let steps = i64::from(self.0.min(Self::MAX.0));
        let hundredths = steps.checked_mul(5).and_then(|v| v.checked_add(90)).unwrap_or(90);
        Decimal::new(hundredths, 2)
    }
}

impl Default for QualityTier {
    fn default() -> Self {
        Self(2)
    }
}

/// A single item instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable instance identity.
    pub id: ItemId,

    /// The type shared by all interchangeable copies.
    pub type_id: ItemTypeId,

    /// Ranged or melee classification.
    pub capability: Capability,

    /// Quality tier (0..=7).
    pub quality: QualityTier,

    /// Mass, counted against the owner's mass budget.
    pub mass: Decimal,

    /// Raw market value, used as a coarse proxy score when the stat
    /// computation cannot produce a throughput estimate.
    pub market_value: Decimal,

    /// Damage dealt by a single attack.
    pub damage_per_hit: Decimal,

    /// Ticks between attacks. Zero means the item cannot attack.
    pub ticks_per_attack: u32,

    /// Minimum wielder body size required to use the item at all.
    pub min_wielder_size: Decimal,
}
