//! # Access Tiers
//!
//! Share balance gates what a holder can do in a creator's space. The
//! per-wallet cap grows slowly with the number of unique holders so early
//! buyers cannot corner the supply.

use std::fmt;

use crate::constants::{
    DEFAULT_CONTRIBUTOR_THRESHOLD, DEFAULT_CURATOR_THRESHOLD, DEFAULT_PARTNER_THRESHOLD,
    DEFAULT_WALLET_CAP_BASE, DEFAULT_WALLET_CAP_GROWTH_PPM, PPM_DENOMINATOR,
};
use crate::errors::{CoreResult, KeystoneCoreError};
use crate::math::{safe_add_u64, safe_mul_u64};

/// Ordered capability tier
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "client", serde(rename_all = "snake_case"))]
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessTier {
    #[default]
    Viewer,
    Contributor,
    Curator,
    Partner,
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessTier::Viewer => "viewer",
            AccessTier::Contributor => "contributor",
            AccessTier::Curator => "curator",
            AccessTier::Partner => "partner",
        };
        f.write_str(s)
    }
}

/// Capability flags unlocked by a tier
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Post, apply and DM
    pub can_post: bool,
    /// Tag, rank and earn curator rewards
    pub can_curate: bool,
    pub can_open_rooms: bool,
}

/// Minimum balances for each tier above Viewer
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierThresholds {
    pub contributor: u64,
    pub curator: u64,
    pub partner: u64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            contributor: DEFAULT_CONTRIBUTOR_THRESHOLD,
            curator: DEFAULT_CURATOR_THRESHOLD,
            partner: DEFAULT_PARTNER_THRESHOLD,
        }
    }
}

impl TierThresholds {
    pub fn validate(&self) -> CoreResult<()> {
        if self.contributor == 0 || self.contributor >= self.curator || self.curator >= self.partner {
            return Err(KeystoneCoreError::InvalidTierThresholds);
        }
        Ok(())
    }
}

/// `cap(H) = floor(base + growth_ppm * H / 10^6)`
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalletCapParams {
    pub base: u64,
    pub growth_ppm: u64,
}

impl Default for WalletCapParams {
    fn default() -> Self {
        Self {
            base: DEFAULT_WALLET_CAP_BASE,
            growth_ppm: DEFAULT_WALLET_CAP_GROWTH_PPM,
        }
    }
}

impl WalletCapParams {
    pub fn validate(&self) -> CoreResult<()> {
        if self.base == 0 {
            return Err(KeystoneCoreError::InvalidParameter("wallet cap base must be positive"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessTierResolver {
    thresholds: TierThresholds,
    cap: WalletCapParams,
}

impl AccessTierResolver {
    pub fn new(thresholds: TierThresholds, cap: WalletCapParams) -> CoreResult<Self> {
        thresholds.validate()?;
        cap.validate()?;
        Ok(Self { thresholds, cap })
    }

    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }

    /// Highest tier whose threshold the balance meets
    pub fn resolve_tier(&self, balance: u64) -> AccessTier {
        if balance >= self.thresholds.partner {
            AccessTier::Partner
        } else if balance >= self.thresholds.curator {
            AccessTier::Curator
        } else if balance >= self.thresholds.contributor {
            AccessTier::Contributor
        } else {
            AccessTier::Viewer
        }
    }

    pub fn capabilities(&self, tier: AccessTier) -> Capabilities {
        Capabilities {
            can_post: tier >= AccessTier::Contributor,
            can_curate: tier >= AccessTier::Curator,
            can_open_rooms: tier >= AccessTier::Partner,
        }
    }

    /// Largest balance one wallet may hold at `unique_holders`
    pub fn dynamic_cap(&self, unique_holders: u64) -> CoreResult<u64> {
        let growth = safe_mul_u64(self.cap.growth_ppm, unique_holders)? / PPM_DENOMINATOR;
        safe_add_u64(self.cap.base, growth)
    }

    /// Reject a purchase that would lift the balance above the cap
    pub fn check_purchase(&self, current_balance: u64, desired: u64, unique_holders: u64) -> CoreResult<u64> {
        let cap = self.dynamic_cap(unique_holders)?;
        let attempted = safe_add_u64(current_balance, desired)?;
        if attempted > cap {
            return Err(KeystoneCoreError::wallet_cap(cap, attempted));
        }
        Ok(cap)
    }
}
