//! # Fee Routing
//!
//! Every trade's cost splits four ways in basis points. Flooring dust lands
//! in the reserve so the parts always add back up to the cost.

use crate::constants::{
    DEFAULT_BUYBACK_BPS, DEFAULT_COMMUNITY_BPS, DEFAULT_REFERRAL_BPS, DEFAULT_RESERVE_BPS, MAX_BPS,
};
use crate::errors::{CoreResult, KeystoneCoreError};
use crate::math::{safe_add_u128, safe_calculate_bps, safe_sub_u128};
use crate::types::UserId;

/// Basis point routing of trade cost
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeSchedule {
    pub referral_bps: u16,
    pub buyback_bps: u16,
    pub community_bps: u16,
    pub reserve_bps: u16,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            referral_bps: DEFAULT_REFERRAL_BPS,
            buyback_bps: DEFAULT_BUYBACK_BPS,
            community_bps: DEFAULT_COMMUNITY_BPS,
            reserve_bps: DEFAULT_RESERVE_BPS,
        }
    }
}

impl FeeSchedule {
    pub fn total_bps(&self) -> u32 {
        self.referral_bps as u32
            + self.buyback_bps as u32
            + self.community_bps as u32
            + self.reserve_bps as u32
    }

    pub fn validate(&self) -> CoreResult<()> {
        let total_bps = self.total_bps();
        if total_bps != MAX_BPS as u32 {
            return Err(KeystoneCoreError::InvalidFeeSchedule { total_bps });
        }
        Ok(())
    }

    /// Split `total` by the schedule
    pub fn split(&self, total: u128) -> CoreResult<FeeSplit> {
        let referral = safe_calculate_bps(total, self.referral_bps)?;
        let buyback = safe_calculate_bps(total, self.buyback_bps)?;
        let community = safe_calculate_bps(total, self.community_bps)?;
        let routed = safe_add_u128(safe_add_u128(referral, buyback)?, community)?;
        let reserve = safe_sub_u128(total, routed)?;

        Ok(FeeSplit {
            referral,
            buyback,
            community,
            reserve,
        })
    }
}

/// Where the referral layer goes for one trade
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferralRoute {
    Referrer(UserId),
    Community,
}

impl ReferralRoute {
    pub fn from_referrer(referrer: Option<UserId>) -> Self {
        match referrer {
            Some(user) => ReferralRoute::Referrer(user),
            None => ReferralRoute::Community,
        }
    }
}

/// Four-way allocation of a trade's cost
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeSplit {
    pub referral: u128,
    pub buyback: u128,
    pub community: u128,
    pub reserve: u128,
}

impl FeeSplit {
    pub fn total(&self) -> u128 {
        self.referral + self.buyback + self.community + self.reserve
    }

    /// Fold the referral layer into community when nobody referred the trade
    pub fn routed(self, route: &ReferralRoute) -> CoreResult<FeeSplit> {
        match route {
            ReferralRoute::Referrer(_) => Ok(self),
            ReferralRoute::Community => Ok(FeeSplit {
                referral: 0,
                community: safe_add_u128(self.community, self.referral)?,
                ..self
            }),
        }
    }
}
