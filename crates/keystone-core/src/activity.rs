//! # Activity Score
//!
//! Reputation that decays toward a resting value:
//!
//! ```text
//! score(t) = base + (peak - base) * e^(-t / tau)
//! ```
//!
//! `t` is the time since the last recorded event. Recording an event first
//! decays the score to the event time, then raises the peak by the event
//! weight (capped at `max_score`) and restarts the clock. The score is used
//! for ordering only, so floating point is fine here.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::constants::{DEFAULT_ACTIVITY_BASE, DEFAULT_ACTIVITY_MAX, DEFAULT_ACTIVITY_TAU_HOURS};
use crate::errors::{CoreResult, KeystoneCoreError};
use crate::types::UserId;

const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Scored platform activity, heaviest first
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "client", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    RoomSuccess,
    AcceptedIntro,
    HolderGrowth,
    CompletedBounty,
    ApplicationAccepted,
    KeyBuy,
    Referral,
    CuratorVote,
    DmAccepted,
    TaskCompletion,
    Application,
    RoomAttendance,
    Watchtime,
    MessageSent,
}

impl ActivityKind {
    pub fn weight(&self) -> f64 {
        match self {
            ActivityKind::RoomSuccess => 20.0,
            ActivityKind::AcceptedIntro => 15.0,
            ActivityKind::HolderGrowth => 10.0,
            ActivityKind::CompletedBounty => 10.0,
            ActivityKind::ApplicationAccepted => 8.0,
            ActivityKind::KeyBuy => 7.0,
            ActivityKind::Referral => 6.0,
            ActivityKind::CuratorVote => 5.0,
            ActivityKind::DmAccepted => 5.0,
            ActivityKind::TaskCompletion => 5.0,
            ActivityKind::Application => 4.0,
            ActivityKind::RoomAttendance => 3.0,
            ActivityKind::Watchtime => 2.0,
            ActivityKind::MessageSent => 1.0,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(kind: ActivityKind, at: DateTime<Utc>) -> Self {
        Self { kind, at }
    }
}

/// Decay parameters
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActivityParams {
    pub tau_hours: f64,
    /// Resting value the score decays toward
    pub base: f64,
    pub max_score: f64,
}

impl Default for ActivityParams {
    fn default() -> Self {
        Self {
            tau_hours: DEFAULT_ACTIVITY_TAU_HOURS,
            base: DEFAULT_ACTIVITY_BASE,
            max_score: DEFAULT_ACTIVITY_MAX,
        }
    }
}

impl ActivityParams {
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.tau_hours.is_finite() && self.tau_hours > 0.0) {
            return Err(KeystoneCoreError::InvalidParameter("activity tau must be positive"));
        }
        if !(self.base.is_finite() && self.max_score.is_finite() && self.max_score > self.base) {
            return Err(KeystoneCoreError::InvalidParameter("activity max must exceed base"));
        }
        Ok(())
    }
}

/// Incremental score for one user
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityTracker {
    params: ActivityParams,
    peak: f64,
    last_event_at: Option<DateTime<Utc>>,
}

impl ActivityTracker {
    pub fn new(params: ActivityParams) -> CoreResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            peak: params.base,
            last_event_at: None,
        })
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.last_event_at
    }

    /// Score at `now`. Times before the last event read as the peak.
    pub fn score_at(&self, now: DateTime<Utc>) -> f64 {
        let Some(last) = self.last_event_at else {
            return self.params.base;
        };
        let elapsed_hours = ((now - last).num_milliseconds().max(0) as f64) / 1_000.0 / SECONDS_PER_HOUR;
        let decay = (-elapsed_hours / self.params.tau_hours).exp();
        self.params.base + (self.peak - self.params.base) * decay
    }

    /// Decay to the event time, then add the event weight
    pub fn record(&mut self, event: &ActivityEvent) -> CoreResult<f64> {
        if matches!(self.last_event_at, Some(last) if event.at < last) {
            return Err(KeystoneCoreError::EventOutOfOrder);
        }
        let current = self.score_at(event.at);
        self.peak = (current + event.kind.weight()).min(self.params.max_score);
        self.last_event_at = Some(event.at);
        Ok(self.peak)
    }
}

/// Score at `now` computed from the full history, in any order
pub fn score_from_history(params: ActivityParams, events: &[ActivityEvent], now: DateTime<Utc>) -> CoreResult<f64> {
    let mut ordered = events.to_vec();
    ordered.sort_by_key(|e| e.at);

    let mut tracker = ActivityTracker::new(params)?;
    for event in &ordered {
        tracker.record(event)?;
    }
    Ok(tracker.score_at(now))
}

/// Tie-break ordering: higher score first, then user id ascending
pub fn rank_order(a: (&UserId, f64), b: (&UserId, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0))
}
