//! Projected-completion estimation for required work hours.
//!
//! Given the portal's effective/gross elapsed minutes and a required-minutes
//! target, projects the wall-clock time at which the target will be reached
//! using an adaptive break-rate model. The forecast is a heuristic, not a
//! commitment: callers re-derive it on every poll instead of trusting a
//! previously computed value.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Break rate assumed when there is no effective time yet to infer one from.
const FALLBACK_BREAK_RATE: f64 = 0.10;

/// Upper clamp for the inferred break rate, damping outliers from noisy
/// early-morning readings.
const MAX_BREAK_RATE: f64 = 2.0;

/// A point-in-time reading of the portal's attendance figures.
///
/// Gross time includes effective work plus breaks, so `gross_minutes` is
/// always at least `effective_minutes`; the constructor clamps it up when a
/// noisy reading violates that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSnapshot {
    pub effective_minutes: u32,
    pub gross_minutes: u32,
}

impl AttendanceSnapshot {
    pub fn new(effective_minutes: u32, gross_minutes: u32) -> Self {
        Self {
            effective_minutes,
            gross_minutes: gross_minutes.max(effective_minutes),
        }
    }

    /// Minutes spent on breaks so far.
    pub fn break_minutes(&self) -> u32 {
        self.gross_minutes - self.effective_minutes
    }
}

/// Whether the required effective minutes have been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    InProgress,
    Completed,
}

/// Output of a single estimation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub status: CompletionStatus,
    /// Effective minutes still needed to reach the target.
    pub remaining_minutes: u32,
    /// Break rate used for the projection (fallback or inferred, clamped).
    pub break_rate: f64,
    /// Projected wall-clock completion time. `None` once completed; the
    /// caller treats that as "now".
    pub projected_completion: Option<DateTime<Utc>>,
    /// Best-effort back-projection of the clock-in time, assuming no pauses
    /// before the tracked session began.
    pub estimated_clock_in: DateTime<Utc>,
}

/// Computes completion projections against a configured required-minutes
/// target (default 480, i.e. 8 hours).
#[derive(Debug, Clone, Copy)]
pub struct CompletionEstimator {
    required_minutes: u32,
}

impl Default for CompletionEstimator {
    fn default() -> Self {
        Self::new(480)
    }
}

impl CompletionEstimator {
    pub fn new(required_minutes: u32) -> Self {
        Self { required_minutes }
    }

    pub fn required_minutes(&self) -> u32 {
        self.required_minutes
    }

    /// Effective minutes still needed to reach the target, floored at 0.
    pub fn remaining(&self, effective_minutes: u32) -> u32 {
        self.required_minutes.saturating_sub(effective_minutes)
    }

    /// Break rate for the projection: a fixed fallback when there is no
    /// effective time yet, otherwise the observed break/effective ratio
    /// clamped into [0, MAX_BREAK_RATE].
    pub fn break_rate(&self, snapshot: &AttendanceSnapshot) -> f64 {
        if snapshot.effective_minutes == 0 {
            return FALLBACK_BREAK_RATE;
        }
        let raw = snapshot.break_minutes() as f64 / snapshot.effective_minutes as f64;
        raw.clamp(0.0, MAX_BREAK_RATE)
    }

    /// Run a full estimation pass against a snapshot taken at `now`.
    pub fn estimate(&self, snapshot: &AttendanceSnapshot, now: DateTime<Utc>) -> Estimate {
        let remaining = self.remaining(snapshot.effective_minutes);
        let estimated_clock_in = now - Duration::minutes(snapshot.gross_minutes as i64);

        if remaining == 0 {
            return Estimate {
                status: CompletionStatus::Completed,
                remaining_minutes: 0,
                break_rate: self.break_rate(snapshot),
                projected_completion: None,
                estimated_clock_in,
            };
        }

        let break_rate = self.break_rate(snapshot);
        let additional_gross = remaining as f64 * (1.0 + break_rate);
        let projected = now + Duration::seconds((additional_gross * 60.0).round() as i64);

        Estimate {
            status: CompletionStatus::InProgress,
            remaining_minutes: remaining,
            break_rate,
            projected_completion: Some(projected),
            estimated_clock_in,
        }
    }
}
