//! The expiry extension rule.
//!
//! A registration that still has validity left is extended from its current
//! expiry ("cumulative"). One that has already lapsed, or never had an expiry,
//! restarts from the current time. Month arithmetic is calendar based and
//! clamps to the last valid day of the target month.

use chrono::{Months, NaiveDateTime, SubsecRound};
use serde::Serialize;

use crate::errors::{QrDocError, QrDocResult};

/// Month counts a registration may be extended by.
pub const ALLOWED_MONTHS: [u32; 3] = [1, 3, 6];

/// Wire and storage format for registration timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way the API and the `registrations` table expect.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// A validated extension length.
///
/// Only values in [`ALLOWED_MONTHS`] can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtensionPeriod(u32);

impl ExtensionPeriod {
    /// Returns `None` for anything outside the allow-list, including zero and negatives.
    pub fn new(months: i64) -> Option<Self> {
        let months = u32::try_from(months).ok()?;
        ALLOWED_MONTHS.contains(&months).then_some(Self(months))
    }

    pub fn months(self) -> u32 {
        self.0
    }
}

/// Outcome of applying the rule to one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPlan {
    /// The instant the months were added to.
    pub base: NaiveDateTime,
    pub new_expiry: NaiveDateTime,
    /// `true` when the previous expiry was still in the future.
    pub cumulative: bool,
}

/// Compute the new expiry for a registration.
///
/// `current_expiry` is the stored value (`None` for legacy rows without one).
/// An expiry exactly equal to `now` counts as lapsed.
pub fn plan_extension(
    current_expiry: Option<NaiveDateTime>,
    now: NaiveDateTime,
    period: ExtensionPeriod,
) -> QrDocResult<ExtensionPlan> {
    let now = now.trunc_subsecs(0);

    let (base, cumulative) = match current_expiry {
        Some(expiry) if expiry > now => (expiry, true),
        _ => (now, false),
    };

    let new_expiry = base
        .checked_add_months(Months::new(period.months()))
        .ok_or_else(|| {
            QrDocError::ServerError(format!(
                "cannot add {} months to {}",
                period.months(),
                format_timestamp(&base)
            ))
        })?;

    Ok(ExtensionPlan {
        base,
        new_expiry,
        cumulative,
    })
}
