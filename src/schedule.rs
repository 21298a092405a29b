//! Clock-boundary gate for prediction runs
//!
//! A run triggered every minute only forecasts on horizon boundaries: 15m at
//! minutes 0/15/30/45 UTC, 60m at minute 0.

use crate::types::Horizon;
use chrono::{DateTime, Timelike, Utc};

/// Horizons whose boundary falls on `now`'s minute. `force` returns all of them.
pub fn due_horizons(now: DateTime<Utc>, force: bool) -> Vec<Horizon> {
    if force {
        return Horizon::ALL.to_vec();
    }
    let minute = now.minute();
    Horizon::ALL
        .into_iter()
        .filter(|h| minute % h.minutes() == 0)
        .collect()
}

/// `due_horizons` restricted to the configured set
pub fn due_configured(now: DateTime<Utc>, force: bool, configured: &[Horizon]) -> Vec<Horizon> {
    due_horizons(now, force)
        .into_iter()
        .filter(|h| configured.contains(h))
        .collect()
}
