use chrono::{DateTime, Duration, Utc};

use super::period::{Period, PeriodEnd};

/// Total time the stored `periods` spend inside `window`.
///
/// `periods` must be ordered by begin, the way the store hands them out.
/// Open periods reach `now`, so a period that started before the window and
/// is still running is clipped to `now` rather than dropped; `now` is
/// sampled once by the caller and threaded through the whole query.
pub fn overlap(window: &Period, periods: &[Period], now: DateTime<Utc>) -> Duration {
    let mut total = Duration::zero();
    for it in periods {
        if !intersects(window, it, now) {
            continue;
        }
        let clipped_end = match window.end() {
            PeriodEnd::Closed(window_end) => window_end.min(it.end_or(now)),
            PeriodEnd::Open => it.end_or(now),
        };
        total += clipped_end - window.begin().max(it.begin());
    }
    total
}

fn intersects(window: &Period, it: &Period, now: DateTime<Utc>) -> bool {
    it.end_or(now) > window.begin()
        && match window.end() {
            PeriodEnd::Closed(window_end) => it.begin() < window_end,
            PeriodEnd::Open => true,
        }
}
