use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::debug;

use crate::{
    storage::period_store::PeriodStore,
    utils::{
        clock::Clock,
        time::{local_date_of, week_start_of, weekday_index, WindowStarts},
    },
};

use super::{
    error::StatsError,
    overlap::overlap,
    period::{Period, PeriodEnd},
};

/// Work-time totals for the four standard calendar windows: the current
/// day, Monday-based week, month and year.
///
/// An instance built with [from_store](WorkStatistics::from_store) keeps the
/// totals as running sums and [update](WorkStatistics::update) advances them
/// by fetching only periods recorded since the previous update. An instance
/// built with [uncached](WorkStatistics::uncached) recomputes every total
/// from a fresh fetch instead. The mode is fixed for the instance's life.
///
/// The instance is owned mutable state; readers and updaters running on
/// different threads have to serialize access themselves.
pub struct WorkStatistics<S> {
    store: S,
    clock: Box<dyn Clock>,
    cache: Option<StatsCache>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StatsCache {
    /// End of the most recently folded-in period, or the build cutoff while
    /// no period has been seen.
    last_update: DateTime<Utc>,
    day: Duration,
    week: Duration,
    month: Duration,
    year: Duration,
}

impl StatsCache {
    fn new(cutoff: DateTime<Utc>) -> Self {
        Self {
            last_update: cutoff,
            day: Duration::zero(),
            week: Duration::zero(),
            month: Duration::zero(),
            year: Duration::zero(),
        }
    }

    /// Adds the `[begin, end)` slice of work time to every window total,
    /// clipped against the window starts.
    fn fold(&mut self, begin: DateTime<Utc>, end: DateTime<Utc>, starts: &WindowStarts) {
        self.year += (end - begin.max(starts.year)).max(Duration::zero());
        self.month += (end - begin.max(starts.month)).max(Duration::zero());
        self.week += (end - begin.max(starts.week)).max(Duration::zero());
        self.day += (end - begin.max(starts.day)).max(Duration::zero());
    }

    /// Zeroes every total whose calendar window has rolled over since
    /// `last_update`.
    fn invalidate_crossed(&mut self, starts: &WindowStarts, now: DateTime<Utc>) {
        let today = local_date_of(now);
        let last_day = local_date_of(self.last_update);
        if today == last_day {
            return;
        }
        self.day = Duration::zero();
        if today.year() != last_day.year() {
            self.year = Duration::zero();
            self.month = Duration::zero();
        } else if today.month() != last_day.month() {
            self.month = Duration::zero();
        }
        // A week can survive a month or even a year boundary, so its
        // crossing is read off the week start and the weekday wrap.
        if starts.week - week_start_of(self.last_update) > Duration::days(7)
            || weekday_index(now) < weekday_index(self.last_update)
        {
            self.week = Duration::zero();
        }
    }
}

impl<S: PeriodStore> WorkStatistics<S> {
    /// Builds an instance with cached running totals from everything the
    /// store holds for the current year.
    pub async fn from_store(store: S, clock: Box<dyn Clock>) -> Result<Self, StatsError> {
        let now = clock.time();
        let starts = WindowStarts::at(now);
        let periods = store.fetch_since(starts.year).await?;

        let mut cache = StatsCache::new(now);
        let mut previous = None;
        for period in &periods {
            verify_fetched(&mut previous, period, now)?;
            let end = period.end_or(now);
            cache.fold(period.begin(), end, &starts);
            cache.last_update = end;
        }
        debug!("Built statistics cache up to {}", cache.last_update);

        Ok(Self {
            store,
            clock,
            cache: Some(cache),
        })
    }

    /// Builds an instance that recomputes each total on demand instead of
    /// keeping running sums. Nothing is fetched until a total is asked for.
    pub fn uncached(store: S, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            cache: None,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// End of the most recently folded-in period; None in uncached mode.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.cache.map(|cache| cache.last_update)
    }

    /// Folds periods recorded since the previous update into the cached
    /// totals, first zeroing any window whose calendar boundary has been
    /// crossed. A no-op in uncached mode, where there is nothing to advance.
    pub async fn update(&mut self) -> Result<(), StatsError> {
        let Some(mut cache) = self.cache else {
            return Ok(());
        };
        let now = self.clock.time();
        let starts = WindowStarts::at(now);
        cache.invalidate_crossed(&starts, now);

        let periods = self.store.fetch_since(cache.last_update).await?;
        let mut previous = None;
        for period in &periods {
            verify_fetched(&mut previous, period, now)?;
            // A period that was still open during the previous update has
            // already been counted up to that point.
            let begin = period.begin().max(cache.last_update);
            let end = period.end_or(now);
            if end < begin {
                return Err(StatsError::Consistency(format!(
                    "period ending at {end} precedes the cache cutoff {begin}"
                )));
            }
            cache.fold(begin, end, &starts);
            cache.last_update = end;
        }

        self.cache = Some(cache);
        Ok(())
    }

    pub async fn day(&self) -> Result<Duration, StatsError> {
        self.window_total(|cache| cache.day, |starts| starts.day)
            .await
    }

    pub async fn week(&self) -> Result<Duration, StatsError> {
        self.window_total(|cache| cache.week, |starts| starts.week)
            .await
    }

    pub async fn month(&self) -> Result<Duration, StatsError> {
        self.window_total(|cache| cache.month, |starts| starts.month)
            .await
    }

    pub async fn year(&self) -> Result<Duration, StatsError> {
        self.window_total(|cache| cache.year, |starts| starts.year)
            .await
    }

    /// Total work time inside an arbitrary window. Always served from a
    /// fresh fetch; the cache only ever covers the four standard windows.
    pub async fn range_total(&self, window: &Period) -> Result<Duration, StatsError> {
        let now = self.clock.time();
        let periods = self.store.fetch_since(window.begin()).await?;
        Ok(overlap(window, &periods, now))
    }

    async fn window_total(
        &self,
        cached: impl FnOnce(&StatsCache) -> Duration,
        window_start: impl FnOnce(&WindowStarts) -> DateTime<Utc>,
    ) -> Result<Duration, StatsError> {
        if let Some(cache) = &self.cache {
            return Ok(cached(cache));
        }
        let now = self.clock.time();
        let start = window_start(&WindowStarts::at(now));
        if now <= start {
            return Ok(Duration::zero());
        }
        let window = Period::closed(start, now)?;
        let periods = self.store.fetch_since(start).await?;
        Ok(overlap(&window, &periods, now))
    }
}

/// The store hands periods out ascending by begin and without overlaps;
/// anything else would silently corrupt the running totals, so it fails the
/// whole operation instead.
fn verify_fetched(
    previous: &mut Option<Period>,
    period: &Period,
    now: DateTime<Utc>,
) -> Result<(), StatsError> {
    if let PeriodEnd::Closed(end) = period.end() {
        if end > now {
            return Err(StatsError::Consistency(format!(
                "period ending at {end} lies in the future"
            )));
        }
    }
    if let Some(prev) = previous {
        if period.begin() < prev.begin() {
            return Err(StatsError::Consistency(format!(
                "period beginning at {} was fetched after {}",
                period.begin(),
                prev.begin()
            )));
        }
        if period.begin() < prev.end_or(now) {
            return Err(StatsError::Consistency(format!(
                "period beginning at {} overlaps its predecessor",
                period.begin()
            )));
        }
    }
    *previous = Some(*period);
    Ok(())
}
