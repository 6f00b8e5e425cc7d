use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

use crate::utils::time::local_midnight;

use super::error::StatsError;

/// A point in time accepted from any of the representations the rest of the
/// system produces: raw epoch seconds (whole or fractional), a calendar date
/// (midnight of that date in local time) or a full timestamp. Everything is
/// normalized here, at the model boundary, so the code past [Period]
/// construction only ever deals with `DateTime<Utc>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePoint(DateTime<Utc>);

impl TimePoint {
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for TimePoint {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl From<DateTime<Local>> for TimePoint {
    fn from(value: DateTime<Local>) -> Self {
        Self(value.with_timezone(&Utc))
    }
}

impl From<NaiveDate> for TimePoint {
    fn from(value: NaiveDate) -> Self {
        Self(local_midnight(value))
    }
}

impl From<i64> for TimePoint {
    fn from(seconds: i64) -> Self {
        Self(DateTime::from_timestamp(seconds, 0).expect("epoch seconds outside chrono range"))
    }
}

impl From<f64> for TimePoint {
    fn from(seconds: f64) -> Self {
        Self(
            DateTime::from_timestamp_millis((seconds * 1000.).round() as i64)
                .expect("epoch seconds outside chrono range"),
        )
    }
}

/// End of a [Period]: a concrete timestamp once the period is finished, or
/// still running. An open end reaches whatever "now" is at evaluation time,
/// which every consumer has to supply explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodEnd {
    Closed(DateTime<Utc>),
    Open,
}

/// A half-open span of work time `[begin, end)`. At most one period in the
/// store is open at any moment and it is always the most recent one; this
/// model only has to represent that, not enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    begin: DateTime<Utc>,
    end: PeriodEnd,
}

impl Period {
    /// Builds a period from any accepted time representations, rejecting an
    /// end that does not lie strictly after the begin.
    pub fn new(
        begin: impl Into<TimePoint>,
        end: Option<impl Into<TimePoint>>,
    ) -> Result<Self, StatsError> {
        let begin = begin.into().into_inner();
        match end.map(|v| v.into().into_inner()) {
            Some(end) if end <= begin => Err(StatsError::InvalidRange { begin, end }),
            Some(end) => Ok(Self {
                begin,
                end: PeriodEnd::Closed(end),
            }),
            None => Ok(Self {
                begin,
                end: PeriodEnd::Open,
            }),
        }
    }

    pub fn closed(
        begin: impl Into<TimePoint>,
        end: impl Into<TimePoint>,
    ) -> Result<Self, StatsError> {
        Self::new(begin, Some(end))
    }

    pub fn open_from(begin: impl Into<TimePoint>) -> Self {
        Self {
            begin: begin.into().into_inner(),
            end: PeriodEnd::Open,
        }
    }

    pub fn begin(&self) -> DateTime<Utc> {
        self.begin
    }

    pub fn end(&self) -> PeriodEnd {
        self.end
    }

    pub fn is_open(&self) -> bool {
        matches!(self.end, PeriodEnd::Open)
    }

    /// The concrete end used in arithmetic, with open periods reaching `now`.
    pub fn end_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.end {
            PeriodEnd::Closed(end) => end,
            PeriodEnd::Open => now,
        }
    }

    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.end_or(now) - self.begin
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::utils::time::local_midnight;

    use super::{Period, PeriodEnd, StatsError, TimePoint};

    #[test]
    fn normalizes_epoch_seconds() {
        let period = Period::closed(100i64, 250i64).unwrap();
        assert_eq!(period.begin(), Utc.timestamp_opt(100, 0).unwrap());
        assert_eq!(
            period.end(),
            PeriodEnd::Closed(Utc.timestamp_opt(250, 0).unwrap())
        );
    }

    #[test]
    fn normalizes_fractional_seconds() {
        let point = TimePoint::from(100.5f64).into_inner();
        assert_eq!(point.timestamp_millis(), 100_500);
    }

    #[test]
    fn normalizes_calendar_dates_to_local_midnight() {
        let date = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let point = TimePoint::from(date).into_inner();
        assert_eq!(point, local_midnight(date));
    }

    #[test]
    fn rejects_end_not_after_begin() {
        assert!(matches!(
            Period::closed(250i64, 100i64),
            Err(StatsError::InvalidRange { .. })
        ));
        assert!(matches!(
            Period::closed(100i64, 100i64),
            Err(StatsError::InvalidRange { .. })
        ));
    }

    #[test]
    fn equality_is_structural() {
        let a = Period::closed(100i64, 250i64).unwrap();
        let b = Period::closed(100.0f64, 250i64).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, Period::open_from(100i64));
    }

    #[test]
    fn open_end_reaches_now() {
        let now = Utc.timestamp_opt(1000, 0).unwrap();
        let period = Period::open_from(400i64);
        assert!(period.is_open());
        assert_eq!(period.end_or(now), now);
        assert_eq!(period.duration(now).num_seconds(), 600);
    }
}
