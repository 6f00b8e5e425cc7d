use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use now::DateTimeNow;

/// Start boundaries of the four standard statistics windows, all derived
/// from a single sample of the current time. Days, weeks, months and years
/// are calendar concepts, so the boundaries are computed in local time and
/// carried back as UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStarts {
    pub year: DateTime<Utc>,
    pub month: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub day: DateTime<Utc>,
}

impl WindowStarts {
    pub fn at(now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(&Local);
        Self {
            year: local.beginning_of_year().with_timezone(&Utc),
            month: local.beginning_of_month().with_timezone(&Utc),
            week: local.beginning_of_week().with_timezone(&Utc),
            day: local.beginning_of_day().with_timezone(&Utc),
        }
    }
}

/// Start of the Monday-based week containing `moment`.
pub fn week_start_of(moment: DateTime<Utc>) -> DateTime<Utc> {
    moment
        .with_timezone(&Local)
        .beginning_of_week()
        .with_timezone(&Utc)
}

/// Monday-based weekday index (Monday = 0) of `moment` in local time.
pub fn weekday_index(moment: DateTime<Utc>) -> u32 {
    moment
        .with_timezone(&Local)
        .weekday()
        .num_days_from_monday()
}

/// Calendar date `moment` falls on in local time.
pub fn local_date_of(moment: DateTime<Utc>) -> NaiveDate {
    moment.with_timezone(&Local).date_naive()
}

/// Midnight of `date` in local time. When a daylight-saving jump removes
/// midnight the first valid instant of the day is used instead.
pub fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(moment) => moment.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&midnight),
    }
}
