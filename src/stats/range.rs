use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};

use crate::utils::time::local_midnight;

use super::{
    error::StatsError,
    period::{Period, PeriodEnd},
};

const NOW_LITERAL: &str = "now";

/// How much of a dotted date expression was spelled out. What was omitted
/// defaults to the first day/month, and for a single expression the
/// precision also decides how long the implied window is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatePrecision {
    Day,
    Month,
    Year,
}

/// Parses a human-typed date range into a [Period].
///
/// A range is a single date expression or two joined by `-`. Each expression
/// is dotted numbers, read as `day.month.year` first and `year.month.day`
/// second, with day and then month omittable (`2021`, `03.2021`,
/// `15.03.2021`, `2021.03.15`). A single expression spans one unit of its
/// precision; two expressions span `[left, right)`. The right side may be
/// the literal `now`, and `date-now` stays open-ended so it keeps tracking
/// the current instant.
pub fn parse_range(input: &str, now: DateTime<Utc>) -> Result<Period, StatsError> {
    let parts: Vec<&str> = input.split('-').map(str::trim).collect();
    let parsed = match parts.as_slice() {
        [single] => parse_single(single, now),
        [left, right] => parse_pair(left, right),
        _ => Err("more than one '-' separator".into()),
    };
    parsed.map_err(|reason| StatsError::Format {
        input: input.to_string(),
        reason,
    })
}

/// Renders `period` in the same dotted form [parse_range] accepts. Exact
/// only for periods whose edges sit on local midnights, which is what the
/// parser itself produces.
pub fn format_range(period: &Period) -> String {
    let begin = period.begin().with_timezone(&Local).format("%d.%m.%Y");
    match period.end() {
        PeriodEnd::Open => format!("{begin}-{NOW_LITERAL}"),
        PeriodEnd::Closed(end) => {
            format!("{begin}-{}", end.with_timezone(&Local).format("%d.%m.%Y"))
        }
    }
}

fn parse_single(expr: &str, now: DateTime<Utc>) -> Result<Period, String> {
    if expr == NOW_LITERAL {
        return Ok(Period::open_from(now));
    }
    let (date, precision) = parse_date(expr)?;
    let end = match precision {
        DatePrecision::Day => date.succ_opt(),
        DatePrecision::Month => first_of_next_month(date),
        DatePrecision::Year => NaiveDate::from_ymd_opt(date.year() + 1, 1, 1),
    }
    .ok_or_else(|| format!("{expr:?} has no following calendar day"))?;
    Period::closed(date, end).map_err(|e| e.to_string())
}

fn parse_pair(left: &str, right: &str) -> Result<Period, String> {
    if left == NOW_LITERAL {
        return Err(format!("'{NOW_LITERAL}' can only end a range"));
    }
    let (begin, _) = parse_date(left)?;
    if right == NOW_LITERAL {
        return Ok(Period::open_from(begin));
    }
    let (end, _) = parse_date(right)?;
    if local_midnight(end) <= local_midnight(begin) {
        return Err(format!("end {right:?} is not after begin {left:?}"));
    }
    Period::closed(begin, end).map_err(|e| e.to_string())
}

/// Reads one dotted expression, trying the day-first field order before the
/// day-last one. The first interpretation that names a real calendar date
/// wins, so `01.03.2021` is the first of March even though both orders are
/// plausible to a human.
fn parse_date(expr: &str) -> Result<(NaiveDate, DatePrecision), String> {
    let fields = expr
        .split('.')
        .map(|field| field.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| format!("{expr:?} is not a dotted date"))?;

    let date = match fields.as_slice() {
        [year] => date_from(*year, 1, 1).map(|date| (date, DatePrecision::Year)),
        [a, b] => date_from(*b, *a, 1)
            .or_else(|| date_from(*a, *b, 1))
            .map(|date| (date, DatePrecision::Month)),
        [a, b, c] => date_from(*c, *b, *a)
            .or_else(|| date_from(*a, *b, *c))
            .map(|date| (date, DatePrecision::Day)),
        _ => None,
    };
    date.ok_or_else(|| format!("no calendar date matches {expr:?}"))
}

fn date_from(year: i32, month: i32, day: i32) -> Option<NaiveDate> {
    let month = u32::try_from(month).ok()?;
    let day = u32::try_from(day).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use crate::utils::time::local_midnight;

    use super::{format_range, parse_range, Period, StatsError};

    fn midnight(year: i32, month: u32, day: u32) -> chrono::DateTime<Utc> {
        local_midnight(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    fn closed(begin: (i32, u32, u32), end: (i32, u32, u32)) -> Period {
        Period::closed(midnight(begin.0, begin.1, begin.2), midnight(end.0, end.1, end.2))
            .unwrap()
    }

    #[test]
    fn bare_year_spans_the_whole_year() {
        let period = parse_range("2021", Utc::now()).unwrap();
        assert_eq!(period, closed((2021, 1, 1), (2022, 1, 1)));
    }

    #[test]
    fn year_and_month_span_one_month() {
        let period = parse_range("03.2021", Utc::now()).unwrap();
        assert_eq!(period, closed((2021, 3, 1), (2021, 4, 1)));
    }

    #[test]
    fn december_wraps_into_next_january() {
        let period = parse_range("12.2021", Utc::now()).unwrap();
        assert_eq!(period, closed((2021, 12, 1), (2022, 1, 1)));
    }

    #[test]
    fn full_date_spans_one_day_and_reads_day_first() {
        let period = parse_range("05.03.2021", Utc::now()).unwrap();
        assert_eq!(period, closed((2021, 3, 5), (2021, 3, 6)));
    }

    #[test]
    fn day_last_order_is_the_fallback() {
        let period = parse_range("2021.03.15", Utc::now()).unwrap();
        assert_eq!(period, closed((2021, 3, 15), (2021, 3, 16)));

        let period = parse_range("2021.03", Utc::now()).unwrap();
        assert_eq!(period, closed((2021, 3, 1), (2021, 4, 1)));
    }

    #[test]
    fn two_sided_range_uses_both_dates_verbatim() {
        let period = parse_range("01.03.2021-15.03.2021", Utc::now()).unwrap();
        assert_eq!(period, closed((2021, 3, 1), (2021, 3, 15)));

        let period = parse_range("2021-2022", Utc::now()).unwrap();
        assert_eq!(period, closed((2021, 1, 1), (2022, 1, 1)));
    }

    #[test]
    fn date_through_now_stays_open_ended() {
        let period = parse_range("2021.03.01-now", Utc::now()).unwrap();
        assert_eq!(period, Period::open_from(midnight(2021, 3, 1)));
    }

    #[test]
    fn bare_now_degenerates_to_the_current_instant() {
        let now = Utc::now();
        assert_eq!(parse_range("now", now).unwrap(), Period::open_from(now));
    }

    #[test]
    fn rejects_malformed_expressions() {
        for input in [
            "",
            "gibberish",
            "1.2.3.4",
            "now-2021",
            "01.03.2021-02.03.2021-03.03.2021",
            "15.03.2021-01.03.2021",
            "2021-2021",
        ] {
            assert!(
                matches!(parse_range(input, Utc::now()), Err(StatsError::Format { .. })),
                "{input:?} should not parse",
            );
        }
    }

    #[test]
    fn formatting_then_parsing_round_trips() {
        let full = closed((2021, 3, 1), (2021, 3, 15));
        assert_eq!(parse_range(&format_range(&full), Utc::now()).unwrap(), full);

        let open = Period::open_from(midnight(2021, 3, 1));
        assert_eq!(parse_range(&format_range(&open), Utc::now()).unwrap(), open);
    }
}
