use chrono::DateTime;
use chrono::Utc;

use serde::Deserialize;
use serde::Serialize;

use crate::stats::error::StatsError;
use crate::stats::period::{Period, PeriodEnd};

/// The struct used for storing a work period on disk, one JSON object per
/// line of the period log. Seconds resolution keeps lines short and is all
/// the source data ever carries. A missing `end` marks a period that is
/// still being extended.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy)]
pub struct PeriodRecord {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub begin: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<DateTime<Utc>>,
}

impl From<Period> for PeriodRecord {
    fn from(period: Period) -> Self {
        Self {
            begin: period.begin(),
            end: match period.end() {
                PeriodEnd::Closed(end) => Some(end),
                PeriodEnd::Open => None,
            },
        }
    }
}

impl TryFrom<PeriodRecord> for Period {
    type Error = StatsError;

    fn try_from(record: PeriodRecord) -> Result<Self, Self::Error> {
        Period::new(record.begin, record.end)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::{Period, PeriodRecord};

    #[test]
    fn open_records_serialize_without_an_end() {
        let record = PeriodRecord {
            begin: Utc.timestamp_opt(1_530_662_400, 0).unwrap(),
            end: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"begin":1530662400}"#);
        assert_eq!(serde_json::from_str::<PeriodRecord>(&json).unwrap(), record);
    }

    #[test]
    fn records_round_trip_through_the_model() {
        let record = PeriodRecord {
            begin: Utc.timestamp_opt(1_530_662_400, 0).unwrap(),
            end: Some(Utc.timestamp_opt(1_530_666_000, 0).unwrap()),
        };
        let period = Period::try_from(record).unwrap();
        assert_eq!(PeriodRecord::from(period), record);
    }

    #[test]
    fn records_with_a_backwards_end_do_not_convert() {
        let record = PeriodRecord {
            begin: Utc.timestamp_opt(1_530_666_000, 0).unwrap(),
            end: Some(Utc.timestamp_opt(1_530_662_400, 0).unwrap()),
        };
        assert!(Period::try_from(record).is_err());
    }
}
