use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by the statistics core. Callers decide whether to retry
/// or abort; nothing here is retried internally.
#[derive(Debug, Error)]
pub enum StatsError {
    /// A period's end does not lie strictly after its begin.
    #[error("period end {end} is not after begin {begin}")]
    InvalidRange {
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// A date-range expression could not be turned into a period.
    #[error("can't read {input:?} as a date range: {reason}")]
    Format { input: String, reason: String },

    /// The period log could not be opened or read.
    #[error("period log unavailable: {0}")]
    StoreUnavailable(#[from] std::io::Error),

    /// Stored data violates an invariant the core relies on. This means the
    /// log is corrupt or was written by a broken daemon, so the operation
    /// fails instead of producing wrong totals.
    #[error("period log inconsistent: {0}")]
    Consistency(String),
}
