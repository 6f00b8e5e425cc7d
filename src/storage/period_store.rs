use std::{
    future::Future,
    io::SeekFrom,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::stats::{
    error::StatsError,
    period::{Period, PeriodEnd},
};

use super::entities::PeriodRecord;

const PERIOD_LOG_NAME: &str = "periods";

/// Read seam consumed by the statistics core.
pub trait PeriodStore {
    /// Returns every stored period whose end lies after `min_end`, in stored
    /// order. An open period has no end yet and is always included.
    fn fetch_since(
        &self,
        min_end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Period>, StatsError>> + Send;
}

/// Write seam used by the daemon.
pub trait PeriodSink {
    type Log: PeriodLogHandle;

    /// Opens the period log for appending, discarding any unfinished tail a
    /// hard shutdown may have left behind.
    fn open_log(&self) -> impl Future<Output = Result<Self::Log>>;
}

pub trait PeriodLogHandle {
    /// Starts a new open period at `begin`.
    fn begin_period(&mut self, begin: DateTime<Utc>) -> impl Future<Output = Result<()>>;

    /// Moves the end of the period started by
    /// [begin_period](PeriodLogHandle::begin_period) forward to `end`.
    fn extend_period(&mut self, end: DateTime<Utc>) -> impl Future<Output = Result<()>>;
}

/// The main realization of [PeriodStore] and [PeriodSink], backed by a
/// single JSON-lines file.
pub struct PeriodStoreImpl {
    log_path: PathBuf,
}

impl PeriodStoreImpl {
    pub fn new(data_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&data_dir)?;

        Ok(Self {
            log_path: data_dir.join(PERIOD_LOG_NAME),
        })
    }

    async fn read_all(&self) -> Result<Vec<Period>, StatsError> {
        debug!("Reading periods from {:?}", self.log_path);
        let file = File::open(&self.log_path).await?;
        file.lock_shared()?;
        let buffer = BufReader::new(file);
        let mut lines = buffer.lines();
        let mut periods = vec![];
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            // Illegal lines can appear after shutdowns; they only ever cost
            // the tail of one session, so reading keeps going.
            match serde_json::from_str::<PeriodRecord>(&line) {
                Ok(record) => match Period::try_from(record) {
                    Ok(period) => periods.push(period),
                    Err(e) => {
                        warn!("In {:?} found unusable period {line}: {e}", self.log_path)
                    }
                },
                Err(e) => {
                    warn!("In {:?} found illegal json string {line}: {e}", self.log_path)
                }
            }
        }

        lines.into_inner().into_inner().unlock_async().await?;

        Ok(periods)
    }
}

impl PeriodStore for PeriodStoreImpl {
    async fn fetch_since(&self, min_end: DateTime<Utc>) -> Result<Vec<Period>, StatsError> {
        let periods = self.read_all().await?;
        Ok(periods
            .into_iter()
            .filter(|period| match period.end() {
                PeriodEnd::Closed(end) => end > min_end,
                PeriodEnd::Open => true,
            })
            .collect())
    }
}

impl PeriodSink for PeriodStoreImpl {
    type Log = PeriodLogFile;

    async fn open_log(&self) -> Result<PeriodLogFile> {
        let mut file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&self.log_path)
            .await?;

        file.lock_exclusive()?;
        let result = discard_unfinished_tail(&mut file, &self.log_path).await;
        file.unlock_async().await?;
        result?;

        Ok(PeriodLogFile {
            file,
            open_record: None,
        })
    }
}

/// Handle extending the period log. Remembers where the line of the period
/// it opened starts, so every extension is a rewrite of that one line.
pub struct PeriodLogFile {
    file: File,
    open_record: Option<(u64, PeriodRecord)>,
}

impl PeriodLogHandle for PeriodLogFile {
    async fn begin_period(&mut self, begin: DateTime<Utc>) -> Result<()> {
        ensure!(self.open_record.is_none(), "a period is already open");

        let record = PeriodRecord { begin, end: None };
        self.file.lock_exclusive()?;
        let result = append_record(&mut self.file, &record).await;
        self.file.unlock_async().await?;

        self.open_record = Some((result?, record));
        Ok(())
    }

    async fn extend_period(&mut self, end: DateTime<Utc>) -> Result<()> {
        let (offset, record) = self
            .open_record
            .as_mut()
            .context("no period has been opened")?;
        ensure!(
            end > record.begin,
            "period end {end} is not after begin {}",
            record.begin
        );
        record.end = Some(end);

        self.file.lock_exclusive()?;
        let result = rewrite_record(&mut self.file, *offset, record).await;
        self.file.unlock_async().await?;
        result
    }
}

async fn append_record(file: &mut File, record: &PeriodRecord) -> Result<u64> {
    let offset = file.seek(SeekFrom::End(0)).await?;
    let mut buffer = serde_json::to_vec(record)?;
    buffer.push(b'\n');
    file.write_all(&buffer).await?;
    file.flush().await?;
    Ok(offset)
}

async fn rewrite_record(file: &mut File, offset: u64, record: &PeriodRecord) -> Result<()> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buffer = serde_json::to_vec(record)?;
    buffer.push(b'\n');
    file.write_all(&buffer).await?;
    // The rewritten line can be shorter than what was there before.
    file.set_len(offset + buffer.len() as u64).await?;
    file.flush().await?;
    Ok(())
}

/// Drops whatever a hard shutdown left at the end of the log: a torn last
/// line, or a period that never got an end and cannot get one anymore. The
/// log carries one line per work session, so reading it whole is fine.
async fn discard_unfinished_tail(file: &mut File, path: &Path) -> Result<(), std::io::Error> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).await?;
    file.read_to_string(&mut contents).await?;

    let keep = cleaned_length(&contents);
    if (keep as usize) < contents.len() {
        warn!("Discarding unfinished tail of {path:?}");
        file.set_len(keep).await?;
    }
    file.seek(SeekFrom::Start(keep)).await?;
    Ok(())
}

/// Length of the leading portion of the log worth keeping: whole lines, the
/// last of which is a finished period.
fn cleaned_length(contents: &str) -> u64 {
    let Some(terminated) = contents.rfind('\n').map(|index| index + 1) else {
        return 0;
    };
    let last_start = contents[..terminated - 1]
        .rfind('\n')
        .map_or(0, |index| index + 1);
    match serde_json::from_str::<PeriodRecord>(&contents[last_start..terminated - 1]) {
        Ok(record) if record.end.is_none() => last_start as u64,
        _ => terminated as u64,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::stats::{error::StatsError, period::PeriodEnd};

    use super::{
        cleaned_length, PeriodLogHandle, PeriodSink, PeriodStore, PeriodStoreImpl, PERIOD_LOG_NAME,
    };

    fn moment(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_530_662_400 + seconds, 0).unwrap()
    }

    #[tokio::test]
    async fn fetch_without_a_log_file_is_unavailable() -> Result<()> {
        let dir = tempdir()?;
        let store = PeriodStoreImpl::new(dir.path().to_owned())?;

        let result = store.fetch_since(DateTime::UNIX_EPOCH).await;
        assert!(matches!(result, Err(StatsError::StoreUnavailable(_))));
        Ok(())
    }

    #[tokio::test]
    async fn a_session_stays_a_single_line() -> Result<()> {
        let dir = tempdir()?;
        let store = PeriodStoreImpl::new(dir.path().to_owned())?;

        let mut log = store.open_log().await?;
        log.begin_period(moment(0)).await?;

        let periods = store.fetch_since(DateTime::UNIX_EPOCH).await?;
        assert_eq!(periods.len(), 1);
        assert!(periods[0].is_open());

        log.extend_period(moment(30)).await?;
        log.extend_period(moment(60)).await?;

        let contents = std::fs::read_to_string(dir.path().join(PERIOD_LOG_NAME))?;
        assert_eq!(contents.lines().count(), 1);

        let periods = store.fetch_since(DateTime::UNIX_EPOCH).await?;
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].begin(), moment(0));
        assert_eq!(periods[0].end(), PeriodEnd::Closed(moment(60)));
        Ok(())
    }

    #[tokio::test]
    async fn sessions_append_in_order() -> Result<()> {
        let dir = tempdir()?;
        let store = PeriodStoreImpl::new(dir.path().to_owned())?;

        let mut log = store.open_log().await?;
        log.begin_period(moment(0)).await?;
        log.extend_period(moment(100)).await?;
        drop(log);

        let mut log = store.open_log().await?;
        log.begin_period(moment(200)).await?;
        log.extend_period(moment(260)).await?;

        let periods = store.fetch_since(DateTime::UNIX_EPOCH).await?;
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].end(), PeriodEnd::Closed(moment(100)));
        assert_eq!(periods[1].begin(), moment(200));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_since_filters_by_end() -> Result<()> {
        let dir = tempdir()?;
        let store = PeriodStoreImpl::new(dir.path().to_owned())?;

        let mut log = store.open_log().await?;
        log.begin_period(moment(0)).await?;
        log.extend_period(moment(100)).await?;
        drop(log);
        let mut log = store.open_log().await?;
        log.begin_period(moment(200)).await?;
        log.extend_period(moment(300)).await?;
        drop(log);
        let mut log = store.open_log().await?;
        log.begin_period(moment(400)).await?;

        let periods = store.fetch_since(moment(100)).await?;
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].begin(), moment(200));
        // The open trailing period has no end to filter on yet.
        assert!(periods[1].is_open());
        Ok(())
    }

    #[tokio::test]
    async fn opening_the_log_discards_an_unfinished_session() -> Result<()> {
        let dir = tempdir()?;
        let store = PeriodStoreImpl::new(dir.path().to_owned())?;

        let mut log = store.open_log().await?;
        log.begin_period(moment(0)).await?;
        log.extend_period(moment(100)).await?;
        drop(log);
        // A session that never got past its first write.
        let mut log = store.open_log().await?;
        log.begin_period(moment(200)).await?;
        drop(log);

        let mut log = store.open_log().await?;
        log.begin_period(moment(400)).await?;
        log.extend_period(moment(460)).await?;

        let periods = store.fetch_since(DateTime::UNIX_EPOCH).await?;
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].end(), PeriodEnd::Closed(moment(100)));
        assert_eq!(periods[1].begin(), moment(400));
        Ok(())
    }

    #[tokio::test]
    async fn torn_lines_are_skipped_when_reading() -> Result<()> {
        let dir = tempdir()?;
        let store = PeriodStoreImpl::new(dir.path().to_owned())?;

        let mut log = store.open_log().await?;
        log.begin_period(moment(0)).await?;
        log.extend_period(moment(100)).await?;
        drop(log);

        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(dir.path().join(PERIOD_LOG_NAME))?;
        file.write_all(b"{\"begin\":153")?;
        drop(file);

        let periods = store.fetch_since(DateTime::UNIX_EPOCH).await?;
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].end(), PeriodEnd::Closed(moment(100)));
        Ok(())
    }

    #[test]
    fn cleaned_length_keeps_finished_sessions_only() {
        assert_eq!(cleaned_length(""), 0);
        assert_eq!(cleaned_length("{\"begin\":100"), 0);

        let finished = "{\"begin\":100,\"end\":200}\n";
        assert_eq!(cleaned_length(finished), finished.len() as u64);

        let with_open = "{\"begin\":100,\"end\":200}\n{\"begin\":300}\n";
        assert_eq!(cleaned_length(with_open), finished.len() as u64);

        let with_torn = "{\"begin\":100,\"end\":200}\n{\"begin\":3";
        assert_eq!(cleaned_length(with_torn), finished.len() as u64);
    }
}
