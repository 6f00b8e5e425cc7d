use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use crate::storage::period_store::{PeriodLogHandle, PeriodSink};

use super::heartbeat::Heartbeat;

/// Turns the heartbeat stream into a single stored work period per daemon
/// session. The period opens at the first heartbeat's moment once the
/// session has lasted `minimum_active`, and every later heartbeat pushes its
/// end forward. Sessions shorter than the threshold never reach the disk.
pub struct SessionRecorder<S: PeriodSink> {
    store: S,
    log: Option<S::Log>,
    session_begin: Option<DateTime<Utc>>,
    minimum_active: Duration,
}

impl<S: PeriodSink> SessionRecorder<S> {
    pub fn new(store: S, minimum_active: Duration) -> Self {
        Self {
            store,
            log: None,
            session_begin: None,
            minimum_active,
        }
    }

    pub async fn record(&mut self, beat: Heartbeat) -> Result<()> {
        let begin = *self.session_begin.get_or_insert(beat.moment);
        match self.log.as_mut() {
            Some(log) => log.extend_period(beat.moment).await,
            None if beat.moment - begin >= self.minimum_active => {
                let mut log = self.store.open_log().await?;
                log.begin_period(begin).await?;
                if beat.moment > begin {
                    log.extend_period(beat.moment).await?;
                }
                self.log = Some(log);
                info!("Opened work period at {begin}");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Represents the recording half of the daemon. It receives heartbeats and
/// persists them through a [SessionRecorder].
pub struct RecordingModule<S: PeriodSink> {
    receiver: Receiver<Heartbeat>,
    recorder: SessionRecorder<S>,
}

impl<S: PeriodSink> RecordingModule<S> {
    pub fn new(receiver: Receiver<Heartbeat>, recorder: SessionRecorder<S>) -> Self {
        Self { receiver, recorder }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(beat) = self.receiver.recv().await {
            debug!("Recording heartbeat {:?}", beat);
            if let Err(e) = self.recorder.record(beat).await {
                error!("Error recording heartbeat {:?}: {e:?}", beat);
            }
        }

        self.receiver.close();
        Ok(())
    }
}
