use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use heartbeat::{Heartbeat, HeartbeatModule};
use recorder::{RecordingModule, SessionRecorder};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    storage::period_store::PeriodStoreImpl,
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod heartbeat;
pub mod recorder;
pub mod shutdown;

const DEFAULT_HEARTBEAT_CADENCE: Duration = Duration::from_secs(30);

/// Sessions shorter than this never reach the disk; a quick glance at the
/// machine is not work time.
const DEFAULT_MINIMUM_ACTIVE: chrono::Duration = chrono::Duration::seconds(60);

/// Represents the starting point for the daemon. One daemon run records one
/// work period, extended for as long as the process stays alive.
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    std::env::set_current_dir("/")?;

    let (sender, receiver) = mpsc::channel::<Heartbeat>(10);

    let shutdown_token = CancellationToken::new();

    let heartbeat = create_heartbeat(
        sender,
        &shutdown_token,
        DEFAULT_HEARTBEAT_CADENCE,
        DefaultClock,
    );

    let recording = create_recording(dir.join("records"), receiver, DEFAULT_MINIMUM_ACTIVE)?;

    let (_, heartbeat_result, recording_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        heartbeat.run(),
        recording.run(),
    );

    if let Err(heartbeat_result) = heartbeat_result {
        error!("Heartbeat module got an error {:?}", heartbeat_result);
    }

    if let Err(recording_result) = recording_result {
        error!("Recording module got an error {:?}", recording_result);
    }

    Ok(())
}

fn create_heartbeat(
    sender: mpsc::Sender<Heartbeat>,
    shutdown_token: &CancellationToken,
    cadence: Duration,
    clock: impl Clock,
) -> HeartbeatModule {
    HeartbeatModule::new(sender, shutdown_token.clone(), cadence, Box::new(clock))
}

fn create_recording(
    record_dir: PathBuf,
    receiver: mpsc::Receiver<Heartbeat>,
    minimum_active: chrono::Duration,
) -> Result<RecordingModule<PeriodStoreImpl>, anyhow::Error> {
    let store = PeriodStoreImpl::new(record_dir)?;
    let recorder = SessionRecorder::new(store, minimum_active);
    Ok(RecordingModule::new(receiver, recorder))
}
