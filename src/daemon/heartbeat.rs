use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::utils::clock::Clock;

/// A tick noting that the machine was being worked at `moment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub moment: DateTime<Utc>,
}

/// Emits a [Heartbeat] at a fixed cadence for as long as the daemon runs.
/// The recorder on the other side of the channel turns the tick sequence
/// into one stored work period.
pub struct HeartbeatModule {
    next: mpsc::Sender<Heartbeat>,
    shutdown: CancellationToken,
    cadence: Duration,
    clock: Box<dyn Clock>,
}

impl HeartbeatModule {
    pub fn new(
        next: mpsc::Sender<Heartbeat>,
        shutdown: CancellationToken,
        cadence: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            shutdown,
            cadence,
            clock,
        }
    }

    /// Executes the heartbeat event loop.
    pub async fn run(self) -> Result<()> {
        let mut tick_point = self.clock.instant();
        loop {
            tick_point += self.cadence;

            let beat = Heartbeat {
                moment: self.clock.time(),
            };
            debug!("Sending heartbeat {:?}", beat);
            if self.next.send(beat).await.is_err() {
                // The recording side is gone, so there is nothing left to
                // tick for.
                return Ok(());
            }

            tokio::select! {
                // Cancelation stops the event loop, which also drops the
                // sender channel and consequently stops the recording module.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(tick_point) => ()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use chrono::Utc;
    use tokio::{sync::mpsc, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::utils::clock::MockClock;

    use super::{Heartbeat, HeartbeatModule};

    #[tokio::test]
    async fn heartbeats_flow_until_cancelled() -> Result<()> {
        let mut clock = MockClock::new();
        clock.expect_instant().returning(Instant::now);
        clock.expect_time().returning(Utc::now);
        clock.expect_sleep_until().returning(|_| ());

        let (sender, mut receiver) = mpsc::channel::<Heartbeat>(4);
        let shutdown = CancellationToken::new();
        let module = HeartbeatModule::new(
            sender,
            shutdown.clone(),
            Duration::from_millis(10),
            Box::new(clock),
        );
        let running = tokio::spawn(module.run());

        for _ in 0..3 {
            receiver.recv().await.expect("heartbeat stream ended early");
        }

        shutdown.cancel();
        drop(receiver);
        running.await??;
        Ok(())
    }
}
