//! Background auto-sync.
//!
//! [`AutoSync`] owns a tokio task that runs one cycle per interval tick
//! (the first tick fires immediately) and on demand. It belongs to the host
//! process, not to any UI component.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{SyncEngine, SyncOutcome};
use crate::store::RemoteStore;

/// Queued commands before `sync_now` waits.
const COMMAND_BUFFER: usize = 16;

/// Undelivered outcomes kept for a slow host. Further outcomes are dropped.
pub const OUTCOME_BUFFER: usize = 16;

/// Scheduler errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The worker task has already exited.
    #[error("auto-sync worker stopped")]
    Stopped,
}

/// Commands for the auto-sync worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Run a cycle now. Dropped if one is already running.
    SyncNow,
    /// Stop the worker, cancelling any running cycle.
    Stop,
}

/// Handle to a running auto-sync worker.
#[derive(Debug)]
pub struct AutoSync {
    sender: mpsc::Sender<SchedulerCommand>,
    handle: JoinHandle<()>,
}

impl AutoSync {
    /// Spawn the worker.
    ///
    /// Returns the handle and a stream of cycle outcomes. The stream holds
    /// at most [`OUTCOME_BUFFER`] undelivered outcomes; newer ones are
    /// dropped until the host catches up. Dropping the receiver is fine.
    pub fn start<S>(
        engine: Arc<SyncEngine<S>>,
        period: Duration,
    ) -> (Self, mpsc::Receiver<SyncOutcome>)
    where
        S: RemoteStore + 'static,
    {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (outcomes_tx, outcomes_rx) = mpsc::channel(OUTCOME_BUFFER);

        let handle = tokio::spawn(run(engine, period, receiver, outcomes_tx));
        info!(period_secs = period.as_secs(), "auto-sync started");

        (Self { sender, handle }, outcomes_rx)
    }

    /// Request an immediate cycle.
    pub async fn sync_now(&self) -> Result<(), SchedulerError> {
        self.sender
            .send(SchedulerCommand::SyncNow)
            .await
            .map_err(|_| SchedulerError::Stopped)
    }

    /// Whether the worker is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the worker and wait for it to exit.
    pub async fn stop(self) {
        if self.sender.send(SchedulerCommand::Stop).await.is_err() {
            debug!("auto-sync worker already gone");
        }
        if let Err(e) = self.handle.await {
            warn!(error = %e, "auto-sync worker panicked");
        }
    }
}

async fn run<S: RemoteStore + 'static>(
    engine: Arc<SyncEngine<S>>,
    period: Duration,
    mut commands: mpsc::Receiver<SchedulerCommand>,
    outcomes: mpsc::Sender<SyncOutcome>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => debug!("auto-sync tick"),
            cmd = commands.recv() => match cmd {
                Some(SchedulerCommand::SyncNow) => debug!("manual sync requested"),
                Some(SchedulerCommand::Stop) | None => break,
            },
        }

        let cycle = engine.sync();
        tokio::pin!(cycle);

        let outcome = loop {
            tokio::select! {
                outcome = &mut cycle => break Some(outcome),
                cmd = commands.recv() => match cmd {
                    Some(SchedulerCommand::SyncNow) => {
                        info!("sync already in progress, manual trigger dropped");
                    }
                    Some(SchedulerCommand::Stop) | None => {
                        info!("auto-sync stopping, cancelling running cycle");
                        break None;
                    }
                },
            }
        };

        let Some(outcome) = outcome else {
            break;
        };
        // The cycle result is already logged.
        match outcomes.try_send(outcome) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => debug!("outcome buffer full, outcome dropped"),
        }
    }

    info!("auto-sync stopped");
}
