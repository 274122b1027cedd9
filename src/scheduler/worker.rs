//! Update worker with statum state machine
//!
//! One worker polls one dimension (axes or buttons) of one joystick.
//!
//! ```text
//! Idle ──► Running ──► Stopping ──► Stopped
//! ```
//!
//! The cancellation token is checked before every sweep and while sleeping. A sweep that
//! already started always runs to completion on the blocking pool.

use super::PollDimension;
use crate::error::WorkerError;
use crate::joystick::Joystick;
use chrono::Local;
use statum::{machine, state};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// States for the worker lifecycle
#[state]
#[derive(Debug, Clone)]
pub enum WorkerState {
    Idle,     // Created, not polling yet
    Running,  // Sweeping and sleeping
    Stopping, // Cancellation observed
    Stopped,  // Done, cycle count final
}

#[machine]
pub struct UpdateWorker<S: WorkerState> {
    joystick: Arc<Joystick>,
    dimension: PollDimension,
    cancel: CancellationToken,
    label: String,
    cycles: u64,
}

impl<S: WorkerState> UpdateWorker<S> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

impl UpdateWorker<Idle> {
    pub fn create(
        joystick: Arc<Joystick>,
        dimension: PollDimension,
        cancel: CancellationToken,
    ) -> Self {
        let label = format!("{}/{}", joystick.name(), dimension);
        debug!("Creating update worker {}", label);
        Self::new(joystick, dimension, cancel, label, 0)
    }

    pub fn start(self) -> UpdateWorker<Running> {
        info!(
            "Starting update worker {} every {:?}",
            self.label,
            self.joystick.wait_time(self.dimension)
        );
        self.transition()
    }
}

impl UpdateWorker<Running> {
    /// Run one sweep of the joystick on the blocking pool
    pub async fn sweep(&mut self) -> Result<usize, WorkerError> {
        let joystick = Arc::clone(&self.joystick);
        let dimension = self.dimension;

        let emitted = tokio::task::spawn_blocking(move || joystick.poll(dimension))
            .await
            .map_err(|e| WorkerError::Task(format!("sweep of {} failed: {}", self.label, e)))??;

        self.cycles += 1;
        Ok(emitted)
    }

    /// Sweep and sleep until the token is cancelled
    ///
    /// A sink error or a panicking sweep cancels the token for every other worker too.
    pub async fn run_until_cancelled(mut self) -> Result<UpdateWorker<Stopping>, WorkerError> {
        let wait = self.joystick.wait_time(self.dimension);

        let mut window_cycles = 0u64;
        let mut window_events = 0usize;
        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::seconds(30);

        loop {
            if self.cancel.is_cancelled() {
                info!("Stop requested for {}", self.label);
                break;
            }

            match self.sweep().await {
                Ok(emitted) => {
                    window_cycles += 1;
                    window_events += emitted;
                }
                Err(e) => {
                    error!("Update worker {} failed: {}", self.label, e);
                    self.cancel.cancel();
                    return Err(e);
                }
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                info!(
                    "Worker {} stats: {} cycles, {} events in {} seconds",
                    self.label,
                    window_cycles,
                    window_events,
                    (now - last_stats_time).num_seconds()
                );
                window_cycles = 0;
                window_events = 0;
                last_stats_time = now;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Stop requested for {}", self.label);
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        Ok(self.transition())
    }
}

impl UpdateWorker<Stopping> {
    pub fn finish(self) -> UpdateWorker<Stopped> {
        info!(
            "Update worker {} stopped after {} cycles",
            self.label, self.cycles
        );
        self.transition()
    }
}

/// Spawn a worker task that runs until `cancel` fires, resolving to its cycle count
pub fn spawn(
    joystick: Arc<Joystick>,
    dimension: PollDimension,
    cancel: CancellationToken,
) -> JoinHandle<Result<u64, WorkerError>> {
    let worker = UpdateWorker::create(joystick, dimension, cancel).start();
    tokio::spawn(async move {
        let stopping = worker.run_until_cancelled().await?;
        Ok(stopping.finish().cycles())
    })
}
