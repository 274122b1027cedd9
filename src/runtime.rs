//! Process-wide context: the joysticks, the shutdown token and the run modes

use crate::config::JoyspyckConfig;
use crate::error::{JoystickError, WorkerError};
use crate::joystick::{Joystick, SinkFactory};
use crate::scheduler::{self, UpdateScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Joyspyck {
    joysticks: Vec<Arc<Joystick>>,
    cancel: CancellationToken,
}

impl Joyspyck {
    /// Build every configured joystick
    pub fn build(
        config: &JoyspyckConfig,
        sink_factory: &dyn SinkFactory,
    ) -> Result<Self, JoystickError> {
        let joysticks = config
            .joysticks
            .iter()
            .map(|js| Joystick::from_config(js, sink_factory).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        if joysticks.is_empty() {
            warn!("Config defines no joysticks");
        }
        Ok(Self::from_joysticks(joysticks))
    }

    pub fn from_joysticks(joysticks: Vec<Arc<Joystick>>) -> Self {
        Self {
            joysticks,
            cancel: CancellationToken::new(),
        }
    }

    pub fn joysticks(&self) -> &[Arc<Joystick>] {
        &self.joysticks
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the token on the first SIGINT
    pub fn install_signal_handler(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => info!("Interrupt received, stopping"),
                    Err(e) => error!("Failed to listen for interrupt: {}", e),
                },
                _ = cancel.cancelled() => return,
            }
            cancel.cancel();
        })
    }

    /// One worker per joystick dimension until cancelled
    pub async fn run_parallel(&self) -> Result<(), WorkerError> {
        let mut scheduler = UpdateScheduler::new(self.joysticks.clone(), self.cancel.clone());
        if scheduler.spawn_workers() == 0 {
            warn!("No sources to poll");
        }
        scheduler.join().await
    }

    /// A single loop sweeping every joystick every `wait`, until cancelled
    pub async fn run_cooperative(&self, wait: Duration) -> Result<(), WorkerError> {
        scheduler::run_cooperative(&self.joysticks, wait, self.cancel.clone()).await
    }
}
