//! Polling of joysticks
//!
//! In parallel mode every joystick gets one worker per dimension it has sources for, so
//! each joystick's axis and button intervals are honored independently. The cooperative
//! loop in [`run_cooperative`] sweeps everything on a single fixed interval instead.

pub mod worker;

pub use worker::{UpdateWorker, WorkerState};

use crate::error::WorkerError;
use crate::joystick::Joystick;
use chrono::Local;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Interval of the bounded join
const JOIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The kind of source a worker polls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollDimension {
    Axis,
    Buttons,
}

impl fmt::Display for PollDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollDimension::Axis => write!(f, "axis"),
            PollDimension::Buttons => write!(f, "buttons"),
        }
    }
}

struct WorkerHandle {
    label: String,
    handle: JoinHandle<Result<u64, WorkerError>>,
}

/// Owns the parallel workers of a set of joysticks
pub struct UpdateScheduler {
    joysticks: Vec<Arc<Joystick>>,
    cancel: CancellationToken,
    workers: Vec<WorkerHandle>,
}

impl UpdateScheduler {
    pub fn new(joysticks: Vec<Arc<Joystick>>, cancel: CancellationToken) -> Self {
        Self {
            joysticks,
            cancel,
            workers: Vec::new(),
        }
    }

    /// Spawn a worker for every joystick dimension that has sources
    ///
    /// Returns the number of workers started.
    pub fn spawn_workers(&mut self) -> usize {
        for joystick in &self.joysticks {
            for dimension in [PollDimension::Buttons, PollDimension::Axis] {
                if !joystick.has_sources(dimension) {
                    debug!("{} has no {} sources", joystick.name(), dimension);
                    continue;
                }
                self.workers.push(WorkerHandle {
                    label: format!("{}/{}", joystick.name(), dimension),
                    handle: worker::spawn(Arc::clone(joystick), dimension, self.cancel.clone()),
                });
            }
        }
        info!("Started {} update workers", self.workers.len());
        self.workers.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Ask every worker to stop after its current sweep
    pub fn stop(&self) {
        info!("Stopping {} update workers", self.workers.len());
        self.cancel.cancel();
    }

    /// Wait for every worker to finish
    ///
    /// Waits in 1 second steps and warns for each step a worker is still busy. A worker
    /// blocked in a hardware call keeps this waiting. Returns the first worker error.
    pub async fn join(self) -> Result<(), WorkerError> {
        let mut first_error = None;

        for WorkerHandle { label, mut handle } in self.workers {
            let outcome = loop {
                match tokio::time::timeout(JOIN_POLL_INTERVAL, &mut handle).await {
                    Ok(outcome) => break outcome,
                    Err(_) => warn!("Worker {} is still running", label),
                }
            };

            let result = match outcome {
                Ok(result) => result,
                Err(e) => Err(WorkerError::Task(format!("worker {} panicked: {}", label, e))),
            };
            match result {
                Ok(cycles) => debug!("Worker {} joined after {} cycles", label, cycles),
                Err(e) => {
                    error!("Worker {} ended with error: {}", label, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Sweep every joystick on one loop with a fixed interval until `cancel` fires
pub async fn run_cooperative(
    joysticks: &[Arc<Joystick>],
    wait: Duration,
    cancel: CancellationToken,
) -> Result<(), WorkerError> {
    info!(
        "Polling {} joysticks cooperatively every {:?}",
        joysticks.len(),
        wait
    );

    let mut cycles = 0u64;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let batch = joysticks.to_vec();
        let swept = tokio::task::spawn_blocking(move || {
            batch.iter().try_for_each(|joystick| joystick.update())
        })
        .await
        .map_err(|e| WorkerError::Task(format!("cooperative sweep failed: {}", e)))?;
        if let Err(e) = swept {
            error!("Cooperative loop failed: {}", e);
            cancel.cancel();
            return Err(e.into());
        }
        cycles += 1;

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            info!(
                "Cooperative loop stats: {} cycles in {} seconds",
                cycles,
                (now - last_stats_time).num_seconds()
            );
            cycles = 0;
            last_stats_time = now;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    info!("Cooperative loop stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JoyspyckConfig;
    use crate::error::SinkError;
    use crate::events::{EventCode, EventMapping};
    use crate::joystick::{EventSink, SinkFactory};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(Arc<AtomicUsize>);

    impl EventSink for CountingSink {
        fn emit(&mut self, _event: EventCode, _value: i32, _sync: bool) -> Result<(), SinkError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn emit(&mut self, _event: EventCode, _value: i32, _sync: bool) -> Result<(), SinkError> {
            Err(SinkError::EmitEvent(std::io::Error::other("device gone")))
        }
    }

    #[derive(Default)]
    struct Factory {
        emitted: Arc<AtomicUsize>,
        failing: bool,
    }

    impl SinkFactory for Factory {
        fn create_device(
            &self,
            _name: &str,
            _events: &[EventMapping],
        ) -> Result<Box<dyn EventSink>, SinkError> {
            if self.failing {
                return Ok(Box::new(FailingSink));
            }
            Ok(Box::new(CountingSink(self.emitted.clone())))
        }
    }

    fn joysticks(json: &str, factory: &Factory) -> Vec<Arc<Joystick>> {
        JoyspyckConfig::from_json(json)
            .unwrap()
            .joysticks
            .iter()
            .map(|c| Arc::new(Joystick::from_config(c, factory).unwrap()))
            .collect()
    }

    const TWO_JOYSTICKS: &str = r#"[
        {"name": "a", "waitTimeAxis": 0.005, "axisControllers": [
            {"name": "noise", "type": "Dummy", "options": {}, "mapping": ["ABS_X"]}
        ]},
        {"name": "b", "waitTimeAxis": 0.005, "waitTimeButtons": 0.005,
         "axisControllers": [
            {"name": "noise", "type": "Dummy", "options": {}, "mapping": ["ABS_X", "ABS_Y"]}
         ],
         "buttonControllers": [
            {"name": "pad", "type": "Dummy", "options": {}, "mapping": ["BTN_0"]}
         ]}
    ]"#;

    #[tokio::test]
    async fn one_worker_per_populated_dimension() {
        let factory = Factory::default();
        let mut scheduler =
            UpdateScheduler::new(joysticks(TWO_JOYSTICKS, &factory), CancellationToken::new());
        assert_eq!(scheduler.spawn_workers(), 3);
        assert_eq!(scheduler.worker_count(), 3);

        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop();
        scheduler.join().await.unwrap();
        assert!(factory.emitted.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn nothing_is_emitted_after_stop() {
        let factory = Factory::default();
        let mut scheduler =
            UpdateScheduler::new(joysticks(TWO_JOYSTICKS, &factory), CancellationToken::new());
        scheduler.spawn_workers();

        tokio::time::sleep(Duration::from_millis(30)).await;
        scheduler.stop();
        scheduler.join().await.unwrap();

        let after_join = factory.emitted.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(factory.emitted.load(Ordering::SeqCst), after_join);
    }

    #[tokio::test]
    async fn sink_errors_stop_every_worker() {
        let factory = Factory {
            failing: true,
            ..Factory::default()
        };
        let cancel = CancellationToken::new();
        let mut scheduler = UpdateScheduler::new(joysticks(TWO_JOYSTICKS, &factory), cancel.clone());
        scheduler.spawn_workers();

        let result = scheduler.join().await;
        assert!(matches!(result, Err(WorkerError::Sink(_))));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cooperative_loop_runs_until_cancelled() {
        let factory = Factory::default();
        let sticks = joysticks(TWO_JOYSTICKS, &factory);
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            stopper.cancel();
        });

        run_cooperative(&sticks, Duration::from_millis(5), cancel)
            .await
            .unwrap();
        assert!(factory.emitted.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_does_not_sweep() {
        let factory = Factory::default();
        let sticks = joysticks(TWO_JOYSTICKS, &factory);
        let cancel = CancellationToken::new();
        cancel.cancel();

        run_cooperative(&sticks, Duration::from_millis(5), cancel)
            .await
            .unwrap();
        assert_eq!(factory.emitted.load(Ordering::SeqCst), 0);
    }
}
