//! The joystick aggregator
//!
//! A [`Joystick`] owns the axis and button sources configured for one virtual device
//! together with that device's sink. Each update sweeps one kind of source, reconnects
//! sources whose reads fail and writes the results to the sink.

pub mod sink;

pub use sink::{EventSink, SinkFactory, UinputFactory, UinputSink};

use crate::axis::{create_axis_source, AxisSource};
use crate::button::{create_button_source, ButtonSource, ButtonStatus};
use crate::config::JoystickConfig;
use crate::error::{ConnectError, JoystickError, SinkError};
use crate::events::{EventCode, EventMapping};
use crate::scheduler::PollDimension;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A button source with the last state seen for each of its buttons
struct ButtonSlot {
    source: Box<dyn ButtonSource>,
    last_state: Vec<ButtonStatus>,
}

impl ButtonSlot {
    fn new(source: Box<dyn ButtonSource>) -> Self {
        let last_state = vec![ButtonStatus::Unpressed; source.button_count()];
        Self { source, last_state }
    }

    /// Previous state of `index`, growing the state vector if the device widened
    fn last_state_mut(&mut self, index: usize) -> &mut ButtonStatus {
        if index >= self.last_state.len() {
            self.last_state.resize(index + 1, ButtonStatus::Unpressed);
        }
        &mut self.last_state[index]
    }
}

/// Poll intervals of one joystick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub axis: Duration,
    pub buttons: Duration,
}

pub struct Joystick {
    name: String,
    intervals: PollIntervals,
    events: Vec<EventMapping>,
    axis_sources: Mutex<Vec<Box<dyn AxisSource>>>,
    button_sources: Mutex<Vec<ButtonSlot>>,
    sink: Mutex<Box<dyn EventSink>>,
    axis_source_count: usize,
    button_source_count: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panicking sweep leaves the sources in a readable state
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn log_connect(kind: &str, name: &str, result: Result<(), ConnectError>) {
    match result {
        Ok(()) => debug!("{} source {} connected", kind, name),
        Err(e) => error!("Failed to connect {} source {}: {}", kind, name, e),
    }
}

impl Joystick {
    /// Connect every source once and create the sink
    ///
    /// Sources that fail to connect are kept and retried after their first failed read.
    pub fn new(
        name: &str,
        intervals: PollIntervals,
        mut axis_sources: Vec<Box<dyn AxisSource>>,
        mut button_sources: Vec<Box<dyn ButtonSource>>,
        sink_factory: &dyn SinkFactory,
    ) -> Result<Self, SinkError> {
        info!(
            "Creating joystick {} with {} button and {} axis sources",
            name,
            button_sources.len(),
            axis_sources.len()
        );

        for source in button_sources.iter_mut() {
            let result = source.connect();
            log_connect("button", &source.info().name, result);
        }
        for source in axis_sources.iter_mut() {
            let result = source.connect();
            log_connect("axis", &source.info().name, result);
        }

        // buttons first, then axes, each in config order
        let events: Vec<EventMapping> = button_sources
            .iter()
            .flat_map(|s| s.info().events.iter().cloned())
            .chain(axis_sources.iter().flat_map(|s| s.info().events.iter().cloned()))
            .collect();
        let sink = sink_factory.create_device(name, &events)?;

        Ok(Self {
            name: name.to_string(),
            intervals,
            events,
            axis_source_count: axis_sources.len(),
            button_source_count: button_sources.len(),
            axis_sources: Mutex::new(axis_sources),
            button_sources: Mutex::new(button_sources.into_iter().map(ButtonSlot::new).collect()),
            sink: Mutex::new(sink),
        })
    }

    /// Build every configured source and the sink
    pub fn from_config(
        config: &JoystickConfig,
        sink_factory: &dyn SinkFactory,
    ) -> Result<Self, JoystickError> {
        let button_sources = config
            .button_controllers
            .iter()
            .map(|c| create_button_source(&c.validate()?))
            .collect::<Result<Vec<_>, _>>()?;
        let axis_sources = config
            .axis_controllers
            .iter()
            .map(|c| create_axis_source(&c.validate()?))
            .collect::<Result<Vec<_>, _>>()?;

        let intervals = PollIntervals {
            axis: config.axis_interval()?,
            buttons: config.button_interval()?,
        };

        Ok(Self::new(
            &config.name,
            intervals,
            axis_sources,
            button_sources,
            sink_factory,
        )?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output events in emission order
    pub fn events(&self) -> &[EventMapping] {
        &self.events
    }

    pub fn intervals(&self) -> PollIntervals {
        self.intervals
    }

    pub fn wait_time(&self, dimension: PollDimension) -> Duration {
        match dimension {
            PollDimension::Axis => self.intervals.axis,
            PollDimension::Buttons => self.intervals.buttons,
        }
    }

    pub fn has_axis_sources(&self) -> bool {
        self.axis_source_count > 0
    }

    pub fn has_button_sources(&self) -> bool {
        self.button_source_count > 0
    }

    pub fn has_sources(&self, dimension: PollDimension) -> bool {
        match dimension {
            PollDimension::Axis => self.has_axis_sources(),
            PollDimension::Buttons => self.has_button_sources(),
        }
    }

    /// Read every mapped axis and emit the values as one batch
    ///
    /// Failed reads trigger a reconnect of their source and are skipped. The last value
    /// written carries the sync flag. Returns the number of events written.
    pub fn update_axis(&self) -> Result<usize, SinkError> {
        let mut batch: Vec<(EventCode, i32)> = Vec::new();
        {
            let mut sources = lock(&self.axis_sources);
            for source in sources.iter_mut() {
                for index in 0..source.mapped_count() {
                    match source.axis_value(index) {
                        Ok(value) => {
                            let event = source.info().events[index].event;
                            batch.push((event, value as i32));
                        }
                        Err(e) => {
                            warn!(
                                "Reading axis {} of {} failed: {}, reconnecting",
                                index,
                                source.info().name,
                                e
                            );
                            let result = source.connect();
                            log_connect("axis", &source.info().name, result);
                        }
                    }
                }
            }
        }

        let count = batch.len();
        let mut sink = lock(&self.sink);
        for (i, (event, value)) in batch.into_iter().enumerate() {
            sink.emit(event, value, i + 1 == count)?;
        }
        debug!("{}: emitted {} axis values", self.name, count);
        Ok(count)
    }

    /// Read every mapped button and emit the ones whose state changed
    ///
    /// Returns the number of events written.
    pub fn update_buttons(&self) -> Result<usize, SinkError> {
        let mut emitted = 0;
        let mut slots = lock(&self.button_sources);

        for slot in slots.iter_mut() {
            for index in 0..slot.source.mapped_count() {
                let status = match slot.source.button_status(index) {
                    Ok(ButtonStatus::Unknown) => {
                        warn!(
                            "Button {} of {} has no state, reconnecting",
                            index,
                            slot.source.info().name
                        );
                        None
                    }
                    Ok(status) => Some(status),
                    Err(e) => {
                        warn!(
                            "Reading button {} of {} failed: {}, reconnecting",
                            index,
                            slot.source.info().name,
                            e
                        );
                        None
                    }
                };

                let Some(status) = status else {
                    let result = slot.source.connect();
                    log_connect("button", &slot.source.info().name, result);
                    continue;
                };

                let event = slot.source.info().events[index].event;
                let last = slot.last_state_mut(index);
                if *last == status {
                    continue;
                }
                *last = status;

                if let Some(value) = status.event_value() {
                    debug!("{}: {} -> {}", self.name, event, value);
                    lock(&self.sink).emit(event, value, true)?;
                    emitted += 1;
                }
            }
        }
        Ok(emitted)
    }

    /// Sweep axes then buttons, used by the cooperative loop
    pub fn update(&self) -> Result<(), SinkError> {
        self.update_axis()?;
        self.update_buttons()?;
        Ok(())
    }

    /// Sweep one dimension
    pub fn poll(&self, dimension: PollDimension) -> Result<usize, SinkError> {
        match dimension {
            PollDimension::Axis => self.update_axis(),
            PollDimension::Buttons => self.update_buttons(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JoyspyckConfig;
    use crate::error::ConfigError;
    use std::sync::Arc;

    type Emitted = Arc<Mutex<Vec<(EventCode, i32, bool)>>>;

    struct RecordingSink(Emitted);

    impl EventSink for RecordingSink {
        fn emit(&mut self, event: EventCode, value: i32, sync: bool) -> Result<(), SinkError> {
            self.0.lock().unwrap().push((event, value, sync));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        emitted: Emitted,
        created: Arc<Mutex<Vec<(String, Vec<EventMapping>)>>>,
    }

    impl SinkFactory for RecordingFactory {
        fn create_device(
            &self,
            name: &str,
            events: &[EventMapping],
        ) -> Result<Box<dyn EventSink>, SinkError> {
            self.created
                .lock()
                .unwrap()
                .push((name.to_string(), events.to_vec()));
            Ok(Box::new(RecordingSink(self.emitted.clone())))
        }
    }

    fn dummy_config() -> JoystickConfig {
        JoyspyckConfig::from_json(
            r#"[{
                "name": "Bench",
                "waitTimeAxis": "0.1",
                "buttonControllers": [
                    {"name": "pad", "type": "Dummy", "options": {}, "mapping": ["BTN_0", "BTN_1"]}
                ],
                "axisControllers": [
                    {"name": "noise", "type": "Dummy", "options": {}, "mapping": ["ABS_X", "ABS_Y", "ABS_Z"]}
                ]
            }]"#,
        )
        .unwrap()
        .joysticks
        .remove(0)
    }

    #[test]
    fn builds_from_config_with_buttons_first() {
        let factory = RecordingFactory::default();
        let joystick = Joystick::from_config(&dummy_config(), &factory).unwrap();

        let names: Vec<_> = joystick.events().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["BTN_0", "BTN_1", "ABS_X", "ABS_Y", "ABS_Z"]);
        assert_eq!(joystick.wait_time(PollDimension::Axis), Duration::from_millis(100));
        assert_eq!(joystick.wait_time(PollDimension::Buttons), Duration::from_millis(50));

        let created = factory.created.lock().unwrap();
        assert_eq!(created[0].0, "Bench");
        assert_eq!(created[0].1.len(), 5);
    }

    #[test]
    fn dummy_axis_sweep_syncs_once() {
        let factory = RecordingFactory::default();
        let joystick = Joystick::from_config(&dummy_config(), &factory).unwrap();

        assert_eq!(joystick.update_axis().unwrap(), 3);
        let emitted = factory.emitted.lock().unwrap();
        let syncs: Vec<bool> = emitted.iter().map(|(_, _, sync)| *sync).collect();
        assert_eq!(syncs, [false, false, true]);
        assert!(emitted.iter().all(|(_, v, _)| (-32765..=32765).contains(v)));
    }

    #[test]
    fn config_errors_are_fatal() {
        let mut config = dummy_config();
        config.axis_controllers[0].kind = Some("Theremin".into());
        let err = Joystick::from_config(&config, &RecordingFactory::default()).err();
        assert!(matches!(
            err,
            Some(JoystickError::Config(ConfigError::UnknownType { .. }))
        ));
    }

    #[test]
    fn missing_hardware_does_not_fail_construction() {
        let config = JoyspyckConfig::from_json(
            r#"[{
                "axisControllers": [
                    {"name": "adc", "type": "ADS1115", "options": {"busnum": 250}, "mapping": ["ABS_X"]}
                ]
            }]"#,
        )
        .unwrap();
        let factory = RecordingFactory::default();
        let joystick = Joystick::from_config(&config.joysticks[0], &factory).unwrap();

        assert!(joystick.has_axis_sources());
        assert!(!joystick.has_button_sources());
        assert_eq!(joystick.update_axis().unwrap(), 0);
        assert!(factory.emitted.lock().unwrap().is_empty());
    }
}
