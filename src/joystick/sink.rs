//! Output side of a joystick: the virtual input device events are written to

use crate::error::SinkError;
use crate::events::{EventCode, EventKind, EventMapping};
use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, UinputAbsSetup,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// Receives the events of one joystick
pub trait EventSink: Send {
    /// Queue `value` for `event`, `sync` ends the batch and makes it visible
    fn emit(&mut self, event: EventCode, value: i32, sync: bool) -> Result<(), SinkError>;
}

/// Creates the sink of a joystick from its ordered event list
pub trait SinkFactory {
    fn create_device(
        &self,
        name: &str,
        events: &[EventMapping],
    ) -> Result<Box<dyn EventSink>, SinkError>;
}

/// Creates uinput virtual devices
#[derive(Debug, Default, Clone, Copy)]
pub struct UinputFactory;

impl SinkFactory for UinputFactory {
    fn create_device(
        &self,
        name: &str,
        events: &[EventMapping],
    ) -> Result<Box<dyn EventSink>, SinkError> {
        Ok(Box::new(UinputSink::new(name, events)?))
    }
}

/// A uinput virtual joystick
pub struct UinputSink {
    device: VirtualDevice,
    registered: HashSet<EventCode>,
    pending: Vec<InputEvent>,
}

impl UinputSink {
    pub fn new(name: &str, events: &[EventMapping]) -> Result<Self, SinkError> {
        let mut builder = VirtualDeviceBuilder::new()
            .map_err(SinkError::CreateDevice)?
            .name(name);

        let mut keys = AttributeSet::<Key>::new();
        for mapping in events.iter().filter(|m| m.event.kind == EventKind::Key) {
            keys.insert(Key::new(mapping.event.code));
        }
        if keys.iter().next().is_some() {
            builder = builder
                .with_keys(&keys)
                .map_err(SinkError::CreateDevice)?;
        }

        for mapping in events.iter().filter(|m| m.event.kind == EventKind::Absolute) {
            let setup = UinputAbsSetup::new(
                AbsoluteAxisType(mapping.event.code),
                AbsInfo::new(0, mapping.min, mapping.max, mapping.fuzz, mapping.flat, 0),
            );
            builder = builder
                .with_absolute_axis(&setup)
                .map_err(SinkError::CreateDevice)?;
        }

        let device = builder.build().map_err(SinkError::CreateDevice)?;
        info!(
            "Created virtual device {:?} with {} events",
            name,
            events.len()
        );

        Ok(Self {
            device,
            registered: events.iter().map(|m| m.event).collect(),
            pending: Vec::new(),
        })
    }
}

impl EventSink for UinputSink {
    fn emit(&mut self, event: EventCode, value: i32, sync: bool) -> Result<(), SinkError> {
        if !self.registered.contains(&event) {
            return Err(SinkError::UnsupportedEvent(event.to_string()));
        }

        let kind = match event.kind {
            EventKind::Key => EventType::KEY,
            EventKind::Absolute => EventType::ABSOLUTE,
        };
        self.pending.push(InputEvent::new(kind, event.code, value));

        if sync {
            debug!("Flushing {} events", self.pending.len());
            // VirtualDevice::emit appends the SYN_REPORT
            let written = self.device.emit(&self.pending);
            self.pending.clear();
            written.map_err(SinkError::EmitEvent)?;
        }
        Ok(())
    }
}
