//! Identity and event mapping shared by axis and button sources

use crate::config::ControllerSpec;
use crate::error::ConfigError;
use crate::events::{self, EventKind, EventMapping};

/// Name, type and resolved output events of one configured source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub name: String,
    pub kind: String,
    pub events: Vec<EventMapping>,
}

impl SourceInfo {
    pub fn new(name: &str, kind: &str, events: Vec<EventMapping>) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            events,
        }
    }

    /// Resolve the mapping of an axis controller, all entries must be absolute axes
    pub fn axis(spec: &ControllerSpec) -> Result<Self, ConfigError> {
        let events = resolve(spec, EventKind::Absolute)?;
        Ok(Self::new(&spec.name, &spec.kind, events))
    }

    /// Resolve the mapping of a button controller, all entries must be keys
    pub fn button(spec: &ControllerSpec) -> Result<Self, ConfigError> {
        let events = resolve(spec, EventKind::Key)?;
        Ok(Self::new(&spec.name, &spec.kind, events))
    }

    pub fn mapped_count(&self) -> usize {
        self.events.len()
    }

    /// Reject mappings wider than the device
    pub fn check_capacity(&self, available: usize) -> Result<(), ConfigError> {
        if self.events.len() > available {
            return Err(ConfigError::TooManyMappings {
                controller: self.name.clone(),
                mapped: self.events.len(),
                available,
            });
        }
        Ok(())
    }
}

fn resolve(spec: &ControllerSpec, expected: EventKind) -> Result<Vec<EventMapping>, ConfigError> {
    spec.mapping
        .iter()
        .map(|name| {
            let event =
                events::lookup(name).ok_or_else(|| ConfigError::UnknownEvent(name.clone()))?;
            if event.kind != expected {
                return Err(ConfigError::WrongEventKind {
                    controller: spec.name.clone(),
                    event: name.clone(),
                    expected: match expected {
                        EventKind::Key => "button",
                        EventKind::Absolute => "axis",
                    },
                });
            }
            Ok(match expected {
                EventKind::Key => EventMapping::button(name, event),
                EventKind::Absolute => EventMapping::axis(name, event),
            })
        })
        .collect()
}
