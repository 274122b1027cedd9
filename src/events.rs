//! Input event names and codes
//!
//! Controllers reference output events by their Linux input names (`"ABS_X"`, `"BTN_0"`,
//! `"KEY_A"`). This module resolves those names to `(kind, code)` pairs and defines the
//! per-event entry the virtual device is built from.

use std::fmt;

/// Range advertised for every absolute axis on the virtual device
pub const AXIS_EVENT_MIN: i32 = -32766;
pub const AXIS_EVENT_MAX: i32 = 32766;

/// Kind of input event, mirrors `EV_KEY` / `EV_ABS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Key,
    Absolute,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Key => write!(f, "key"),
            EventKind::Absolute => write!(f, "absolute axis"),
        }
    }
}

/// A resolved input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventCode {
    pub kind: EventKind,
    pub code: u16,
}

impl EventCode {
    pub const fn key(code: u16) -> Self {
        Self {
            kind: EventKind::Key,
            code,
        }
    }

    pub const fn absolute(code: u16) -> Self {
        Self {
            kind: EventKind::Absolute,
            code,
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::Key => write!(f, "EV_KEY:{:#05x}", self.code),
            EventKind::Absolute => write!(f, "EV_ABS:{:#04x}", self.code),
        }
    }
}

/// One output event wired to a source input
///
/// Order of these entries inside a joystick is the emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMapping {
    pub name: String,
    pub event: EventCode,
    pub min: i32,
    pub max: i32,
    pub flat: i32,
    pub fuzz: i32,
}

impl EventMapping {
    /// Mapping entry for an absolute axis with the standard virtual range
    pub fn axis(name: &str, event: EventCode) -> Self {
        Self {
            name: name.to_string(),
            event,
            min: AXIS_EVENT_MIN,
            max: AXIS_EVENT_MAX,
            flat: 0,
            fuzz: 0,
        }
    }

    /// Mapping entry for a binary button
    pub fn button(name: &str, event: EventCode) -> Self {
        Self {
            name: name.to_string(),
            event,
            min: 0,
            max: 1,
            flat: 0,
            fuzz: 0,
        }
    }
}

const ABS_EVENTS: &[(&str, u16)] = &[
    ("ABS_X", 0x00),
    ("ABS_Y", 0x01),
    ("ABS_Z", 0x02),
    ("ABS_RX", 0x03),
    ("ABS_RY", 0x04),
    ("ABS_RZ", 0x05),
    ("ABS_THROTTLE", 0x06),
    ("ABS_RUDDER", 0x07),
    ("ABS_WHEEL", 0x08),
    ("ABS_GAS", 0x09),
    ("ABS_BRAKE", 0x0a),
    ("ABS_HAT0X", 0x10),
    ("ABS_HAT0Y", 0x11),
    ("ABS_HAT1X", 0x12),
    ("ABS_HAT1Y", 0x13),
    ("ABS_HAT2X", 0x14),
    ("ABS_HAT2Y", 0x15),
    ("ABS_HAT3X", 0x16),
    ("ABS_HAT3Y", 0x17),
    ("ABS_PRESSURE", 0x18),
    ("ABS_DISTANCE", 0x19),
    ("ABS_TILT_X", 0x1a),
    ("ABS_TILT_Y", 0x1b),
    ("ABS_TOOL_WIDTH", 0x1c),
    ("ABS_VOLUME", 0x20),
    ("ABS_MISC", 0x28),
];

const KEY_EVENTS: &[(&str, u16)] = &[
    ("KEY_ESC", 1),
    ("KEY_ENTER", 28),
    ("KEY_SPACE", 57),
    ("KEY_UP", 103),
    ("KEY_LEFT", 105),
    ("KEY_RIGHT", 106),
    ("KEY_DOWN", 108),
    ("KEY_Q", 16),
    ("KEY_W", 17),
    ("KEY_E", 18),
    ("KEY_R", 19),
    ("KEY_T", 20),
    ("KEY_Y", 21),
    ("KEY_U", 22),
    ("KEY_I", 23),
    ("KEY_O", 24),
    ("KEY_P", 25),
    ("KEY_A", 30),
    ("KEY_S", 31),
    ("KEY_D", 32),
    ("KEY_F", 33),
    ("KEY_G", 34),
    ("KEY_H", 35),
    ("KEY_J", 36),
    ("KEY_K", 37),
    ("KEY_L", 38),
    ("KEY_Z", 44),
    ("KEY_X", 45),
    ("KEY_C", 46),
    ("KEY_V", 47),
    ("KEY_B", 48),
    ("KEY_N", 49),
    ("KEY_M", 50),
    ("BTN_LEFT", 0x110),
    ("BTN_RIGHT", 0x111),
    ("BTN_MIDDLE", 0x112),
    ("BTN_SIDE", 0x113),
    ("BTN_EXTRA", 0x114),
    ("BTN_FORWARD", 0x115),
    ("BTN_BACK", 0x116),
    ("BTN_TASK", 0x117),
    ("BTN_TRIGGER", 0x120),
    ("BTN_THUMB", 0x121),
    ("BTN_THUMB2", 0x122),
    ("BTN_TOP", 0x123),
    ("BTN_TOP2", 0x124),
    ("BTN_PINKIE", 0x125),
    ("BTN_BASE", 0x126),
    ("BTN_BASE2", 0x127),
    ("BTN_BASE3", 0x128),
    ("BTN_BASE4", 0x129),
    ("BTN_BASE5", 0x12a),
    ("BTN_BASE6", 0x12b),
    ("BTN_DEAD", 0x12f),
    ("BTN_A", 0x130),
    ("BTN_SOUTH", 0x130),
    ("BTN_B", 0x131),
    ("BTN_EAST", 0x131),
    ("BTN_C", 0x132),
    ("BTN_X", 0x133),
    ("BTN_NORTH", 0x133),
    ("BTN_Y", 0x134),
    ("BTN_WEST", 0x134),
    ("BTN_Z", 0x135),
    ("BTN_TL", 0x136),
    ("BTN_TR", 0x137),
    ("BTN_TL2", 0x138),
    ("BTN_TR2", 0x139),
    ("BTN_SELECT", 0x13a),
    ("BTN_START", 0x13b),
    ("BTN_MODE", 0x13c),
    ("BTN_THUMBL", 0x13d),
    ("BTN_THUMBR", 0x13e),
    ("BTN_DPAD_UP", 0x220),
    ("BTN_DPAD_DOWN", 0x221),
    ("BTN_DPAD_LEFT", 0x222),
    ("BTN_DPAD_RIGHT", 0x223),
];

/// `BTN_0` .. `BTN_9`
const BTN_MISC_BASE: u16 = 0x100;
/// `BTN_TRIGGER_HAPPY1` .. `BTN_TRIGGER_HAPPY40`
const BTN_TRIGGER_HAPPY_BASE: u16 = 0x2c0;

/// Resolve an event name to its code
pub fn lookup(name: &str) -> Option<EventCode> {
    if let Some(&(_, code)) = ABS_EVENTS.iter().find(|(n, _)| *n == name) {
        return Some(EventCode::absolute(code));
    }
    if let Some(&(_, code)) = KEY_EVENTS.iter().find(|(n, _)| *n == name) {
        return Some(EventCode::key(code));
    }

    if let Some(n) = name.strip_prefix("BTN_TRIGGER_HAPPY") {
        return match n.parse::<u16>() {
            Ok(n @ 1..=40) => Some(EventCode::key(BTN_TRIGGER_HAPPY_BASE + n - 1)),
            _ => None,
        };
    }
    if let Some(n) = name.strip_prefix("BTN_") {
        if n.len() == 1 {
            if let Ok(n @ 0..=9) = n.parse::<u16>() {
                return Some(EventCode::key(BTN_MISC_BASE + n));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_axis_names() {
        assert_eq!(lookup("ABS_X"), Some(EventCode::absolute(0x00)));
        assert_eq!(lookup("ABS_RZ"), Some(EventCode::absolute(0x05)));
        assert_eq!(lookup("ABS_HAT0Y"), Some(EventCode::absolute(0x11)));
    }

    #[test]
    fn resolves_numbered_buttons() {
        assert_eq!(lookup("BTN_0"), Some(EventCode::key(0x100)));
        assert_eq!(lookup("BTN_9"), Some(EventCode::key(0x109)));
        assert_eq!(lookup("BTN_TRIGGER_HAPPY1"), Some(EventCode::key(0x2c0)));
        assert_eq!(lookup("BTN_TRIGGER_HAPPY40"), Some(EventCode::key(0x2e7)));
    }

    #[test]
    fn aliases_share_codes() {
        assert_eq!(lookup("BTN_A"), lookup("BTN_SOUTH"));
        assert_eq!(lookup("BTN_Y"), lookup("BTN_WEST"));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(lookup("BTN_10"), None);
        assert_eq!(lookup("BTN_TRIGGER_HAPPY0"), None);
        assert_eq!(lookup("BTN_TRIGGER_HAPPY41"), None);
        assert_eq!(lookup("abs_x"), None);
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn axis_mapping_uses_virtual_range() {
        let m = EventMapping::axis("ABS_X", EventCode::absolute(0));
        assert_eq!((m.min, m.max, m.flat, m.fuzz), (-32766, 32766, 0, 0));
    }
}
