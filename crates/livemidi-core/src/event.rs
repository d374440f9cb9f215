//! MIDI channel events with beat-relative timing.
//!
//! An [`Event`] is one channel message (`noteon`, `noteoff`, `sustainon`,
//! `sustainoff`) plus an `after` delay and a `hold` duration, both in
//! beats. On-events know their paired off-event and share a
//! [`TrackingKey`] with it.

use crate::error::{Error, Result};
use crate::timing::Timing;
use std::fmt;
use std::str::FromStr;

/// Default velocity for note-on events.
pub const DEFAULT_VELOCITY: u8 = 98;

/// Controller number of the sustain pedal.
pub const SUSTAIN_CONTROLLER: u8 = 64;

/// Supported channel events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventType {
    NoteOn,
    NoteOff,
    SustainOn,
    SustainOff,
}

impl EventType {
    /// Status byte for channel 0.
    pub fn status(self) -> u8 {
        match self {
            EventType::NoteOn => 144,
            EventType::NoteOff => 128,
            EventType::SustainOn | EventType::SustainOff => 176,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::NoteOn => "noteon",
            EventType::NoteOff => "noteoff",
            EventType::SustainOn => "sustainon",
            EventType::SustainOff => "sustainoff",
        }
    }

    pub fn is_on(self) -> bool {
        matches!(self, EventType::NoteOn | EventType::SustainOn)
    }

    pub fn is_off(self) -> bool {
        matches!(self, EventType::NoteOff | EventType::SustainOff)
    }

    /// The on type an event of this type pairs with.
    pub fn on_type(self) -> EventType {
        match self {
            EventType::NoteOn | EventType::NoteOff => EventType::NoteOn,
            EventType::SustainOn | EventType::SustainOff => EventType::SustainOn,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "noteon" => Ok(EventType::NoteOn),
            "noteoff" => Ok(EventType::NoteOff),
            "sustainon" => Ok(EventType::SustainOn),
            "sustainoff" => Ok(EventType::SustainOff),
            other => Err(Error::UnsupportedEvent(other.to_string())),
        }
    }
}

/// Correlates an on-event with its off-event: `channel|type|data`,
/// always carrying the on type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackingKey {
    pub channel: u8,
    pub kind: EventType,
    pub data: u8,
}

impl TrackingKey {
    /// The event that silences whatever this key tracks.
    pub fn off_event(&self) -> Event {
        match self.kind {
            EventType::SustainOn | EventType::SustainOff => Event::sustain_off(self.channel),
            EventType::NoteOn | EventType::NoteOff => Event::note_off(self.channel, self.data),
        }
    }
}

impl fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.channel, self.kind, self.data)
    }
}

/// Optional event fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventOptions {
    pub data: u8,
    pub velocity: u8,
    /// Delay before sending, in beats.
    pub after: f64,
    /// How long to hold before the paired off-event, in beats.
    pub hold: f64,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            data: 0,
            velocity: DEFAULT_VELOCITY,
            after: 0.0,
            hold: 0.0,
        }
    }
}

/// A MIDI channel message with timing metadata.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    kind: EventType,
    channel: u8,
    data: u8,
    velocity: u8,
    after: f64,
    hold: f64,
}

/// Clamp `value` to `max`, warning when it was out of range.
fn clamp_byte(field: &str, value: u8, max: u8) -> u8 {
    if value > max {
        log::warn!("MIDI {} {} out of range, clamped to {}", field, value, max);
        max
    } else {
        value
    }
}

impl Event {
    /// Channels above 15 and data or velocity above 127 are clamped with a
    /// warning. Negative `after`/`hold` become 0.
    pub fn new(kind: EventType, channel: u8, opts: EventOptions) -> Self {
        Self {
            kind,
            channel: clamp_byte("channel", channel, 0x0F),
            data: clamp_byte("data", opts.data, 0x7F),
            velocity: clamp_byte("velocity", opts.velocity, 0x7F),
            after: opts.after.max(0.0),
            hold: opts.hold.max(0.0),
        }
    }

    /// Build an event from its type name, failing for unknown types.
    pub fn parse(kind: &str, channel: u8, opts: EventOptions) -> Result<Self> {
        Ok(Self::new(kind.parse()?, channel, opts))
    }

    /// A silent note-off for `data` on `channel`.
    pub fn note_off(channel: u8, data: u8) -> Self {
        Self::new(
            EventType::NoteOff,
            channel,
            EventOptions {
                data,
                velocity: 0,
                ..EventOptions::default()
            },
        )
    }

    /// A sustain pedal release on `channel`.
    pub fn sustain_off(channel: u8) -> Self {
        Self::new(
            EventType::SustainOff,
            channel,
            EventOptions {
                data: SUSTAIN_CONTROLLER,
                velocity: 0,
                ..EventOptions::default()
            },
        )
    }

    pub fn kind(&self) -> EventType {
        self.kind
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn data(&self) -> u8 {
        self.data
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn after(&self) -> f64 {
        self.after
    }

    pub fn hold(&self) -> f64 {
        self.hold
    }

    /// The three-byte message `[status + channel, data, velocity]`.
    pub fn message(&self) -> [u8; 3] {
        [self.kind.status() + self.channel, self.data, self.velocity]
    }

    /// Milliseconds to wait before sending.
    pub fn calculate_after(&self, timing: &Timing) -> f64 {
        if self.after > 0.0 {
            timing.beats_to_ms(self.after)
        } else {
            self.after
        }
    }

    /// Milliseconds between the send and the paired off-event.
    pub fn calculate_hold(&self, timing: &Timing) -> f64 {
        timing.beats_to_ms(self.hold)
    }

    /// The off-event paired with an on-event.
    pub fn off_event(&self) -> Option<Event> {
        match self.kind {
            EventType::NoteOn => Some(Event::note_off(self.channel, self.data)),
            EventType::SustainOn => Some(Event::sustain_off(self.channel)),
            EventType::NoteOff | EventType::SustainOff => None,
        }
    }

    pub fn tracking_key(&self) -> TrackingKey {
        let data = match self.kind {
            EventType::SustainOff => SUSTAIN_CONTROLLER,
            _ => self.data,
        };
        TrackingKey {
            channel: self.channel,
            kind: self.kind.on_type(),
            data,
        }
    }

    /// Staging key `position|type|data` used to drop duplicate events.
    pub fn position_key(&self, position: &str) -> String {
        format!("{}|{}|{}", position, self.kind, self.data)
    }

    pub fn has_duration(&self) -> bool {
        self.hold > 0.0
    }

    pub fn is_on_event(&self) -> bool {
        self.kind.is_on()
    }

    pub fn is_off_event(&self) -> bool {
        self.kind.is_off()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::interval_for;

    fn note(data: u8) -> Event {
        Event::new(
            EventType::NoteOn,
            1,
            EventOptions {
                data,
                hold: 0.5,
                after: 0.5,
                ..EventOptions::default()
            },
        )
    }

    fn timing(bpm: f64) -> Timing {
        Timing {
            interval: interval_for(bpm),
            beats_per_bar: 16,
        }
    }

    #[test]
    fn test_event_defaults() {
        let event = note(64);
        assert_eq!(event.data(), 64);
        assert_eq!(event.channel(), 1);
        assert_eq!(event.kind(), EventType::NoteOn);
        assert_eq!(event.velocity(), 98);
        assert!((event.after() - 0.5).abs() < 1e-9);
        assert!((event.hold() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_type() {
        assert!(matches!(
            Event::parse("sysex", 0, EventOptions::default()),
            Err(Error::UnsupportedEvent(_))
        ));
        let event = Event::parse("sustainon", 2, EventOptions::default()).unwrap();
        assert_eq!(event.kind(), EventType::SustainOn);
    }

    #[test]
    fn test_out_of_range_bytes_are_clamped() {
        let event = Event::new(
            EventType::NoteOn,
            20,
            EventOptions {
                data: 200,
                velocity: 255,
                ..EventOptions::default()
            },
        );
        assert_eq!(event.message(), [159, 127, 127]);
    }

    #[test]
    fn test_message() {
        assert_eq!(note(64).message(), [145, 64, 98]);
        assert_eq!(Event::note_off(0, 60).message(), [128, 60, 0]);
        assert_eq!(Event::sustain_off(3).message(), [179, 64, 0]);
    }

    #[test]
    fn test_calculate_hold_and_after() {
        let event = note(64);
        assert!((event.calculate_hold(&timing(120.0)) - 250.0).abs() < 1e-9);
        assert!((event.calculate_after(&timing(60.0)) - 500.0).abs() < 1e-9);

        let none = Event::new(EventType::NoteOn, 0, EventOptions::default());
        assert_eq!(none.calculate_after(&timing(120.0)), 0.0);
        assert!(!none.has_duration());
    }

    #[test]
    fn test_long_offsets_are_added() {
        let event = Event::new(
            EventType::NoteOn,
            0,
            EventOptions {
                data: 60,
                after: 20.0,
                hold: 32.0,
                ..EventOptions::default()
            },
        );
        let t = timing(120.0);
        assert!((event.calculate_after(&t) - 520.0).abs() < 1e-9);
        assert!((event.calculate_hold(&t) - 532.0).abs() < 1e-9);
    }

    #[test]
    fn test_off_event_shares_tracking_key() {
        let on = note(60);
        let off = on.off_event().unwrap();
        assert_eq!(off.kind(), EventType::NoteOff);
        assert_eq!(off.data(), 60);
        assert_eq!(off.channel(), 1);
        assert_eq!(off.tracking_key(), on.tracking_key());
        assert_eq!(on.tracking_key().to_string(), "1|noteon|60");

        let sustain = Event::new(
            EventType::SustainOn,
            2,
            EventOptions {
                data: 64,
                velocity: 127,
                ..EventOptions::default()
            },
        );
        let release = sustain.off_event().unwrap();
        assert_eq!(release.kind(), EventType::SustainOff);
        assert_eq!(release.data(), 64);
        assert_eq!(release.tracking_key().to_string(), "2|sustainon|64");
        assert!(release.off_event().is_none());
    }

    #[test]
    fn test_position_key_and_kinds() {
        let event = note(60);
        assert_eq!(event.position_key("1:1:1"), "1:1:1|noteon|60");
        assert!(event.is_on_event());
        assert!(!event.is_off_event());
        assert!(Event::note_off(0, 60).is_off_event());
    }
}
