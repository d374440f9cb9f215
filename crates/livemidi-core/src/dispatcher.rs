//! Track registry and event dispatch.
//!
//! The dispatcher receives the loop's schedule requests, looks up what
//! every track staged for that position and sends it through the
//! [`MidiIo`]. It keeps a table of sounding on-events keyed by
//! [`TrackingKey`] so a retriggered note is closed first, and so a stop
//! can silence whatever is still open.

use crate::event::{Event, TrackingKey};
use crate::instrument::Instrument;
use crate::io::MidiIo;
use crate::looper::LoopObserver;
use crate::position::Coordinate;
use crate::timing::{Timing, EARLY_OFF_MS};
use std::collections::{BTreeMap, BTreeSet};

/// Lowest pitch silenced by a full reset.
pub const RESET_LOW_NOTE: u8 = 36;
/// Highest pitch silenced by a full reset.
pub const RESET_HIGH_NOTE: u8 = 108;

#[derive(Debug, Default)]
pub struct Dispatcher {
    tracks: BTreeMap<String, Instrument>,
    sounding: BTreeSet<TrackingKey>,
    /// Latest timestamp an on-event was handed to the output at.
    horizon: f64,
    io: MidiIo,
}

impl Dispatcher {
    pub fn new(io: MidiIo) -> Self {
        Self {
            tracks: BTreeMap::new(),
            sounding: BTreeSet::new(),
            horizon: 0.0,
            io,
        }
    }

    pub fn io(&self) -> &MidiIo {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut MidiIo {
        &mut self.io
    }

    /// Register a track by name, replacing any track with the same name.
    pub fn add_track(&mut self, instrument: Instrument) {
        if self
            .tracks
            .insert(instrument.name().to_string(), instrument)
            .is_some()
        {
            log::debug!("Replaced existing track");
        }
    }

    pub fn add_tracks(&mut self, instruments: impl IntoIterator<Item = Instrument>) {
        for instrument in instruments {
            self.add_track(instrument);
        }
    }

    pub fn remove_track(&mut self, name: &str) -> Option<Instrument> {
        self.tracks.remove(name)
    }

    pub fn track(&self, name: &str) -> Option<&Instrument> {
        self.tracks.get(name)
    }

    pub fn track_mut(&mut self, name: &str) -> Option<&mut Instrument> {
        self.tracks.get_mut(name)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Instrument> {
        self.tracks.values()
    }

    pub fn is_sounding(&self, key: &TrackingKey) -> bool {
        self.sounding.contains(key)
    }

    pub fn sounding(&self) -> &BTreeSet<TrackingKey> {
        &self.sounding
    }

    /// Timestamp sweeps go out at: no earlier than any on-event already
    /// queued on the output, nor than the io clock.
    pub fn sweep_time(&self) -> f64 {
        self.horizon.max(self.io.now())
    }

    /// Send every event staged for `position` at `time`.
    ///
    /// Staged events match when their key is the literal position or one
    /// of its wildcard forms. Muted tracks and tracks resting at the
    /// position are skipped.
    pub fn schedule(&mut self, position: Coordinate, time: f64, timing: Timing) {
        let Coordinate { part, bar, beat } = position;
        let literal = position.to_string();
        let forms = [
            "*:*:*".to_string(),
            format!("{part}:*:*"),
            format!("{part}:{bar}:*"),
            format!("{part}:*:{beat}"),
            literal.clone(),
            format!("*:{bar}:{beat}"),
            format!("*:*:{beat}"),
        ];

        let mut due = Vec::new();
        for track in self.tracks.values() {
            if track.is_muted() || track.should_rest(&literal) {
                continue;
            }
            for form in &forms {
                let events = track.events_at(form);
                if !events.is_empty() {
                    log::trace!("{}: {} event(s) under {}", track.name(), events.len(), form);
                    due.extend_from_slice(events);
                }
            }
        }

        for event in due {
            self.schedule_event(event, time, timing);
        }
    }

    /// Send one event and keep the sounding table in step.
    ///
    /// An on-event that is already sounding gets its off-event sent
    /// slightly before the new on. Held on-events schedule their own off.
    pub fn schedule_event(&mut self, event: Event, time: f64, timing: Timing) {
        let key = event.tracking_key();
        let at = time + event.calculate_after(&timing);
        self.io.send(event.message(), at);

        if event.is_off_event() {
            self.sounding.remove(&key);
            return;
        }
        self.horizon = self.horizon.max(at);

        if self.sounding.contains(&key) {
            if let Some(off) = event.off_event() {
                log::trace!("{} retriggered, closing early", key);
                self.schedule_event(off, at - EARLY_OFF_MS, timing);
            }
        }

        self.sounding.insert(key);

        if event.has_duration() {
            if let Some(off) = event.off_event() {
                self.schedule_event(off, at + event.calculate_hold(&timing), timing);
            }
        }
    }

    /// Close everything still marked as sounding, at [`sweep_time`].
    ///
    /// [`sweep_time`]: Dispatcher::sweep_time
    pub fn all_off(&mut self, timing: Timing) {
        let at = self.sweep_time();
        let open: Vec<TrackingKey> = self.sounding.iter().copied().collect();
        if !open.is_empty() {
            log::debug!("Sending {} off message(s) at {:.1}ms", open.len(), at);
        }
        for key in open {
            self.schedule_event(key.off_event(), at, timing);
        }
    }

    /// Note-off for every pitch in the reset range plus a sustain release,
    /// on every track's channel, whatever the table says.
    pub fn full_reset(&mut self, timing: Timing) {
        let at = self.sweep_time();
        let channels: BTreeSet<u8> = self.tracks.values().map(Instrument::channel).collect();
        for channel in channels {
            for note in RESET_LOW_NOTE..=RESET_HIGH_NOTE {
                self.schedule_event(Event::note_off(channel, note), at, timing);
            }
            self.schedule_event(Event::sustain_off(channel), at, timing);
        }
    }

    /// Clear every track's staging; registrations stay.
    pub fn reset_tracks(&mut self) {
        for track in self.tracks.values_mut() {
            track.reset();
        }
    }

    /// Drop all tracks and the sounding table.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.sounding.clear();
    }
}

impl LoopObserver for Dispatcher {
    fn on_position(&mut self, position: Coordinate) {
        log::trace!("at {}", position);
    }

    fn on_schedule(&mut self, position: Coordinate, time: f64, timing: Timing) {
        self.schedule(position, time, timing);
    }

    fn on_stop(&mut self, time: f64, timing: Timing) {
        self.horizon = self.horizon.max(time);
        self.all_off(timing);
    }
}
