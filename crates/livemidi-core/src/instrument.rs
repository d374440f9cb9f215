//! Instruments: per-track staging tables.
//!
//! Authoring calls (`play`, `stop`, `at`, `sequence`, `pattern`, `rest`,
//! `sustain_on`, `sustain_off`) stage [`Event`]s under every literal
//! coordinate their position expression expands to. The dispatcher reads
//! those tables while the loop plays.
//!
//! Staging is guarded by a `position|type|data` key: the same note at the
//! same position is staged once unless the action asks for duplicates.

use crate::action::{Action, ActionKind};
use crate::error::{Error, Result};
use crate::event::{Event, EventOptions, EventType, SUSTAIN_CONTROLLER};
use crate::form::Form;
use crate::position::{tokens, Coordinate, Position};
use crate::theory::{BasicTheory, Theory};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// A named track on one MIDI channel.
#[derive(Clone)]
pub struct Instrument {
    name: String,
    channel: u8,
    muted: bool,
    events: HashMap<String, Vec<Event>>,
    tracking: HashSet<String>,
    rests: HashSet<String>,
    theory: Arc<dyn Theory>,
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("channel", &self.channel)
            .field("muted", &self.muted)
            .field("events", &self.events)
            .field("rests", &self.rests)
            .finish()
    }
}

impl Instrument {
    pub fn new(name: impl Into<String>, channel: u8) -> Self {
        Self {
            name: name.into(),
            channel: channel & 0x0F,
            muted: false,
            events: HashMap::new(),
            tracking: HashSet::new(),
            rests: HashSet::new(),
            theory: Arc::new(BasicTheory),
        }
    }

    /// Use a different note/chord lookup.
    pub fn with_theory(mut self, theory: Arc<dyn Theory>) -> Self {
        self.theory = theory;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn mute(&mut self) {
        self.muted = true;
    }

    pub fn unmute(&mut self) {
        self.muted = false;
    }

    /// Staged events by literal position.
    pub fn events(&self) -> &HashMap<String, Vec<Event>> {
        &self.events
    }

    /// Events staged at exactly `position`.
    pub fn events_at(&self, position: &str) -> &[Event] {
        self.events.get(position).map_or(&[], Vec::as_slice)
    }

    pub fn rests(&self) -> &HashSet<String> {
        &self.rests
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.tracking.contains(key)
    }

    pub fn should_rest(&self, position: &str) -> bool {
        self.rests.contains(position)
    }

    /// Play the action's notes (or chord) at `position`.
    pub fn play(&mut self, form: &Form, position: &str, action: &Action) -> Result<()> {
        let opts = action.event_options();
        for note in action.note_names(self.theory.as_ref())? {
            self.note_on(form, position, &note, opts, action.dups)?;
        }
        Ok(())
    }

    /// Stop the action's notes (or chord) at `position`.
    pub fn stop(&mut self, form: &Form, position: &str, action: &Action) -> Result<()> {
        let after = action.after_beats();
        for note in action.note_names(self.theory.as_ref())? {
            self.note_off(form, position, &note, after)?;
        }
        Ok(())
    }

    /// Take several actions at one position.
    pub fn at(&mut self, form: &Form, position: &str, actions: &[Action]) -> Result<()> {
        for action in actions {
            match action.kind {
                ActionKind::Notes(_) | ActionKind::Chord(_) => {
                    self.play(form, position, action)?;
                }
                ActionKind::Sustain => {
                    self.sustain_on(form, position, action.after_beats(), action.hold)?;
                }
                ActionKind::Pause => {}
            }
        }
        Ok(())
    }

    /// Stage an ordered run of actions starting at `position`.
    ///
    /// Each action begins where the previous one's hold ends. Whole beats
    /// move the target beat; the fraction is carried as the event's
    /// `after`. Pauses take up time but stage nothing.
    pub fn sequence(&mut self, form: &Form, position: &str, actions: &[Action]) -> Result<()> {
        let pos = Position::expand(form, position)?;
        if pos.beats == "*" {
            return Err(Error::WildcardBeat);
        }

        for part in tokens(&pos.parts) {
            for bar in tokens(&pos.bars) {
                for start in tokens(&pos.beats) {
                    let mut beat = start
                        .parse::<u32>()
                        .map_err(|_| Error::InvalidPosition(position.to_string()))?
                        as f64;
                    let mut after = 0.0;
                    let mut previous_hold: Option<f64> = None;

                    for action in actions {
                        match previous_hold {
                            // a first step only moves by whole beats
                            None if action.after_beats() >= 1.0 => after = action.after_beats(),
                            None => {}
                            Some(hold) => after += action.after_beats() + hold,
                        }
                        if after >= 1.0 {
                            beat += after.floor();
                            after -= after.floor();
                        }

                        if action.is_musical() {
                            let step = action.clone().after(after).dups();
                            let target = format!("{part}:{bar}:{}", beat.floor() as u32);
                            self.play(form, &target, &step)?;
                        }

                        previous_hold = Some(action.hold);
                    }
                }
            }
        }
        Ok(())
    }

    /// Sequence one action with a list of holds.
    ///
    /// Positive holds play the action for that long; zero or negative
    /// holds are pauses of the same length.
    pub fn pattern(
        &mut self,
        form: &Form,
        position: &str,
        action: &Action,
        holds: &[f64],
    ) -> Result<()> {
        if let Some(after) = action.after {
            return Err(Error::AfterInPattern(after));
        }

        let steps: Vec<Action> = holds
            .iter()
            .map(|&hold| {
                if hold > 0.0 {
                    action.clone().hold(hold)
                } else {
                    Action::pause(hold.abs())
                }
            })
            .collect();

        self.sequence(form, position, &steps)
    }

    /// Stage a note-on for a single note name.
    pub fn note_on(
        &mut self,
        form: &Form,
        position: &str,
        note: &str,
        opts: EventOptions,
        dups: bool,
    ) -> Result<()> {
        let data = self.note_data(note)?;
        let event = Event::new(EventType::NoteOn, self.channel, EventOptions { data, ..opts });
        self.stage_event(form, position, event, dups)
    }

    /// Stage a note-off for a single note name.
    pub fn note_off(&mut self, form: &Form, position: &str, note: &str, after: f64) -> Result<()> {
        let data = self.note_data(note)?;
        let event = Event::new(
            EventType::NoteOff,
            self.channel,
            EventOptions {
                data,
                velocity: 0,
                after,
                hold: 0.0,
            },
        );
        self.stage_event(form, position, event, false)
    }

    /// Stage a sustain pedal press.
    pub fn sustain_on(&mut self, form: &Form, position: &str, after: f64, hold: f64) -> Result<()> {
        let event = Event::new(
            EventType::SustainOn,
            self.channel,
            EventOptions {
                data: SUSTAIN_CONTROLLER,
                velocity: 127,
                after,
                hold,
            },
        );
        self.stage_event(form, position, event, false)
    }

    /// Stage a sustain pedal release.
    pub fn sustain_off(&mut self, form: &Form, position: &str, after: f64) -> Result<()> {
        let event = Event::new(
            EventType::SustainOff,
            self.channel,
            EventOptions {
                data: SUSTAIN_CONTROLLER,
                velocity: 0,
                after,
                hold: 0.0,
            },
        );
        self.stage_event(form, position, event, false)
    }

    /// Rest at every coordinate from `start` to `end` inclusive.
    ///
    /// The walk stops early at the form's upper bound.
    pub fn rest(&mut self, form: &Form, start: &str, end: &str) -> Result<()> {
        let sp: Coordinate = start
            .parse()
            .map_err(|_| Error::InvalidStartPosition(start.to_string()))?;
        let ep: Coordinate = end
            .parse()
            .map_err(|_| Error::InvalidEndPosition(end.to_string()))?;

        if sp > ep {
            return Err(Error::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let upper = form.last();
        let mut current = sp;
        loop {
            self.rests.insert(current.to_string());
            if current >= ep || current >= upper {
                break;
            }
            current.increment(form);
        }
        Ok(())
    }

    /// Forget everything staged. Used before re-running a live-coded project.
    pub fn reset(&mut self) {
        self.muted = false;
        self.events.clear();
        self.tracking.clear();
        self.rests.clear();
    }

    fn note_data(&self, note: &str) -> Result<u8> {
        self.theory
            .note_to_midi(note)
            .ok_or_else(|| Error::UnknownNote(note.to_string()))
    }

    fn stage_event(&mut self, form: &Form, position: &str, event: Event, dups: bool) -> Result<()> {
        let pos = Position::expand(form, position)?;
        for key in pos.coordinates() {
            let pk = event.position_key(&key);
            if dups || !self.tracking.contains(&pk) {
                self.tracking.insert(pk);
                self.events.entry(key).or_default().push(event);
            }
        }
        Ok(())
    }
}
