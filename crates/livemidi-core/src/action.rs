//! Instrument actions: what to play and how.
//!
//! ```
//! use livemidi_core::Action;
//!
//! let chord = Action::chord("C5M").hold(0.5).velocity(120);
//! let run = Action::notes(["C4", "E4"]).after(0.5).dups();
//! let breath = Action::pause(1.0);
//! # let _ = (chord, run, breath);
//! ```

use crate::error::{Error, Result};
use crate::event::{EventOptions, DEFAULT_VELOCITY};
use crate::theory::Theory;

/// What an action does.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionKind {
    /// One or more note names.
    Notes(Vec<String>),
    /// A chord name resolved through the theory lookup.
    Chord(String),
    /// Silence that still takes up its hold in a sequence.
    Pause,
    /// Sustain pedal down for the hold.
    Sustain,
}

/// An authoring action with velocity and beat timing.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub velocity: u8,
    /// Delay in beats; `None` when not declared.
    pub after: Option<f64>,
    /// Hold in beats.
    pub hold: f64,
    /// Stage even when the same note is already staged at the position.
    pub dups: bool,
}

impl Action {
    fn with_kind(kind: ActionKind) -> Self {
        Self {
            kind,
            velocity: DEFAULT_VELOCITY,
            after: None,
            hold: 0.0,
            dups: false,
        }
    }

    pub fn notes<I, S>(notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(ActionKind::Notes(
            notes.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn note(note: impl Into<String>) -> Self {
        Self::with_kind(ActionKind::Notes(vec![note.into()]))
    }

    pub fn chord(chord: impl Into<String>) -> Self {
        Self::with_kind(ActionKind::Chord(chord.into()))
    }

    pub fn pause(hold: f64) -> Self {
        Self::with_kind(ActionKind::Pause).hold(hold)
    }

    pub fn sustain(hold: f64) -> Self {
        Self::with_kind(ActionKind::Sustain).hold(hold)
    }

    pub fn hold(mut self, hold: f64) -> Self {
        self.hold = hold;
        self
    }

    pub fn after(mut self, after: f64) -> Self {
        self.after = Some(after);
        self
    }

    pub fn velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn dups(mut self) -> Self {
        self.dups = true;
        self
    }

    /// Declared delay, zero when none was given.
    pub fn after_beats(&self) -> f64 {
        self.after.unwrap_or(0.0)
    }

    /// True for actions that sound notes.
    pub fn is_musical(&self) -> bool {
        matches!(self.kind, ActionKind::Notes(_) | ActionKind::Chord(_))
    }

    /// Note names this action plays; empty for pauses and sustains.
    pub fn note_names(&self, theory: &dyn Theory) -> Result<Vec<String>> {
        match &self.kind {
            ActionKind::Notes(notes) => Ok(notes.clone()),
            ActionKind::Chord(chord) => theory
                .chord_notes(chord)
                .ok_or_else(|| Error::UnknownChord(chord.clone())),
            ActionKind::Pause | ActionKind::Sustain => Ok(Vec::new()),
        }
    }

    /// Event options carried over to staged events.
    pub fn event_options(&self) -> EventOptions {
        EventOptions {
            data: 0,
            velocity: self.velocity,
            after: self.after_beats(),
            hold: self.hold,
        }
    }
}

impl From<&str> for Action {
    fn from(note: &str) -> Self {
        Action::note(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::BasicTheory;

    #[test]
    fn test_defaults() {
        let action = Action::note("C4");
        assert_eq!(action.velocity, 98);
        assert_eq!(action.after, None);
        assert_eq!(action.hold, 0.0);
        assert!(!action.dups);
        assert!(action.is_musical());
    }

    #[test]
    fn test_builder_chain() {
        let action = Action::notes(["C4", "E4"]).hold(1.0).after(0.5).velocity(110).dups();
        assert_eq!(action.hold, 1.0);
        assert_eq!(action.after, Some(0.5));
        assert_eq!(action.velocity, 110);
        assert!(action.dups);

        let opts = action.event_options();
        assert_eq!(opts.velocity, 110);
        assert_eq!(opts.after, 0.5);
        assert_eq!(opts.hold, 1.0);
    }

    #[test]
    fn test_note_names() {
        let theory = BasicTheory;
        assert_eq!(
            Action::notes(["C4", "G4"]).note_names(&theory).unwrap(),
            vec!["C4", "G4"]
        );
        assert_eq!(
            Action::chord("C5M").note_names(&theory).unwrap(),
            vec!["C5", "E5", "G5"]
        );
        assert!(Action::pause(1.0).note_names(&theory).unwrap().is_empty());
        assert!(matches!(
            Action::chord("Qm").note_names(&theory),
            Err(Error::UnknownChord(_))
        ));
    }

    #[test]
    fn test_pause_and_sustain() {
        assert!(!Action::pause(0.5).is_musical());
        assert_eq!(Action::sustain(2.0).hold, 2.0);
        assert_eq!(Action::sustain(2.0).kind, ActionKind::Sustain);
    }
}
