//! A performance session: one loop driving one dispatcher.
//!
//! The session is the object authoring code talks to. It owns the
//! [`Loop`] and the [`Dispatcher`], wires the loop's signals into the
//! dispatcher, and hands out instruments together with the form their
//! positions are expanded against.

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::form::Form;
use crate::instrument::Instrument;
use crate::io::MidiIo;
use crate::looper::{Loop, LoopOptions, Timer};

/// Song setup code, re-run on every live edit.
pub trait Project {
    fn setup(&mut self, session: &mut Session) -> Result<()>;
}

impl<F> Project for F
where
    F: FnMut(&mut Session) -> Result<()>,
{
    fn setup(&mut self, session: &mut Session) -> Result<()> {
        self(session)
    }
}

#[derive(Debug, Default)]
pub struct Session {
    looper: Loop,
    dispatcher: Dispatcher,
}

impl Session {
    pub fn new(looper: Loop, io: MidiIo) -> Self {
        Self {
            looper,
            dispatcher: Dispatcher::new(io),
        }
    }

    pub fn from_config(config: &Config, io: MidiIo) -> Self {
        Self::new(config.to_loop(), io)
    }

    pub fn looper(&self) -> &Loop {
        &self.looper
    }

    pub fn looper_mut(&mut self) -> &mut Loop {
        &mut self.looper
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn form(&self) -> &Form {
        self.looper.form()
    }

    pub fn is_playing(&self) -> bool {
        self.looper.is_playing()
    }

    /// Start playing at `time` on the io clock.
    pub fn start(&mut self, time: f64) {
        self.looper.start(time, &mut self.dispatcher);
    }

    /// Start playing at the io clock's current time.
    pub fn start_now(&mut self) {
        let now = self.dispatcher.io().now();
        self.start(now);
    }

    pub fn stop(&mut self) {
        self.looper.stop(&mut self.dispatcher);
    }

    pub fn restart(&mut self) {
        self.looper.restart(&mut self.dispatcher);
    }

    /// Run the loop's pending timer.
    pub fn fire_timer(&mut self) {
        self.looper.fire(&mut self.dispatcher);
    }

    pub fn pending_timer(&self) -> Option<Timer> {
        self.looper.pending_timer()
    }

    pub fn focus(&mut self, start: &str, end: &str) -> Result<()> {
        self.looper.focus(start, end)
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        self.looper.set_tempo(bpm);
    }

    pub fn update(&mut self, options: LoopOptions) {
        self.looper.update(options);
    }

    pub fn add_track(&mut self, instrument: Instrument) {
        self.dispatcher.add_track(instrument);
    }

    pub fn add_tracks(&mut self, instruments: impl IntoIterator<Item = Instrument>) {
        self.dispatcher.add_tracks(instruments);
    }

    pub fn remove_track(&mut self, name: &str) -> Option<Instrument> {
        self.dispatcher.remove_track(name)
    }

    /// A registered instrument and the form to stage against.
    pub fn stage(&mut self, name: &str) -> Option<(&mut Instrument, &Form)> {
        let form = self.looper.form();
        self.dispatcher.track_mut(name).map(|track| (track, form))
    }

    /// Clear staged events on every track.
    pub fn reset_tracks(&mut self) {
        self.dispatcher.reset_tracks();
    }

    /// Drop tracks and the sounding table, and reset the loop.
    pub fn reset(&mut self) {
        self.dispatcher.reset();
        self.looper.reset();
    }

    pub fn all_off(&mut self) {
        self.dispatcher.all_off(self.looper.timing());
    }

    pub fn full_reset(&mut self) {
        self.dispatcher.full_reset(self.looper.timing());
    }

    /// Clear staging and run `project` against this session.
    ///
    /// On error the tracks keep whatever was staged before the failing call.
    pub fn load(&mut self, project: &mut dyn Project) -> Result<()> {
        self.reset_tracks();
        project.setup(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::error::Error;
    use crate::io::RecordingOutput;

    fn recording_session(bars: u32, beats: u32) -> (Session, RecordingOutput) {
        let recording = RecordingOutput::new();
        let looper = Loop::new(LoopOptions {
            bars: Some(bars),
            beats: Some(beats),
            ..LoopOptions::default()
        });
        (
            Session::new(looper, MidiIo::with_output(recording.clone())),
            recording,
        )
    }

    fn drums(session: &mut Session) -> Result<()> {
        session.add_track(Instrument::new("drums", 9));
        if let Some((drums, form)) = session.stage("drums") {
            drums.play(form, "1:1:@1", &Action::note("C2"))?;
        }
        Ok(())
    }

    #[test]
    fn test_stage_unknown_track() {
        let mut session = Session::default();
        assert!(session.stage("nobody").is_none());
    }

    #[test]
    fn test_play_through() {
        let (mut session, recording) = recording_session(1, 4);
        session.load(&mut drums).unwrap();

        session.start(0.0);
        while session.pending_timer().is_some() {
            session.fire_timer();
        }

        // odd beats 1 and 3, sent one interval ahead of each tick
        let on: Vec<f64> = recording
            .sent()
            .iter()
            .filter(|m| m.message == [153, 36, 98])
            .map(|m| m.timestamp)
            .collect();
        assert_eq!(on, vec![100.0, 1100.0]);
        assert!(!session.is_playing());
    }

    /// True when the last message per (channel, pitch) on the device
    /// timeline is a release.
    fn nothing_left_on(recording: &RecordingOutput) -> bool {
        let mut last = std::collections::BTreeMap::new();
        for sent in recording.timeline() {
            let [status, data, velocity] = sent.message;
            last.insert((status & 0x0F, data), status & 0xF0 == 0x90 && velocity > 0);
        }
        !last.values().any(|&on| on)
    }

    #[test]
    fn test_stop_sweeps_open_notes() {
        let (mut session, recording) = recording_session(1, 4);
        session.load(&mut drums).unwrap();

        session.start(0.0);
        session.stop();

        let timeline = recording.timeline();
        assert_eq!(timeline[0].message, [153, 36, 98]);
        let last = timeline.last().copied().unwrap();
        assert_eq!(last.message, [137, 36, 0]);
        assert!(last.timestamp >= timeline[0].timestamp);
        assert!(nothing_left_on(&recording));
        assert!(session.dispatcher().sounding().is_empty());
    }

    #[test]
    fn test_nothing_stuck_after_the_form_ends() {
        let (mut session, recording) = recording_session(1, 4);
        session.add_track(Instrument::new("piano", 0));
        if let Some((piano, form)) = session.stage("piano") {
            piano.play(form, "*:*:1", &Action::note("C4")).unwrap();
        }

        session.start(0.0);
        while session.pending_timer().is_some() {
            session.fire_timer();
        }

        assert!(!session.is_playing());
        let c4: Vec<[u8; 3]> = recording
            .timeline()
            .iter()
            .filter(|m| m.message[1] == 60)
            .map(|m| m.message)
            .collect();
        assert_eq!(c4.last(), Some(&[128, 60, 0]));
        assert!(nothing_left_on(&recording));
    }

    #[test]
    fn test_full_reset_after_queued_notes() {
        let (mut session, recording) = recording_session(1, 4);
        session.load(&mut drums).unwrap();
        session.start(0.0);
        session.full_reset();
        assert!(nothing_left_on(&recording));
    }

    #[test]
    fn test_load_replaces_staging() {
        let (mut session, _recording) = recording_session(4, 16);
        session.load(&mut drums).unwrap();
        let staged = |s: &Session| s.dispatcher().track("drums").map(|t| t.events().len());
        assert_eq!(staged(&session), Some(8));

        let mut failing = |session: &mut Session| -> Result<()> {
            let (drums, form) = session.stage("drums").ok_or(Error::Config("no drums".into()))?;
            drums.play(form, "1:1:1", &Action::note("D2"))?;
            drums.rest(form, "1:1:4", "1:1:2")
        };
        assert!(matches!(
            session.load(&mut failing),
            Err(Error::InvalidRange { .. })
        ));
        // the call before the error stays staged
        assert_eq!(staged(&session), Some(1));
        assert!(session
            .dispatcher()
            .track("drums")
            .is_some_and(|t| t.is_tracked("1:1:1|noteon|38")));
    }

    #[test]
    fn test_reset() {
        let (mut session, _recording) = recording_session(1, 4);
        session.load(&mut drums).unwrap();
        session.set_tempo(90.0);
        session.start(0.0);

        session.reset();
        assert!(!session.is_playing());
        assert_eq!(session.dispatcher().tracks().count(), 0);
        assert_eq!(session.looper().bpm(), 120.0);
        assert_eq!(session.form(), &Form::default());
    }

    #[test]
    fn test_full_reset_reaches_every_channel() {
        let (mut session, recording) = recording_session(1, 4);
        session.add_tracks([Instrument::new("a", 0), Instrument::new("b", 0)]);
        session.full_reset();
        assert_eq!(recording.len(), 74);
    }
}
