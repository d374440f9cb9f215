//! The loop: musical time keeper and position scheduler.
//!
//! The loop walks the form one beat per `interval` milliseconds. At every
//! step it broadcasts the current coordinate and asks its observer to
//! schedule the *next* coordinate one interval ahead, so events always go
//! out with a full beat of lookahead.
//!
//! The loop never sleeps by itself. Each step arms a one-shot [`Timer`];
//! whoever drives the loop (the runtime thread, or a test) waits for the
//! timer's delay and then calls [`Loop::fire`].

use crate::error::Result;
use crate::form::{Form, Part, DEFAULT_BARS, DEFAULT_BEATS};
use crate::position::Coordinate;
use crate::timing::{interval_for, Timing, DEFAULT_BPM, DEFAULT_OFFSET_MS};

/// Default number of restarts a repeating loop may take.
pub const DEFAULT_MAX_RESTARTS: u32 = 16;

/// Receives the loop's signals.
pub trait LoopObserver {
    /// The loop reached `position`. Informational only.
    fn on_position(&mut self, _position: Coordinate) {}

    /// Events at `position` should be sent at `time`.
    fn on_schedule(&mut self, position: Coordinate, time: f64, timing: Timing);

    /// Playback stopped at `time`, the furthest time handed out so far;
    /// silence anything still sounding.
    fn on_stop(&mut self, time: f64, timing: Timing);
}

/// What the pending timer does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// Advance to the next position.
    Tick,
    /// Start over at the first position.
    Restart,
}

/// A one-shot timer armed by the loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timer {
    pub kind: TimerKind,
    /// Milliseconds until it fires.
    pub delay: f64,
}

/// Structure and repeat options; `None` fields keep their defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoopOptions {
    pub bars: Option<u32>,
    pub beats: Option<u32>,
    pub parts: Option<Vec<Part>>,
    pub repeat: Option<bool>,
    pub max_restarts: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct Loop {
    coordinate: Coordinate,
    time: f64,
    bpm: f64,
    interval: f64,
    restarts: u32,
    max_restarts: u32,
    playing: bool,
    repeat: bool,
    offset: f64,
    form: Form,
    pending: Option<Timer>,
}

impl Default for Loop {
    fn default() -> Self {
        Self::new(LoopOptions::default())
    }
}

impl Loop {
    pub fn new(options: LoopOptions) -> Self {
        let form = Form::new(
            options.bars.unwrap_or(DEFAULT_BARS),
            options.beats.unwrap_or(DEFAULT_BEATS),
            options.parts.unwrap_or_default(),
        );
        Self {
            coordinate: Coordinate::FIRST,
            time: 0.0,
            bpm: DEFAULT_BPM,
            interval: interval_for(DEFAULT_BPM),
            restarts: 0,
            max_restarts: options.max_restarts.unwrap_or(DEFAULT_MAX_RESTARTS),
            playing: false,
            repeat: options.repeat.unwrap_or(false),
            offset: DEFAULT_OFFSET_MS,
            form,
            pending: None,
        }
    }

    /// Delay before the first position, in milliseconds.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset.max(0.0);
        self
    }

    /// Replace the structure and repeat options.
    ///
    /// Missing structure values fall back to 4 bars of 16 beats without
    /// parts; missing repeat options keep their current values.
    pub fn update(&mut self, options: LoopOptions) {
        if let Some(repeat) = options.repeat {
            self.repeat = repeat;
        }
        if let Some(max_restarts) = options.max_restarts {
            self.max_restarts = max_restarts;
        }
        self.form.update(
            options.bars.unwrap_or(DEFAULT_BARS),
            options.beats.unwrap_or(DEFAULT_BEATS),
            options.parts.unwrap_or_default(),
        );
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    /// Current position as `part:bar:beat`.
    pub fn position(&self) -> String {
        self.coordinate.to_string()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_repeating(&self) -> bool {
        self.repeat
    }

    /// The timer the driver should wait on, if any.
    pub fn pending_timer(&self) -> Option<Timer> {
        self.pending
    }

    /// Snapshot used to turn event beat offsets into milliseconds.
    pub fn timing(&self) -> Timing {
        Timing {
            interval: self.interval,
            beats_per_bar: self.form.beats(),
        }
    }

    /// Start playing at `time` (plus the start offset). No-op while playing.
    pub fn start(&mut self, time: f64, observer: &mut dyn LoopObserver) {
        if self.playing {
            return;
        }

        log::info!("Loop starting at {:.1}ms ({} bpm)", time, self.bpm);
        self.playing = true;
        self.time = time + self.offset;
        self.schedule_start(observer);
        self.advance(observer);
    }

    /// Stop playing and run the observer's stop handler. No-op while stopped.
    pub fn stop(&mut self, observer: &mut dyn LoopObserver) {
        if !self.playing {
            return;
        }

        log::info!("Loop stopped at {}", self.coordinate);
        self.coordinate = Coordinate::FIRST;
        self.restarts = 0;
        self.playing = false;
        self.pending = None;
        observer.on_stop(self.time, self.timing());
    }

    /// Go back to the first position and keep playing.
    pub fn restart(&mut self, observer: &mut dyn LoopObserver) {
        self.restarts += 1;
        log::info!("Loop restart {}/{}", self.restarts, self.max_restarts);
        self.schedule_start(observer);
        self.advance(observer);
    }

    /// Run the pending timer, if any.
    pub fn fire(&mut self, observer: &mut dyn LoopObserver) {
        match self.pending.take() {
            Some(Timer {
                kind: TimerKind::Tick,
                ..
            }) => {
                if self.playing {
                    self.advance(observer);
                }
            }
            Some(Timer {
                kind: TimerKind::Restart,
                ..
            }) => self.restart(observer),
            None => {}
        }
    }

    /// Loop over `[start, end]` only, with repeat on.
    pub fn focus(&mut self, start: &str, end: &str) -> Result<()> {
        self.form.update_bounds(start, end)?;
        log::info!("Loop focused on {} - {}", start, end);
        self.enable_repeat();
        Ok(())
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        self.bpm = bpm;
        self.interval = interval_for(bpm);
        log::info!("Tempo set to {} bpm ({:.2}ms per beat)", bpm, self.interval);
    }

    pub fn enable_repeat(&mut self) {
        self.repeat = true;
    }

    pub fn disable_repeat(&mut self) {
        self.repeat = false;
    }

    /// Back to a stopped 4x16 loop at 120 bpm, without notifying anyone.
    pub fn reset(&mut self) {
        self.coordinate = Coordinate::FIRST;
        self.restarts = 0;
        self.playing = false;
        self.repeat = false;
        self.pending = None;
        self.form.reset();
        self.set_tempo(DEFAULT_BPM);
    }

    fn schedule_start(&mut self, observer: &mut dyn LoopObserver) {
        self.coordinate = self.form.first();
        observer.on_schedule(self.coordinate, self.time, self.timing());
    }

    fn advance(&mut self, observer: &mut dyn LoopObserver) {
        self.time += self.interval;

        if self.should_restart() {
            observer.on_position(self.coordinate);
            self.arm(TimerKind::Restart);
            return;
        }

        if self.should_stop() {
            self.stop(observer);
            return;
        }

        observer.on_position(self.coordinate);
        log::debug!("Position {} at {:.1}ms", self.coordinate, self.time);

        let next = self.coordinate.next(&self.form);
        observer.on_schedule(next, self.time, self.timing());

        self.coordinate = next;
        self.arm(TimerKind::Tick);
    }

    fn arm(&mut self, kind: TimerKind) {
        self.pending = Some(Timer {
            kind,
            delay: self.interval,
        });
    }

    fn should_restart(&self) -> bool {
        self.repeat && self.restarts < self.max_restarts && self.coordinate == self.form.last()
    }

    fn should_stop(&self) -> bool {
        (self.repeat && self.restarts >= self.max_restarts) || self.coordinate > self.form.last()
    }
}
