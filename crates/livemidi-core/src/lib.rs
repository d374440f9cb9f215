//! livemidi-core - Musical-time MIDI scheduling for live coding
//!
//! Notes, chords, sustains and rests are staged at symbolic positions
//! (`part:bar:beat`, with `*`, lists and `@n` strides). While the loop
//! plays, the dispatcher fires the matching MIDI messages one beat ahead
//! and pairs every note-on with its note-off.
//!
//! - [`Form`] and [`Position`]: musical structure and position expressions
//! - [`Event`]: a channel message with beat timing and its off pairing
//! - [`Instrument`] and [`Action`]: per-track staging
//! - [`Loop`] and [`Dispatcher`]: the timer-driven walk and the send path
//! - [`Session`] and [`Runtime`]: the performance and its thread
//!
//! # Usage as a Library
//!
//! ```no_run
//! use livemidi_core::{Action, Config, Instrument, LogOutput, MidiIo, Runtime, Session};
//!
//! let config = Config::load_or_default();
//! let mut session = Session::from_config(&config, MidiIo::with_output(LogOutput).with_clock());
//!
//! session.add_track(Instrument::new("piano", 0));
//! if let Some((piano, form)) = session.stage("piano") {
//!     piano.play(form, "*:*:1", &Action::chord("C4M").hold(2.0))?;
//!     piano.sequence(form, "*:2:5", &[Action::note("E4").hold(0.5), Action::note("G4")])?;
//! }
//!
//! let runtime = Runtime::spawn(session)?;
//! runtime.handle().start()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod action;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod form;
pub mod instrument;
pub mod io;
pub mod looper;
#[cfg(feature = "native")]
pub mod midi;
pub mod position;
pub mod runtime;
pub mod session;
pub mod theory;
pub mod timing;

// Re-export main types
pub use action::{Action, ActionKind};
pub use config::{Config, MidiSettings, TransportSettings};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use event::{Event, EventOptions, EventType, TrackingKey};
pub use form::{Form, Part};
pub use instrument::Instrument;
pub use io::{LogOutput, MidiIo, MidiOutput, RecordingOutput, SentMessage};
pub use looper::{Loop, LoopObserver, LoopOptions, Timer, TimerKind};
pub use position::{Coordinate, Position};
pub use runtime::{Runtime, RuntimeHandle};
pub use session::{Project, Session};
pub use theory::{BasicTheory, Theory};
pub use timing::Timing;

#[cfg(feature = "native")]
pub use midi::{list_input_ports, list_output_ports, MidirOutput};
