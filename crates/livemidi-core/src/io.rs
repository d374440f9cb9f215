//! MIDI I/O seam.
//!
//! The dispatcher talks to hardware through [`MidiOutput`], which takes a
//! three-byte message and the timestamp (ms on the [`MidiIo`] clock) it
//! should go out at. Backends are expected to hold messages until their
//! timestamp.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// A timestamped MIDI message sink.
pub trait MidiOutput: Send {
    /// Queue `message` for `timestamp` milliseconds on the io clock.
    fn send(&mut self, message: [u8; 3], timestamp: f64);

    /// Port or backend name, for logging.
    fn name(&self) -> &str;
}

/// Selected MIDI ports plus the performance clock.
pub struct MidiIo {
    output: Option<Box<dyn MidiOutput>>,
    input: Option<String>,
    epoch: Option<Instant>,
}

impl fmt::Debug for MidiIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiIo")
            .field("output", &self.output_name())
            .field("input", &self.input)
            .field("clock", &self.epoch.is_some())
            .finish()
    }
}

impl Default for MidiIo {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiIo {
    /// No ports and no clock; `now()` is always 0.
    pub fn new() -> Self {
        Self {
            output: None,
            input: None,
            epoch: None,
        }
    }

    pub fn with_output(output: impl MidiOutput + 'static) -> Self {
        Self {
            output: Some(Box::new(output)),
            ..Self::new()
        }
    }

    /// Start the performance clock now.
    pub fn with_clock(mut self) -> Self {
        self.epoch = Some(Instant::now());
        self
    }

    pub fn set_output(&mut self, output: Option<Box<dyn MidiOutput>>) {
        match &output {
            Some(out) => log::info!("MIDI output: {}", out.name()),
            None => log::warn!("No MIDI output port available"),
        }
        self.output = output;
    }

    pub fn set_input(&mut self, input: Option<String>) {
        match &input {
            Some(name) => log::info!("MIDI input: {}", name),
            None => log::warn!("No MIDI input port available"),
        }
        self.input = input;
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn output_name(&self) -> Option<&str> {
        self.output.as_ref().map(|o| o.name())
    }

    pub fn input_name(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Instant the clock started, if it has one.
    pub fn epoch(&self) -> Option<Instant> {
        self.epoch
    }

    /// Milliseconds since the clock started, or 0 without a clock.
    pub fn now(&self) -> f64 {
        self.epoch
            .map_or(0.0, |epoch| epoch.elapsed().as_secs_f64() * 1000.0)
    }

    /// Hand a message to the output. Returns false when there is none.
    pub fn send(&mut self, message: [u8; 3], timestamp: f64) -> bool {
        match self.output.as_mut() {
            Some(output) => {
                log::debug!("send {:?} @ {:.1}ms", message, timestamp);
                output.send(message, timestamp);
                true
            }
            None => false,
        }
    }
}

/// One message captured by [`RecordingOutput`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SentMessage {
    pub message: [u8; 3],
    pub timestamp: f64,
}

/// Offline output that keeps every send. Clones share the buffer.
#[derive(Clone, Debug, Default)]
pub struct RecordingOutput {
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<SentMessage>> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Everything sent so far, in send order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.buffer().clone()
    }

    /// Sent messages ordered by timestamp, as a device would play them.
    pub fn timeline(&self) -> Vec<SentMessage> {
        let mut sent = self.sent();
        sent.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        sent
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    pub fn clear(&self) {
        self.buffer().clear();
    }
}

impl MidiOutput for RecordingOutput {
    fn send(&mut self, message: [u8; 3], timestamp: f64) {
        self.buffer().push(SentMessage { message, timestamp });
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Output that only logs, used when no port is configured.
#[derive(Clone, Debug, Default)]
pub struct LogOutput;

impl MidiOutput for LogOutput {
    fn send(&mut self, message: [u8; 3], timestamp: f64) {
        let [status, data, velocity] = message;
        log::info!(
            "[midi] ch {:>2} {:#04x} {:>3} {:>3} @ {:.1}ms",
            status & 0x0F,
            status & 0xF0,
            data,
            velocity,
            timestamp
        );
    }

    fn name(&self) -> &str {
        "log"
    }
}
