//! Hardware MIDI through midir.
//!
//! midir sends immediately, so [`MidirOutput`] runs a small sender thread
//! that holds messages in a min-heap keyed on their due instant and
//! writes each one when it comes due.

use crate::config::MidiSettings;
use crate::error::{Error, Result};
use crate::io::{MidiIo, MidiOutput};
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use midir::{MidiInput, MidiOutputConnection};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A message waiting for its due instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scheduled {
    due: Instant,
    seq: u64,
    message: [u8; 3],
}

impl Ord for Scheduled {
    // Reversed so the BinaryHeap pops the earliest message first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Note-offs and controller releases.
fn is_release(message: &[u8; 3]) -> bool {
    match message[0] & 0xF0 {
        0x80 => true,
        0x90 | 0xB0 => message[2] == 0,
        _ => false,
    }
}

/// Timestamped output on a midir connection.
pub struct MidirOutput {
    name: String,
    epoch: Instant,
    seq: u64,
    tx: Option<Sender<Scheduled>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MidirOutput {
    /// Connect to the output port at `index`; timestamps are ms since `epoch`.
    pub fn connect(client_name: &str, index: usize, epoch: Instant) -> Result<Self> {
        let midi_out = midir::MidiOutput::new(client_name)
            .map_err(|e| Error::Midi(format!("Failed to create MIDI output: {}", e)))?;

        let ports = midi_out.ports();
        let port = ports
            .get(index)
            .ok_or_else(|| Error::Midi(format!("Invalid MIDI port index: {}", index)))?;
        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| format!("Unknown Device {}", index));

        let connection = midi_out
            .connect(port, &format!("{}-out", client_name))
            .map_err(|e| Error::Midi(format!("Failed to connect to {}: {}", name, e)))?;

        let (tx, rx) = unbounded::<Scheduled>();
        let thread_name = name.clone();
        let thread_handle = thread::Builder::new()
            .name("livemidi-sender".to_string())
            .spawn(move || run_sender(connection, rx, &thread_name))?;

        log::info!("Connected to MIDI output: {} (port {})", name, index);

        Ok(Self {
            name,
            epoch,
            seq: 0,
            tx: Some(tx),
            thread_handle: Some(thread_handle),
        })
    }
}

fn run_sender(
    mut connection: MidiOutputConnection,
    rx: crossbeam_channel::Receiver<Scheduled>,
    name: &str,
) {
    let mut queue: BinaryHeap<Scheduled> = BinaryHeap::new();

    loop {
        let now = Instant::now();
        while queue.peek().is_some_and(|next| next.due <= now) {
            if let Some(next) = queue.pop() {
                if let Err(e) = connection.send(&next.message) {
                    log::warn!("MIDI send to {} failed: {}", name, e);
                }
            }
        }

        let received = match queue.peek() {
            Some(next) => rx.recv_timeout(next.due.saturating_duration_since(now)),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(scheduled) => queue.push(scheduled),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Pending releases go out now so nothing is left hanging.
    let mut pending = queue.into_sorted_vec();
    pending.reverse();
    for scheduled in pending.iter().filter(|s| is_release(&s.message)) {
        let _ = connection.send(&scheduled.message);
    }
    let _ = connection.close();
    log::debug!("MIDI sender for {} stopped", name);
}

impl MidiOutput for MidirOutput {
    fn send(&mut self, message: [u8; 3], timestamp: f64) {
        let due = self.epoch + Duration::from_secs_f64(timestamp.max(0.0) / 1000.0);
        self.seq += 1;
        let scheduled = Scheduled {
            due,
            seq: self.seq,
            message,
        };
        if let Some(tx) = &self.tx {
            if tx.send(scheduled).is_err() {
                log::warn!("MIDI sender for {} is gone", self.name);
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MidirOutput {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Names of the available output ports.
pub fn list_output_ports(client_name: &str) -> Result<Vec<String>> {
    let midi_out = midir::MidiOutput::new(client_name)
        .map_err(|e| Error::Midi(format!("Failed to create MIDI output: {}", e)))?;
    Ok(midi_out
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| {
            midi_out
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index))
        })
        .collect())
}

/// Names of the available input ports.
pub fn list_input_ports(client_name: &str) -> Result<Vec<String>> {
    let midi_in = MidiInput::new(client_name)
        .map_err(|e| Error::Midi(format!("Failed to create MIDI input: {}", e)))?;
    Ok(midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| {
            midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index))
        })
        .collect())
}

/// Index of the port to use: first name match (case-insensitive
/// substring), else `fallback` when it exists.
fn select_port(ports: &[String], wanted: Option<&str>, fallback: usize) -> Option<usize> {
    if let Some(wanted) = wanted {
        let wanted = wanted.to_lowercase();
        if let Some(index) = ports
            .iter()
            .position(|p| p.to_lowercase().contains(&wanted))
        {
            return Some(index);
        }
        log::warn!("No MIDI output matching '{}'", wanted);
    }
    (fallback < ports.len()).then_some(fallback)
}

impl MidiIo {
    /// Open the configured ports and start the clock.
    ///
    /// Missing ports only produce warnings; the io then has no output.
    pub fn setup(settings: &MidiSettings) -> Result<MidiIo> {
        let mut io = MidiIo::new().with_clock();
        let epoch = io.epoch().unwrap_or_else(Instant::now);

        let outputs = list_output_ports(&settings.client_name)?;
        let output = match select_port(
            &outputs,
            settings.output_port.as_deref(),
            settings.output_index,
        ) {
            Some(index) => Some(Box::new(MidirOutput::connect(
                &settings.client_name,
                index,
                epoch,
            )?) as Box<dyn MidiOutput>),
            None => None,
        };
        io.set_output(output);

        let inputs = list_input_ports(&settings.client_name)?;
        io.set_input(inputs.get(settings.input_index).cloned());

        Ok(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_pops_earliest_first() {
        let epoch = Instant::now();
        let at = |ms: u64, seq: u64| Scheduled {
            due: epoch + Duration::from_millis(ms),
            seq,
            message: [144, seq as u8, 98],
        };

        let mut heap = BinaryHeap::new();
        heap.push(at(500, 1));
        heap.push(at(0, 2));
        heap.push(at(490, 3));
        heap.push(at(500, 4));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop()).map(|s| s.seq).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_is_release() {
        assert!(is_release(&[128, 60, 0]));
        assert!(is_release(&[144, 60, 0]));
        assert!(is_release(&[176, 64, 0]));
        assert!(!is_release(&[144, 60, 98]));
        assert!(!is_release(&[176, 64, 127]));
    }

    #[test]
    fn test_select_port() {
        let ports = vec!["Midi Through".to_string(), "FLUID Synth".to_string()];
        assert_eq!(select_port(&ports, Some("fluid"), 0), Some(1));
        assert_eq!(select_port(&ports, Some("absent"), 0), Some(0));
        assert_eq!(select_port(&ports, None, 1), Some(1));
        assert_eq!(select_port(&ports, None, 2), None);
        assert_eq!(select_port(&[], None, 0), None);
    }
}
