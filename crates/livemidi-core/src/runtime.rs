//! Runtime thread for livemidi.
//!
//! The runtime thread owns the [`Session`]. It:
//! - Sleeps until the loop's pending timer comes due, then fires it
//! - Applies start/stop commands and live edits between ticks
//! - Runs the panic sweep when it shuts down
//!
//! Timer deadlines are chained from the previous deadline rather than
//! from the moment a tick finished, so scheduling latency does not add up
//! over a long performance.

use crate::session::Session;
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long the idle thread waits for a command before re-checking shutdown.
const IDLE_POLL: Duration = Duration::from_millis(50);

type EditFn = Box<dyn FnOnce(&mut Session) + Send>;

enum Command {
    Start,
    Stop,
    Edit(EditFn),
    Shutdown,
}

/// Handle to the running runtime.
///
/// Cheap to clone; every clone talks to the same thread.
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: Sender<Command>,
    shutdown: Arc<AtomicBool>,
}

impl RuntimeHandle {
    fn send(&self, cmd: Command) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| anyhow!("Failed to send command: {}", e))
    }

    /// Start the loop at the io clock's current time.
    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Stop the loop; open notes are swept.
    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Run `f` on the runtime thread between two ticks.
    pub fn edit<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Session) + Send + 'static,
    {
        self.send(Command::Edit(Box::new(f)))
    }

    /// Run `f` on the runtime thread and wait for its result.
    pub fn with_session<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Session) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = bounded(1);
        self.edit(move |session| {
            let _ = reply_tx.send(f(session));
        })?;
        reply_rx
            .recv()
            .map_err(|e| anyhow!("Runtime did not answer: {}", e))
    }

    /// Signal the runtime to shut down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.command_tx.send(Command::Shutdown);
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// The livemidi runtime.
pub struct Runtime {
    handle: RuntimeHandle,
    thread_handle: Option<JoinHandle<Session>>,
}

impl Runtime {
    /// Move `session` onto a new runtime thread.
    pub fn spawn(session: Session) -> Result<Self> {
        let (command_tx, command_rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = RuntimeHandle {
            command_tx,
            shutdown: shutdown.clone(),
        };

        let thread_handle = thread::Builder::new()
            .name("livemidi-runtime".to_string())
            .spawn(move || {
                let mut rt = RuntimeThread {
                    session,
                    command_rx,
                    deadline: None,
                };
                rt.run(shutdown);
                rt.session
            })?;

        log::info!("Runtime started");

        Ok(Self {
            handle,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn handle(&self) -> &RuntimeHandle {
        &self.handle
    }

    /// Shut the thread down and take the session back.
    pub fn join(mut self) -> Result<Session> {
        self.handle.shutdown();
        let thread_handle = self
            .thread_handle
            .take()
            .ok_or_else(|| anyhow!("Runtime thread already joined"))?;
        thread_handle
            .join()
            .map_err(|_| anyhow!("Runtime thread panicked"))
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

struct RuntimeThread {
    session: Session,
    command_rx: Receiver<Command>,
    deadline: Option<Instant>,
}

impl RuntimeThread {
    fn run(&mut self, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            self.sync_deadline();

            let received = match self.deadline {
                Some(deadline) => self
                    .command_rx
                    .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => self.command_rx.recv_timeout(IDLE_POLL),
            };

            match received {
                Ok(Command::Start) => self.session.start_now(),
                Ok(Command::Stop) => self.session.stop(),
                Ok(Command::Edit(edit)) => edit(&mut self.session),
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => self.tick(),
            }
        }

        self.session.stop();
        log::info!("Runtime stopped");
    }

    /// Track the loop's pending timer: drop the deadline when the timer is
    /// gone, arm one from now when a new timer appeared.
    fn sync_deadline(&mut self) {
        match (self.session.pending_timer(), self.deadline) {
            (None, _) => self.deadline = None,
            (Some(timer), None) => {
                self.deadline = Some(Instant::now() + millis(timer.delay));
            }
            (Some(_), Some(_)) => {}
        }
    }

    fn tick(&mut self) {
        let Some(deadline) = self.deadline else {
            return;
        };
        if Instant::now() < deadline {
            return;
        }

        self.session.fire_timer();
        self.deadline = self
            .session
            .pending_timer()
            .map(|timer| deadline + millis(timer.delay));
    }
}

fn millis(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::instrument::Instrument;
    use crate::io::{MidiIo, RecordingOutput};
    use crate::looper::{Loop, LoopOptions};

    fn fast_session(recording: &RecordingOutput) -> Session {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut looper = Loop::new(LoopOptions {
            bars: Some(1),
            beats: Some(4),
            ..LoopOptions::default()
        })
        .with_offset(0.0);
        looper.set_tempo(600.0);
        Session::new(looper, MidiIo::with_output(recording.clone()).with_clock())
    }

    fn wait_until_stopped(handle: &RuntimeHandle) {
        let give_up = Instant::now() + Duration::from_secs(5);
        while Instant::now() < give_up {
            if !handle.with_session(|s| s.is_playing()).unwrap() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("loop did not stop in time");
    }

    #[test]
    fn test_edit_and_query() {
        let runtime = Runtime::spawn(Session::default()).unwrap();
        let handle = runtime.handle().clone();

        handle
            .edit(|session| session.add_track(Instrument::new("piano", 0)))
            .unwrap();
        let count = handle
            .with_session(|session| session.dispatcher().tracks().count())
            .unwrap();
        assert_eq!(count, 1);

        let session = runtime.join().unwrap();
        assert!(session.dispatcher().track("piano").is_some());
    }

    #[test]
    fn test_plays_to_the_end() {
        let recording = RecordingOutput::new();
        let runtime = Runtime::spawn(fast_session(&recording)).unwrap();
        let handle = runtime.handle().clone();

        handle
            .edit(|session| {
                session.add_track(Instrument::new("drums", 9));
                if let Some((drums, form)) = session.stage("drums") {
                    drums
                        .play(form, "1:1:*", &Action::note("C2").hold(0.5))
                        .unwrap();
                }
            })
            .unwrap();
        handle.start().unwrap();
        wait_until_stopped(&handle);

        let session = runtime.join().unwrap();
        assert!(!session.is_playing());

        let ons: Vec<f64> = recording
            .sent()
            .iter()
            .filter(|m| m.message == [153, 36, 98])
            .map(|m| m.timestamp)
            .collect();
        assert_eq!(ons.len(), 4);
        // one interval apart on the io clock
        for pair in ons.windows(2) {
            assert!((pair[1] - pair[0] - 100.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stop_clears_timer() {
        let recording = RecordingOutput::new();
        let mut session = fast_session(&recording);
        session.update(LoopOptions {
            repeat: Some(true),
            bars: Some(1),
            beats: Some(4),
            ..LoopOptions::default()
        });
        let runtime = Runtime::spawn(session).unwrap();
        let handle = runtime.handle().clone();

        handle.start().unwrap();
        assert!(handle.with_session(|s| s.is_playing()).unwrap());
        handle.stop().unwrap();

        let pending = handle.with_session(|s| s.pending_timer()).unwrap();
        assert!(pending.is_none());
        drop(runtime);
        assert!(handle.is_shutdown_requested());
        assert!(handle.start().is_err());
    }
}
