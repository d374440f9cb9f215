//! livemidi CLI - The `livemidi` command.
//!
//! Plays the built-in demo project through the configured MIDI output,
//! or through the log when no port is available.

mod demo;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use livemidi_core::{Config, LogOutput, MidiIo, Runtime, Session};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the main thread checks for Ctrl-C and the end of playback.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// livemidi - musical-time MIDI scheduling
#[derive(Parser, Debug)]
#[command(name = "livemidi")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Play live-coded MIDI projects in musical time", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
    /// List available MIDI ports
    ListPorts,
    /// Play the demo project
    Play {
        /// Config file path (default: the platform config directory)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Tempo override in beats per minute
        #[arg(long)]
        bpm: Option<f64>,

        /// Stop after this long, e.g. "30s" or "2m"
        #[arg(short, long, value_parser = humantime::parse_duration)]
        duration: Option<Duration>,

        /// Start over at the end of the form
        #[arg(short, long)]
        repeat: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Init => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            Ok(())
        }
        Commands::ConfigPath => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::ListPorts => list_ports(),
        Commands::Play {
            config,
            bpm,
            duration,
            repeat,
        } => {
            let mut config = match config {
                Some(path) => Config::from_path(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?,
                None => Config::load_or_default(),
            };
            if let Some(bpm) = bpm {
                config.transport.bpm = bpm;
            }
            if repeat {
                config.transport.repeat = true;
            }
            play(&config, duration)
        }
    }
}

#[cfg(feature = "native")]
fn list_ports() -> Result<()> {
    let config = Config::load_or_default();
    let client = &config.midi.client_name;

    let outputs = livemidi_core::list_output_ports(client)?;
    let inputs = livemidi_core::list_input_ports(client)?;

    for (title, ports) in [("output", outputs), ("input", inputs)] {
        if ports.is_empty() {
            println!("No MIDI {} ports found", title);
        } else {
            println!("Available MIDI {} ports:", title);
            for (index, port) in ports.iter().enumerate() {
                println!("  {}: {}", index, port);
            }
        }
    }
    Ok(())
}

#[cfg(not(feature = "native"))]
fn list_ports() -> Result<()> {
    println!("livemidi was built without the `native` feature; only the log output is available");
    Ok(())
}

#[cfg(feature = "native")]
fn open_io(config: &Config) -> Result<MidiIo> {
    let mut io = MidiIo::setup(&config.midi).context("Failed to set up MIDI")?;
    if !io.has_output() {
        io.set_output(Some(Box::new(LogOutput)));
    }
    Ok(io)
}

#[cfg(not(feature = "native"))]
fn open_io(_config: &Config) -> Result<MidiIo> {
    log::warn!("Built without MIDI support, logging messages instead");
    Ok(MidiIo::with_output(LogOutput).with_clock())
}

fn play(config: &Config, duration: Option<Duration>) -> Result<()> {
    let io = open_io(config)?;
    let mut session = Session::from_config(config, io);
    session
        .load(&mut demo::setup)
        .context("Failed to set up the demo project")?;

    let interrupted = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted))
        .context("Error setting Ctrl-C handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&interrupted))
        .context("Error setting SIGTERM handler")?;

    let runtime = Runtime::spawn(session)?;
    let handle = runtime.handle().clone();
    handle.start()?;
    log::info!(
        "Playing at {} bpm (press Ctrl+C to stop)",
        config.transport.bpm
    );

    let deadline = duration.map(|d| Instant::now() + d);
    loop {
        std::thread::sleep(POLL_INTERVAL);

        if interrupted.load(Ordering::Relaxed) {
            log::info!("Interrupted by user (Ctrl+C)");
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("Duration reached");
            break;
        }
        if !handle.with_session(|session| session.is_playing())? {
            log::info!("End of form");
            break;
        }
    }

    handle.stop()?;
    let mut session = runtime.join()?;
    if interrupted.load(Ordering::Relaxed) {
        session.full_reset();
    }
    Ok(())
}
