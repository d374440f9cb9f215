//! Music theory lookup: note names to MIDI pitches, chords to notes.
//!
//! The scheduler only depends on the [`Theory`] trait. [`BasicTheory`]
//! covers scientific pitch names (`C4`, `F#3`, `Bb2`) and chord names of
//! the form `<root>[octave]<quality>` such as `C5M`, `Am`, `G7` or `Eb3maj7`.

use regex::Regex;
use std::sync::OnceLock;

/// Octave assumed when a name carries none (C4 = 60).
pub const DEFAULT_OCTAVE: i16 = 4;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Name/pitch lookup consumed by instruments.
pub trait Theory: Send + Sync {
    /// MIDI pitch of a note name.
    fn note_to_midi(&self, name: &str) -> Option<u8>;

    /// Note names making up a chord.
    fn chord_notes(&self, name: &str) -> Option<Vec<String>>;
}

/// Built-in theory tables.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicTheory;

impl Theory for BasicTheory {
    fn note_to_midi(&self, name: &str) -> Option<u8> {
        parse_note_name(name)
    }

    fn chord_notes(&self, name: &str) -> Option<Vec<String>> {
        let caps = chord_regex().captures(name.trim())?;
        let letter = caps.get(1)?.as_str();
        let accidentals = caps.get(2).map_or("", |m| m.as_str());
        let octave = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<i16>().ok())
            .unwrap_or(DEFAULT_OCTAVE);
        let quality = caps.get(4).map_or("", |m| m.as_str());

        let root = parse_note_name(&format!("{letter}{accidentals}{octave}"))?;
        let intervals = chord_intervals(quality)?;

        let notes: Vec<String> = intervals
            .iter()
            .map(|&interval| root as i16 + interval as i16)
            .filter(|midi| (0..=127).contains(midi))
            .map(|midi| midi_note_name(midi as u8))
            .collect();

        if notes.is_empty() {
            None
        } else {
            Some(notes)
        }
    }
}

fn chord_regex() -> &'static Regex {
    static CHORD: OnceLock<Regex> = OnceLock::new();
    CHORD.get_or_init(|| {
        Regex::new(r"^([A-Ga-g])([#b♯♭]*)(-?\d+)?(.*)$").expect("chord pattern is valid")
    })
}

/// Parse a note name such as `C4`, `C#4` or `Db4` to a MIDI pitch.
pub fn parse_note_name(name: &str) -> Option<u8> {
    let name = name.trim();
    let mut chars = name.chars().peekable();

    let base: i16 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut accidental = 0i16;
    while let Some(&c) = chars.peek() {
        match c {
            '#' | '♯' => accidental += 1,
            'b' | '♭' => accidental -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave_str: String = chars.collect();
    let octave = if octave_str.is_empty() {
        DEFAULT_OCTAVE
    } else {
        octave_str.parse::<i16>().ok()?
    };

    let midi = (octave + 1) * 12 + base + accidental;
    if (0..=127).contains(&midi) {
        Some(midi as u8)
    } else {
        None
    }
}

/// Sharp-spelled name of a MIDI pitch (`60` → `C4`).
pub fn midi_note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

/// Semitone offsets from the root for a chord quality.
fn chord_intervals(quality: &str) -> Option<&'static [i8]> {
    // Case matters for the short symbols: M is major, m is minor.
    let exact: Option<&'static [i8]> = match quality {
        "" | "M" => Some(&[0, 4, 7]),
        "m" => Some(&[0, 3, 7]),
        "M7" => Some(&[0, 4, 7, 11]),
        "m7" => Some(&[0, 3, 7, 10]),
        "mM7" => Some(&[0, 3, 7, 11]),
        "M9" => Some(&[0, 4, 7, 11, 14]),
        "m9" => Some(&[0, 3, 7, 10, 14]),
        "m6" => Some(&[0, 3, 7, 9]),
        "o" => Some(&[0, 3, 6]),
        "+" => Some(&[0, 4, 8]),
        _ => None,
    };
    if exact.is_some() {
        return exact;
    }

    match quality.to_lowercase().as_str() {
        // Triads
        "maj" | "major" => Some(&[0, 4, 7]),
        "min" | "minor" => Some(&[0, 3, 7]),
        "dim" | "diminished" => Some(&[0, 3, 6]),
        "aug" | "augmented" => Some(&[0, 4, 8]),
        "sus2" => Some(&[0, 2, 7]),
        "sus4" => Some(&[0, 5, 7]),

        // Seventh chords
        "maj7" | "major7" => Some(&[0, 4, 7, 11]),
        "7" | "dom7" => Some(&[0, 4, 7, 10]),
        "min7" => Some(&[0, 3, 7, 10]),
        "dim7" => Some(&[0, 3, 6, 9]),
        "m7b5" | "half-dim" => Some(&[0, 3, 6, 10]),
        "minmaj7" => Some(&[0, 3, 7, 11]),

        // Extended
        "9" => Some(&[0, 4, 7, 10, 14]),
        "maj9" => Some(&[0, 4, 7, 11, 14]),
        "min9" => Some(&[0, 3, 7, 10, 14]),
        "add9" => Some(&[0, 4, 7, 14]),
        "6" => Some(&[0, 4, 7, 9]),
        "min6" => Some(&[0, 3, 7, 9]),

        // Power chord
        "5" | "power" => Some(&[0, 7]),

        _ => None,
    }
}
