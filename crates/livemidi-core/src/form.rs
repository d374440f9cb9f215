//! Musical form: parts, bars and beats, and the playable bounds.
//!
//! The form decides the path the [`Loop`](crate::looper::Loop) walks.
//! Without parts it is a single part of `bars` bars of `beats` beats;
//! with parts every part carries its own bar and beat counts.

use crate::error::{Error, Result};
use crate::position::Coordinate;
use serde::{Deserialize, Serialize};

/// Default number of bars in a form.
pub const DEFAULT_BARS: u32 = 4;
/// Default number of beats per bar.
pub const DEFAULT_BEATS: u32 = 16;

/// One section of a form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub bars: u32,
    pub beats: u32,
}

impl Part {
    pub fn new(bars: u32, beats: u32) -> Self {
        Self { bars, beats }
    }
}

/// Structure of a composition and its inclusive `[first, last]` bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct Form {
    bars: u32,
    beats: u32,
    parts: Vec<Part>,
    bounds: [Coordinate; 2],
}

impl Default for Form {
    fn default() -> Self {
        Self::new(DEFAULT_BARS, DEFAULT_BEATS, Vec::new())
    }
}

impl Form {
    /// Create a form and compute its structural bounds.
    pub fn new(bars: u32, beats: u32, parts: Vec<Part>) -> Self {
        let mut form = Self {
            bars,
            beats,
            parts,
            bounds: [Coordinate::FIRST; 2],
        };
        form.set_bounds();
        form
    }

    /// Replace the structure and recompute the bounds.
    pub fn update(&mut self, bars: u32, beats: u32, parts: Vec<Part>) {
        self.bars = bars;
        self.beats = beats;
        self.parts = parts;
        self.set_bounds();
    }

    /// Restore 4 bars of 16 beats without parts.
    pub fn reset(&mut self) {
        self.update(DEFAULT_BARS, DEFAULT_BEATS, Vec::new());
    }

    /// Narrow the bounds to `[start, end]`, used to focus on a section.
    ///
    /// Both ends must be three integers and `start <= end` comparing
    /// part, then bar, then beat.
    pub fn update_bounds(&mut self, start: &str, end: &str) -> Result<()> {
        let invalid = || Error::InvalidBounds {
            start: start.to_string(),
            end: end.to_string(),
        };
        let sp: Coordinate = start.parse().map_err(|_| invalid())?;
        let ep: Coordinate = end.parse().map_err(|_| invalid())?;

        if sp > ep {
            return Err(invalid());
        }

        self.bounds = [sp, ep];
        Ok(())
    }

    fn set_bounds(&mut self) {
        self.bounds[0] = Coordinate::FIRST;
        self.bounds[1] = match self.last_part() {
            Some(lp) => Coordinate::new(self.parts.len() as u32, lp.bars, lp.beats),
            None => Coordinate::new(1, self.bars, self.beats),
        };
    }

    pub fn bars(&self) -> u32 {
        self.bars
    }

    pub fn beats(&self) -> u32 {
        self.beats
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn bounds(&self) -> [Coordinate; 2] {
        self.bounds
    }

    /// Lower bound, where the loop starts.
    pub fn first(&self) -> Coordinate {
        self.bounds[0]
    }

    /// Upper bound, the last coordinate the loop plays.
    pub fn last(&self) -> Coordinate {
        self.bounds[1]
    }

    /// Look up a part by its one-based number.
    pub fn part(&self, n: u32) -> Option<&Part> {
        let idx = (n as usize).checked_sub(1)?;
        self.parts.get(idx)
    }

    pub fn first_part(&self) -> Option<&Part> {
        self.parts.first()
    }

    pub fn last_part(&self) -> Option<&Part> {
        self.parts.last()
    }

    pub fn has_parts(&self) -> bool {
        !self.parts.is_empty()
    }

    /// Bars in part `n`, or the form's bars when the part does not exist.
    pub fn bars_in(&self, n: u32) -> u32 {
        self.part(n).map_or(self.bars, |p| p.bars)
    }

    /// Beats per bar in part `n`, or the form's beats when the part does not exist.
    pub fn beats_in(&self, n: u32) -> u32 {
        self.part(n).map_or(self.beats, |p| p.beats)
    }
}
