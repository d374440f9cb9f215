//! Position expressions and concrete coordinates.
//!
//! A position expression has the shape `part:bar:beat`. Every axis is a
//! literal integer, a comma list (`1,3`), the wildcard `*`, or a stride
//! `@n` (every nth index; `@1` selects the odd indices). Parts are never
//! stride-expanded.

use crate::error::{Error, Result};
use crate::form::Form;
use std::fmt;
use std::str::FromStr;

/// A concrete `part:bar:beat` triple, ordered part first, then bar, then beat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coordinate {
    pub part: u32,
    pub bar: u32,
    pub beat: u32,
}

impl Coordinate {
    /// The structural minimum of every form.
    pub const FIRST: Coordinate = Coordinate {
        part: 1,
        bar: 1,
        beat: 1,
    };

    pub const fn new(part: u32, bar: u32, beat: u32) -> Self {
        Self { part, bar, beat }
    }

    /// Step one beat forward, wrapping into the next bar and part using
    /// the per-part counts of `form`.
    pub fn increment(&mut self, form: &Form) {
        // saturating: focus bounds may sit at u32::MAX
        self.beat = self.beat.saturating_add(1);
        if self.beat > form.beats_in(self.part) {
            self.beat = 1;
            self.bar = self.bar.saturating_add(1);
            if self.bar > form.bars_in(self.part) {
                self.bar = 1;
                self.part = self.part.saturating_add(1);
            }
        }
    }

    /// The coordinate one beat ahead of this one.
    pub fn next(self, form: &Form) -> Self {
        let mut next = self;
        next.increment(form);
        next
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.part, self.bar, self.beat)
    }
}

impl FromStr for Coordinate {
    type Err = Error;

    /// Parse exactly three colon separated integers.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidPosition(s.to_string());
        let mut axes = s.split(':').map(|a| a.trim().parse::<u32>());

        let part = axes.next().ok_or_else(invalid)?.map_err(|_| invalid())?;
        let bar = axes.next().ok_or_else(invalid)?.map_err(|_| invalid())?;
        let beat = axes.next().ok_or_else(invalid)?.map_err(|_| invalid())?;
        if axes.next().is_some() {
            return Err(invalid());
        }

        Ok(Self { part, bar, beat })
    }
}

/// A position expression expanded against a form.
///
/// Each axis is kept as a comma-joined string of tokens; literals,
/// lists and wildcards pass through untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub expression: String,
    pub parts: String,
    pub bars: String,
    pub beats: String,
}

impl Position {
    /// Expand `expression` using the structure of `form`.
    ///
    /// Numeric tokens are not validated; a malformed token simply never
    /// matches a loop position.
    pub fn expand(form: &Form, expression: &str) -> Result<Self> {
        let axes: Vec<&str> = expression.split(':').collect();
        let &[parts, bars, beats] = axes.as_slice() else {
            return Err(Error::InvalidPosition(expression.to_string()));
        };

        let parts = if parts == "*" && form.has_parts() {
            (1..=form.parts().len())
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(",")
        } else {
            parts.to_string()
        };

        let part = parts.parse::<u32>().ok().and_then(|n| form.part(n));
        let bar_len = part.map_or(form.bars(), |p| p.bars);
        let beat_len = part.map_or(form.beats(), |p| p.beats);

        Ok(Self {
            expression: expression.to_string(),
            bars: expand_axis(bars, bar_len),
            beats: expand_axis(beats, beat_len),
            parts,
        })
    }

    /// Every literal `part:bar:beat` key the expression addresses.
    pub fn coordinates(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for part in tokens(&self.parts) {
            for bar in tokens(&self.bars) {
                for beat in tokens(&self.beats) {
                    keys.push(format!("{part}:{bar}:{beat}"));
                }
            }
        }
        keys
    }
}

/// Non-empty comma separated tokens of an expanded axis.
pub(crate) fn tokens(axis: &str) -> impl Iterator<Item = &str> {
    axis.split(',').filter(|t| !t.is_empty())
}

fn expand_axis(token: &str, length: u32) -> String {
    match token.strip_prefix('@') {
        Some(nth) => {
            if length == 1 {
                return "0".to_string();
            }
            let nth = nth.parse::<u32>().unwrap_or(0);
            every(nth, length)
        }
        None => token.to_string(),
    }
}

/// Select every `nth` index of `1..=length`. `nth == 1` means every odd index.
fn every(nth: u32, length: u32) -> String {
    (1..=length)
        .filter(|i| match nth {
            0 => false,
            1 => i % 2 == 1,
            n => i % n == 0,
        })
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Part;

    #[test]
    fn test_every() {
        assert_eq!(every(1, 7), "1,3,5,7");
        assert_eq!(every(2, 7), "2,4,6");
        assert_eq!(every(4, 16), "4,8,12,16");
        assert_eq!(every(0, 4), "");
    }

    #[test]
    fn test_expand_literal_and_list() {
        let form = Form::default();
        let pos = Position::expand(&form, "1:@1:1,3").unwrap();
        assert_eq!(pos.parts, "1");
        assert_eq!(pos.bars, "1,3");
        assert_eq!(pos.beats, "1,3");
    }

    #[test]
    fn test_expand_wildcards_without_parts() {
        let form = Form::default();
        let pos = Position::expand(&form, "*:*:@4").unwrap();
        assert_eq!(pos.parts, "*");
        assert_eq!(pos.bars, "*");
        assert_eq!(pos.beats, "4,8,12,16");
    }

    #[test]
    fn test_expand_parts_wildcard() {
        let form = Form::new(4, 16, vec![Part::new(1, 4), Part::new(2, 8)]);
        let pos = Position::expand(&form, "*:1:1").unwrap();
        assert_eq!(pos.parts, "1,2");
    }

    #[test]
    fn test_expand_part_scoped_length() {
        let form = Form::new(4, 16, vec![Part::new(1, 4), Part::new(2, 8)]);

        let pos = Position::expand(&form, "2:@1:@2").unwrap();
        assert_eq!(pos.bars, "1");
        assert_eq!(pos.beats, "2,4,6,8");

        // single bar part collapses to the degenerate slot
        let pos = Position::expand(&form, "1:@2:@2").unwrap();
        assert_eq!(pos.bars, "0");
        assert_eq!(pos.beats, "2,4");

        // a list of parts falls back to the form's counts
        let pos = Position::expand(&form, "1,2:@1:@2").unwrap();
        assert_eq!(pos.bars, "1,3");
        assert_eq!(pos.beats, "2,4,6,8,10,12,14,16");
    }

    #[test]
    fn test_expand_rejects_missing_axis() {
        let form = Form::default();
        assert!(Position::expand(&form, "1:1").is_err());
        assert!(Position::expand(&form, "1:1:1:1").is_err());
    }

    #[test]
    fn test_coordinates() {
        let form = Form::default();
        let pos = Position::expand(&form, "1:1,2:@8").unwrap();
        assert_eq!(
            pos.coordinates(),
            vec!["1:1:8", "1:1:16", "1:2:8", "1:2:16"]
        );
    }

    #[test]
    fn test_coordinate_parse_and_order() {
        let c: Coordinate = "1:2:3".parse().unwrap();
        assert_eq!(c, Coordinate::new(1, 2, 3));
        assert_eq!(c.to_string(), "1:2:3");
        assert!("1:2".parse::<Coordinate>().is_err());
        assert!("1:2:p".parse::<Coordinate>().is_err());
        assert!("1:2-3".parse::<Coordinate>().is_err());

        assert!(Coordinate::new(1, 1, 16) < Coordinate::new(1, 2, 1));
        assert!(Coordinate::new(1, 4, 16) < Coordinate::new(2, 1, 1));
    }

    #[test]
    fn test_coordinate_increment() {
        let form = Form::new(4, 16, vec![Part::new(1, 4), Part::new(2, 8)]);
        let mut c = Coordinate::new(1, 1, 4);
        c.increment(&form);
        assert_eq!(c, Coordinate::new(2, 1, 1));

        let c = Coordinate::new(2, 1, 8).next(&form);
        assert_eq!(c, Coordinate::new(2, 2, 1));

        let flat = Form::new(2, 4, Vec::new());
        assert_eq!(Coordinate::new(1, 2, 4).next(&flat), Coordinate::new(2, 1, 1));
    }

    #[test]
    fn test_coordinate_increment_at_u32_max() {
        let flat = Form::new(2, 4, Vec::new());
        let c = Coordinate::new(1, u32::MAX, u32::MAX).next(&flat);
        assert_eq!(c, Coordinate::new(2, 1, 1));
    }
}
