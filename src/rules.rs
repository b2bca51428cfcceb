//! Life-like update rule over a ghost-ringed grid.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::grid::LocalGrid;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid rule {rule:?}: expected the form B3/S23")]
pub struct RuleError {
    pub rule: String,
}

/// Birth and survival neighbour counts. Defaults to Conway's B3/S23.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    birth: [bool; 9],
    survival: [bool; 9],
}

impl Rule {
    pub const CONWAY: Rule = Rule {
        birth: [false, false, false, true, false, false, false, false, false],
        survival: [false, false, true, true, false, false, false, false, false],
    };

    /// Next state of a cell given its state and live-neighbour count.
    #[inline]
    pub fn next_state(&self, alive: bool, neighbors: u8) -> bool {
        let n = usize::from(neighbors);
        if alive {
            self.survival[n]
        } else {
            self.birth[n]
        }
    }
}

impl Default for Rule {
    fn default() -> Self {
        Rule::CONWAY
    }
}

impl FromStr for Rule {
    type Err = RuleError;

    /// Parses `B3/S23` notation, case-insensitive, in either order.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RuleError {
            rule: s.to_string(),
        };
        let mut birth = None;
        let mut survival = None;

        for part in s.trim().split('/') {
            let mut chars = part.trim().chars();
            let slot = match chars.next().map(|c| c.to_ascii_uppercase()) {
                Some('B') => &mut birth,
                Some('S') => &mut survival,
                _ => return Err(invalid()),
            };
            if slot.is_some() {
                return Err(invalid());
            }
            let mut counts = [false; 9];
            for c in chars {
                match c.to_digit(10) {
                    Some(d) if d <= 8 => counts[d as usize] = true,
                    _ => return Err(invalid()),
                }
            }
            *slot = Some(counts);
        }

        match (birth, survival) {
            (Some(birth), Some(survival)) => Ok(Rule { birth, survival }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = |set: &[bool; 9]| -> String {
            (0..9)
                .filter(|&n| set[n])
                .map(|n| char::from(b'0' + n as u8))
                .collect()
        };
        write!(f, "B{}/S{}", digits(&self.birth), digits(&self.survival))
    }
}

/// Live cells among the eight Moore neighbours of padded cell `(x, y)`.
///
/// `(x, y)` must be an interior cell; neighbours on the edge of the
/// interior are read from the ghost ring.
#[inline]
pub fn live_neighbors(grid: &LocalGrid, x: usize, y: usize) -> u8 {
    let mut count = 0;
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            if (nx, ny) != (x, y) && grid.get(nx, ny) {
                count += 1;
            }
        }
    }
    count
}

/// Writes the next generation of `current`'s interior into `next`.
///
/// `current` is only read, and its ghost ring must already hold the
/// neighbours' values for this generation. The ghost ring of `next` is left
/// as it was; the next exchange overwrites it.
pub fn evolve(current: &LocalGrid, next: &mut LocalGrid, rule: &Rule) {
    debug_assert_eq!(
        (current.width(), current.height()),
        (next.width(), next.height())
    );
    for y in 1..=current.height() {
        for x in 1..=current.width() {
            let neighbors = live_neighbors(current, x, y);
            next.set(x, y, rule.next_state(current.get(x, y), neighbors));
        }
    }
}
