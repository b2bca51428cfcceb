//! Run-length encoded (RLE) life patterns.
//!
//! ```text
//! #N Glider
//! x = 3, y = 3, rule = B3/S23
//! bob$2bo$3o!
//! ```
//!
//! `#` lines are comments. The header gives the bounding box. In the body
//! `b` is a dead cell, `o` a live cell, `$` ends a row and `!` ends the
//! pattern; a number in front of any of them repeats it. The first row of
//! the body is the top row of the pattern.
//!
//! Malformed body input never aborts a load: the offending character is
//! logged and skipped, together with any run count in front of it.

mod lexer;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::grid::Grid;
use crate::rules::Rule;

pub use lexer::{Lexer, Token, TokenKind};

/// Largest bounding box a header may declare, in cells.
pub const MAX_PATTERN_CELLS: usize = 1 << 26;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("cannot read pattern file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("pattern has no `x = <width>, y = <height>` line")]
    MissingHeader,
    #[error("line {line}: malformed pattern header {text:?}")]
    BadHeader { line: usize, text: String },
    #[error("line {line}, column {column}: unexpected character {found:?}")]
    UnexpectedChar {
        found: char,
        line: usize,
        column: usize,
    },
    #[error("line {line}, column {column}: run count does not fit in 32 bits")]
    CountTooLarge { line: usize, column: usize },
    #[error("{width}x{height} pattern does not fit a {grid_width}x{grid_height} grid")]
    DoesNotFit {
        width: usize,
        height: usize,
        grid_width: usize,
        grid_height: usize,
    },
}

/// A decoded pattern: its bounding box and the rule it was written for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    cells: Grid,
    rule: Option<Rule>,
}

impl Pattern {
    pub fn load(path: &Path) -> Result<Self, PatternError> {
        let text = fs::read_to_string(path).map_err(|source| PatternError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let pattern = Self::parse(&text)?;
        debug!(
            path = %path.display(),
            width = pattern.cells.width(),
            height = pattern.cells.height(),
            live = pattern.cells.live_count(),
            "pattern loaded"
        );
        Ok(pattern)
    }

    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let mut offset = 0;
        let mut header = None;
        for (index, line) in text.split_inclusive('\n').enumerate() {
            offset += line.len();
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            header = Some((index + 1, trimmed));
            break;
        }
        let (header_line, header_text) = header.ok_or(PatternError::MissingHeader)?;
        let (width, height, rule) = parse_header(header_line, header_text)?;

        let cells = parse_body(Lexer::new(&text[offset..], header_line + 1), width, height);
        Ok(Self { cells, rule })
    }

    pub fn cells(&self) -> &Grid {
        &self.cells
    }

    /// Rule named in the header, if any.
    pub fn rule(&self) -> Option<Rule> {
        self.rule
    }

    /// Fails unless the pattern's bounding box fits a `width x height`
    /// grid when dropped at its top-left.
    pub fn check_fit(&self, width: usize, height: usize) -> Result<(), PatternError> {
        check_fit(&self.cells, width, height)
    }
}

/// Fails unless `cells` fits a `width x height` grid at its top-left.
pub fn check_fit(cells: &Grid, width: usize, height: usize) -> Result<(), PatternError> {
    if cells.width() > width || cells.height() > height {
        return Err(PatternError::DoesNotFit {
            width: cells.width(),
            height: cells.height(),
            grid_width: width,
            grid_height: height,
        });
    }
    Ok(())
}

fn parse_header(line: usize, text: &str) -> Result<(usize, usize, Option<Rule>), PatternError> {
    let bad = || PatternError::BadHeader {
        line,
        text: text.to_string(),
    };
    let mut width = None;
    let mut height = None;
    let mut rule = None;

    for field in text.split(',') {
        let (key, value) = field.split_once('=').ok_or_else(bad)?;
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "x" => width = Some(value.parse::<usize>().map_err(|_| bad())?),
            "y" => height = Some(value.parse::<usize>().map_err(|_| bad())?),
            "rule" => rule = Some(value.parse::<Rule>().map_err(|_| bad())?),
            other => warn!(line, key = other, "ignoring unknown pattern header field"),
        }
    }

    match (width, height) {
        (Some(width), Some(height)) => match width.checked_mul(height) {
            Some(cells) if cells <= MAX_PATTERN_CELLS => Ok((width, height, rule)),
            _ => Err(bad()),
        },
        _ => Err(bad()),
    }
}

fn parse_body(lexer: Lexer<'_>, width: usize, height: usize) -> Grid {
    let mut grid = Grid::new(width, height);
    let (mut x, mut y) = (0usize, 0usize);
    let mut run: Option<u32> = None;
    let mut clipped = 0usize;
    let mut terminated = false;

    for token in lexer {
        let token = match token {
            Ok(token) => token,
            Err(error) => {
                warn!(%error, "skipping unrecognized pattern input");
                run = None;
                continue;
            }
        };
        let repeat = |run: &mut Option<u32>| run.take().unwrap_or(1) as usize;
        match token.kind {
            TokenKind::Count(n) => run = Some(n),
            TokenKind::Dead => x += repeat(&mut run),
            TokenKind::Alive => {
                for _ in 0..repeat(&mut run) {
                    if x < width && y < height {
                        grid.set(x, y, true);
                    } else {
                        clipped += 1;
                    }
                    x += 1;
                }
            }
            TokenKind::EndOfRow => {
                y += repeat(&mut run);
                x = 0;
            }
            TokenKind::End => {
                if run.is_some() {
                    warn!(line = token.line, column = token.column, "run count before '!' ignored");
                }
                terminated = true;
                break;
            }
        }
    }

    if !terminated {
        warn!("pattern ended without '!'");
    }
    if clipped > 0 {
        warn!(clipped, width, height, "live cells outside the declared bounds were dropped");
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLIDER: &str = "#N Glider\n#C a comment\nx = 3, y = 3, rule = B3/S23\nbob$2bo$3o!\n";

    #[test]
    fn parses_glider() {
        let pattern = Pattern::parse(GLIDER).unwrap();
        assert_eq!(pattern.cells(), &Grid::from_rows(&[".o.", "..o", "ooo"]));
        assert_eq!(pattern.rule(), Some(Rule::CONWAY));
    }

    #[test]
    fn header_without_comments_or_rule() {
        let pattern = Pattern::parse("x=4,y=2\n4o$o2bo!").unwrap();
        assert_eq!(pattern.cells(), &Grid::from_rows(&["oooo", "o..o"]));
        assert_eq!(pattern.rule(), None);
    }

    #[test]
    fn counted_row_ends_skip_rows() {
        let pattern = Pattern::parse("x = 2, y = 4\no3$bo!").unwrap();
        assert_eq!(pattern.cells(), &Grid::from_rows(&["o.", "..", "..", ".o"]));
    }

    #[test]
    fn body_may_span_lines() {
        let pattern = Pattern::parse("x = 3, y = 2\n3o\n$\nobo\n!").unwrap();
        assert_eq!(pattern.cells(), &Grid::from_rows(&["ooo", "o.o"]));
    }

    #[test]
    fn unknown_tokens_are_skipped_without_losing_cells() {
        // `x` and the count in front of `q` are dropped; later cells still land
        let pattern = Pattern::parse("x = 4, y = 2\nox3qo$2o!").unwrap();
        assert_eq!(pattern.cells(), &Grid::from_rows(&["oo..", "oo.."]));
    }

    #[test]
    fn cells_outside_bounds_are_dropped() {
        let pattern = Pattern::parse("x = 2, y = 1\n4o$o!").unwrap();
        assert_eq!(pattern.cells(), &Grid::from_rows(&["oo"]));
    }

    #[test]
    fn missing_terminator_is_tolerated() {
        let pattern = Pattern::parse("x = 1, y = 1\no").unwrap();
        assert_eq!(pattern.cells().live_count(), 1);
    }

    #[test]
    fn header_errors() {
        assert!(matches!(
            Pattern::parse("#C only comments\n"),
            Err(PatternError::MissingHeader)
        ));
        assert!(matches!(
            Pattern::parse("x = 3\nooo!"),
            Err(PatternError::BadHeader { line: 1, .. })
        ));
        assert!(matches!(
            Pattern::parse("#C\nx = three, y = 1\nooo!"),
            Err(PatternError::BadHeader { line: 2, .. })
        ));
        assert!(matches!(
            Pattern::parse("x = 1, y = 1, rule = Q\no!"),
            Err(PatternError::BadHeader { .. })
        ));
    }

    #[test]
    fn fit_check_compares_bounding_box() {
        let pattern = Pattern::parse(GLIDER).unwrap();
        assert!(pattern.check_fit(3, 3).is_ok());
        assert!(pattern.check_fit(5, 4).is_ok());
        assert!(matches!(
            pattern.check_fit(2, 8),
            Err(PatternError::DoesNotFit { grid_width: 2, .. })
        ));
    }

    #[test]
    fn oversized_header_is_rejected_before_allocating() {
        assert!(matches!(
            Pattern::parse("x = 4294967296, y = 4294967297\no!"),
            Err(PatternError::BadHeader { line: 1, .. })
        ));
        assert!(matches!(
            Pattern::parse("x = 100000, y = 100000\no!"),
            Err(PatternError::BadHeader { .. })
        ));
        let large = Pattern::parse("x = 1000, y = 1000\no!").unwrap();
        assert_eq!(large.cells().live_count(), 1);
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let err = Pattern::load(Path::new("/nonexistent/pattern.rle")).unwrap_err();
        assert!(matches!(err, PatternError::Io { .. }));
    }
}
