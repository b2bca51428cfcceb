//! ANSI terminal rendering.

use crate::grid::Grid;

const HOME: &str = "\x1b[H";
const LIVE: &str = "\x1b[07m  \x1b[m";
const DEAD: &str = "  ";

/// Draws `grid` from the top-left of the terminal, one inverse-video
/// double-width block per live cell.
pub fn render(grid: &Grid) -> String {
    let mut out = String::with_capacity(HOME.len() + grid.height() * (grid.width() * LIVE.len() + 1));
    out.push_str(HOME);
    for row in grid.rows() {
        for &alive in row {
            out.push_str(if alive { LIVE } else { DEAD });
        }
        out.push('\n');
    }
    out
}
