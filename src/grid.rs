//! Cell containers.
//!
//! [`Grid`] is a plain row-major field of cells. [`LocalGrid`] is what a
//! worker actually evolves: its `width x height` sub-domain wrapped in a
//! one-cell ghost ring, so the buffer is `(width + 2) x (height + 2)`.
//! Padded coordinates run from `0` to `width + 1`; the interior is
//! `1..=width` by `1..=height`.

use std::fmt;

/// A rectangular field of cells, stored row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Grid {
    /// All-dead grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width * height],
        }
    }

    /// Builds a grid from text rows. `o`, `O`, `#`, `*` and `1` are live,
    /// anything else is dead. Short rows are padded with dead cells.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Self {
        let width = rows
            .iter()
            .map(|row| row.as_ref().chars().count())
            .max()
            .unwrap_or(0);
        let mut grid = Self::new(width, rows.len());
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.as_ref().chars().enumerate() {
                grid.set(x, y, matches!(c, 'o' | 'O' | '#' | '*' | '1'));
            }
        }
        grid
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(
            x < self.width && y < self.height,
            "cell ({x}, {y}) outside {}x{} grid",
            self.width,
            self.height
        );
        y * self.width + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.cells[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, alive: bool) {
        let index = self.index(x, y);
        self.cells[index] = alive;
    }

    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|&&alive| alive).count()
    }

    /// Rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        // chunks() rejects a zero chunk size
        self.cells.chunks(self.width.max(1))
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            for &alive in row {
                f.write_str(if alive { "o" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// One edge of a [`LocalGrid`].
///
/// As a send payload it names the interior row or column just inside that
/// edge; as a receive target it names the ghost row or column on that edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GhostRegion {
    Top,
    Bottom,
    Left,
    Right,
}

/// A worker's sub-domain plus its ghost ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalGrid {
    width: usize,
    height: usize,
    cells: Grid,
}

impl LocalGrid {
    /// All-dead buffer for a `width x height` interior.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: Grid::new(width + 2, height + 2),
        }
    }

    /// Interior width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Interior height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell at padded coordinates (ghost ring included).
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.cells.get(x, y)
    }

    /// Sets a cell at padded coordinates.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, alive: bool) {
        self.cells.set(x, y, alive);
    }

    /// Cell at zero-based interior coordinates.
    #[inline]
    pub fn interior(&self, x: usize, y: usize) -> bool {
        self.cells.get(x + 1, y + 1)
    }

    #[inline]
    pub fn set_interior(&mut self, x: usize, y: usize, alive: bool) {
        self.cells.set(x + 1, y + 1, alive);
    }

    /// Copy of the authoritative region, without the ghost ring.
    pub fn interior_grid(&self) -> Grid {
        let mut out = Grid::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.set(x, y, self.interior(x, y));
            }
        }
        out
    }

    /// Fills the interior from `source`, reading the window whose top-left
    /// corner is `(origin_x, origin_y)`. Cells of the window that fall
    /// outside `source` are dead.
    pub fn load_interior(&mut self, source: &Grid, origin_x: usize, origin_y: usize) {
        for y in 0..self.height {
            for x in 0..self.width {
                let (gx, gy) = (origin_x + x, origin_y + y);
                let alive = gx < source.width() && gy < source.height() && source.get(gx, gy);
                self.set_interior(x, y, alive);
            }
        }
    }

    pub fn live_interior_count(&self) -> usize {
        (0..self.height)
            .map(|y| (0..self.width).filter(|&x| self.interior(x, y)).count())
            .sum()
    }

    /// Number of cells in the slice exchanged across `region`.
    ///
    /// Rows cover the interior columns only. Columns cover the full padded
    /// height so that, once the ghost rows are filled, a column exchange
    /// also carries the corner cells.
    pub fn boundary_len(&self, region: GhostRegion) -> usize {
        match region {
            GhostRegion::Top | GhostRegion::Bottom => self.width,
            GhostRegion::Left | GhostRegion::Right => self.height + 2,
        }
    }

    /// Copies the interior slice adjacent to `region` into `out`.
    pub fn pack_boundary(&self, region: GhostRegion, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.boundary_len(region));
        match region {
            GhostRegion::Top => self.pack_row(1, out),
            GhostRegion::Bottom => self.pack_row(self.height, out),
            GhostRegion::Left => self.pack_column(1, out),
            GhostRegion::Right => self.pack_column(self.width, out),
        }
    }

    /// Writes a neighbour's boundary slice into the ghost slice on `region`.
    pub fn unpack_ghost(&mut self, region: GhostRegion, data: &[u8]) {
        debug_assert_eq!(data.len(), self.boundary_len(region));
        match region {
            GhostRegion::Top => self.unpack_row(0, data),
            GhostRegion::Bottom => self.unpack_row(self.height + 1, data),
            GhostRegion::Left => self.unpack_column(0, data),
            GhostRegion::Right => self.unpack_column(self.width + 1, data),
        }
    }

    /// Periodic fill of the top and bottom ghost rows from this grid's own
    /// interior, for a mesh that is one worker tall.
    pub fn wrap_rows(&mut self) {
        for x in 1..=self.width {
            let top = self.get(x, 1);
            let bottom = self.get(x, self.height);
            self.set(x, 0, bottom);
            self.set(x, self.height + 1, top);
        }
    }

    /// Periodic fill of the left and right ghost columns over the full
    /// padded height, for a mesh that is one worker wide.
    pub fn wrap_columns(&mut self) {
        for y in 0..self.height + 2 {
            let left = self.get(1, y);
            let right = self.get(self.width, y);
            self.set(0, y, right);
            self.set(self.width + 1, y, left);
        }
    }

    fn pack_row(&self, y: usize, out: &mut [u8]) {
        for (x, slot) in (1..=self.width).zip(out.iter_mut()) {
            *slot = u8::from(self.get(x, y));
        }
    }

    fn pack_column(&self, x: usize, out: &mut [u8]) {
        for (y, slot) in (0..self.height + 2).zip(out.iter_mut()) {
            *slot = u8::from(self.get(x, y));
        }
    }

    fn unpack_row(&mut self, y: usize, data: &[u8]) {
        for (x, &value) in (1..=self.width).zip(data.iter()) {
            self.set(x, y, value != 0);
        }
    }

    fn unpack_column(&mut self, x: usize, data: &[u8]) {
        for (y, &value) in (0..self.height + 2).zip(data.iter()) {
            self.set(x, y, value != 0);
        }
    }
}
