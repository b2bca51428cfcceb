//! Virtual Cartesian mesh of workers.
//!
//! Ranks are laid out row-major over a `px x py` torus: rank `r` sits at
//! `(r % px, r / px)`. Both axes are periodic, so every rank has exactly four
//! neighbours, which collapse onto the rank itself along an axis of size 1.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("cannot build a process mesh for zero workers")]
    NoWorkers,
    #[error("{workers} workers cannot be arranged as a {requested} mesh")]
    Infeasible { workers: usize, requested: MeshDims },
    #[error("rank {rank} is outside a mesh of {workers} workers")]
    RankOutOfRange { rank: usize, workers: usize },
}

/// The two mesh axes. `X` runs left/right, `Y` runs up/down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

/// Requested mesh extent per axis; 0 leaves the axis to the factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshDims {
    pub x: usize,
    pub y: usize,
}

impl MeshDims {
    pub const AUTO: MeshDims = MeshDims { x: 0, y: 0 };

    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for MeshDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = |n: usize| if n == 0 { "*".to_string() } else { n.to_string() };
        write!(f, "{}x{}", axis(self.x), axis(self.y))
    }
}

/// Resolves `requested` against the worker count, like `MPI_Dims_create`.
///
/// Free axes are filled with the most balanced factorization; when both are
/// free the larger factor goes to `x`. Fixed axes must divide the worker
/// count exactly.
pub fn dims_create(workers: usize, requested: MeshDims) -> Result<(usize, usize), TopologyError> {
    if workers == 0 {
        return Err(TopologyError::NoWorkers);
    }
    let infeasible = || TopologyError::Infeasible { workers, requested };

    match (requested.x, requested.y) {
        (0, 0) => {
            // largest divisor not above sqrt(workers)
            let mut small = 1;
            let mut d = 1;
            while d * d <= workers {
                if workers % d == 0 {
                    small = d;
                }
                d += 1;
            }
            Ok((workers / small, small))
        }
        (px, 0) if workers % px == 0 => Ok((px, workers / px)),
        (0, py) if workers % py == 0 => Ok((workers / py, py)),
        (px, py) if px * py == workers => Ok((px, py)),
        _ => Err(infeasible()),
    }
}

/// Up/down/left/right neighbour ranks under periodic wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbors {
    pub up: usize,
    pub down: usize,
    pub left: usize,
    pub right: usize,
}

/// This rank's place in the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTopology {
    px: usize,
    py: usize,
    rank: usize,
    cx: usize,
    cy: usize,
}

impl ProcessTopology {
    pub fn new(workers: usize, rank: usize, requested: MeshDims) -> Result<Self, TopologyError> {
        let (px, py) = dims_create(workers, requested)?;
        if rank >= workers {
            return Err(TopologyError::RankOutOfRange { rank, workers });
        }
        Ok(Self {
            px,
            py,
            rank,
            cx: rank % px,
            cy: rank / px,
        })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn workers(&self) -> usize {
        self.px * self.py
    }

    /// Mesh extent `(px, py)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.px, self.py)
    }

    /// Extent along one axis.
    pub fn extent(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.px,
            Axis::Y => self.py,
        }
    }

    /// This rank's mesh coordinates `(cx, cy)`.
    pub fn coords(&self) -> (usize, usize) {
        (self.cx, self.cy)
    }

    /// Rank at mesh coordinates, wrapping both axes.
    pub fn rank_at(&self, cx: isize, cy: isize) -> usize {
        let x = cx.rem_euclid(self.px as isize) as usize;
        let y = cy.rem_euclid(self.py as isize) as usize;
        y * self.px + x
    }

    /// `(source, destination)` for a shift of `displacement` along `axis`,
    /// like `MPI_Cart_shift` on a periodic mesh.
    pub fn shift(&self, axis: Axis, displacement: isize) -> (usize, usize) {
        let (cx, cy) = (self.cx as isize, self.cy as isize);
        match axis {
            Axis::X => (
                self.rank_at(cx - displacement, cy),
                self.rank_at(cx + displacement, cy),
            ),
            Axis::Y => (
                self.rank_at(cx, cy - displacement),
                self.rank_at(cx, cy + displacement),
            ),
        }
    }

    pub fn neighbors(&self) -> Neighbors {
        let (up, down) = self.shift(Axis::Y, 1);
        let (left, right) = self.shift(Axis::X, 1);
        Neighbors {
            up,
            down,
            left,
            right,
        }
    }
}
