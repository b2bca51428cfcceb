//! Point-to-point messaging used by the halo exchange.
//!
//! A [`Transport`] moves the boundary slices of one axis per call: two
//! non-blocking sends and two non-blocking receives are posted, then the
//! call blocks until all four have completed. Returning from
//! [`Transport::exchange`] is the fence the update step relies on.
//!
//! Two backends exist: [`memory::MemoryTransport`] connects worker threads
//! over channels, and `mpi::MpiTransport` (feature `mpi`) runs one worker per
//! MPI process.

use thiserror::Error;

use crate::topology::Axis;

pub mod memory;
#[cfg(feature = "mpi")]
pub mod mpi;

pub use memory::MemoryTransport;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("peer rank {peer} is unreachable")]
    PeerUnreachable { peer: usize },
    #[error("expected {expected} cells from rank {peer}, received {actual}")]
    LengthMismatch {
        peer: usize,
        expected: usize,
        actual: usize,
    },
    #[error("rank {rank} is not part of a {size}-worker transport")]
    UnknownRank { rank: usize, size: usize },
    #[error("message passing backend failed: {0}")]
    Backend(String),
}

/// Which way along an axis a slice travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward the lower-coordinate neighbour (up or left).
    Predecessor,
    /// Toward the higher-coordinate neighbour (down or right).
    Successor,
}

/// Message tag for a slice travelling `direction` along `axis`.
///
/// Tags keep the two directions apart when both neighbours along an axis
/// are the same rank (a mesh two workers wide), and keep row traffic from
/// matching column receives.
pub fn tag(axis: Axis, direction: Direction) -> u16 {
    match (axis, direction) {
        (Axis::Y, Direction::Successor) => 10,
        (Axis::Y, Direction::Predecessor) => 11,
        (Axis::X, Direction::Successor) => 20,
        (Axis::X, Direction::Predecessor) => 21,
    }
}

/// Send and receive buffers for one axis of a halo exchange.
///
/// `from_predecessor` receives what the predecessor sent toward its
/// successor, and the other way round.
#[derive(Debug)]
pub struct AxisMessages<'a> {
    pub axis: Axis,
    pub predecessor: usize,
    pub successor: usize,
    pub to_predecessor: &'a [u8],
    pub to_successor: &'a [u8],
    pub from_predecessor: &'a mut [u8],
    pub from_successor: &'a mut [u8],
}

pub trait Transport {
    /// This worker's rank.
    fn rank(&self) -> usize;

    /// Number of workers reachable through this transport.
    fn size(&self) -> usize;

    /// Posts the four transfers of one axis and waits for all of them.
    fn exchange(&mut self, messages: AxisMessages<'_>) -> Result<(), ExchangeError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn exchange(&mut self, messages: AxisMessages<'_>) -> Result<(), ExchangeError> {
        (**self).exchange(messages)
    }
}
