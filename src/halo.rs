//! Ghost ring maintenance.
//!
//! The ring is refreshed in two fenced phases each generation. Rows go
//! first, trading the interior top and bottom rows with the up and down
//! neighbours. Columns go second and span the full padded height, so the
//! ghost rows just received travel sideways with them and the four corner
//! cells end up holding the diagonal neighbours' values. An axis with a
//! single worker is wrapped in place without any messages.

use tracing::trace;

use crate::grid::{GhostRegion, LocalGrid};
use crate::topology::{Axis, ProcessTopology};
use crate::transport::{AxisMessages, ExchangeError, Transport};

#[derive(Debug)]
struct AxisBuffers {
    to_pred: Vec<u8>,
    to_succ: Vec<u8>,
    from_pred: Vec<u8>,
    from_succ: Vec<u8>,
}

impl AxisBuffers {
    fn new(len: usize) -> Self {
        Self {
            to_pred: vec![0; len],
            to_succ: vec![0; len],
            from_pred: vec![0; len],
            from_succ: vec![0; len],
        }
    }
}

/// Reusable send/receive staging for one grid shape.
#[derive(Debug)]
pub struct HaloExchanger {
    rows: AxisBuffers,
    columns: AxisBuffers,
}

impl HaloExchanger {
    pub fn new(grid: &LocalGrid) -> Self {
        Self {
            rows: AxisBuffers::new(grid.boundary_len(GhostRegion::Top)),
            columns: AxisBuffers::new(grid.boundary_len(GhostRegion::Left)),
        }
    }

    /// Point-to-point transfers posted per generation: four for every axis
    /// with more than one worker.
    pub fn transfers_per_generation(topology: &ProcessTopology) -> usize {
        [Axis::X, Axis::Y]
            .into_iter()
            .filter(|&axis| topology.extent(axis) > 1)
            .count()
            * 4
    }

    /// Brings every ghost cell of `grid` up to date with the neighbours'
    /// current interiors. Returns only once all transfers have completed.
    pub fn exchange<T: Transport>(
        &mut self,
        grid: &mut LocalGrid,
        topology: &ProcessTopology,
        transport: &mut T,
    ) -> Result<(), ExchangeError> {
        self.exchange_axis(Axis::Y, grid, topology, transport)?;
        self.exchange_axis(Axis::X, grid, topology, transport)
    }

    fn exchange_axis<T: Transport>(
        &mut self,
        axis: Axis,
        grid: &mut LocalGrid,
        topology: &ProcessTopology,
        transport: &mut T,
    ) -> Result<(), ExchangeError> {
        if topology.extent(axis) == 1 {
            match axis {
                Axis::Y => grid.wrap_rows(),
                Axis::X => grid.wrap_columns(),
            }
            return Ok(());
        }

        let (pred_region, succ_region, buffers) = match axis {
            Axis::Y => (GhostRegion::Top, GhostRegion::Bottom, &mut self.rows),
            Axis::X => (GhostRegion::Left, GhostRegion::Right, &mut self.columns),
        };
        let (predecessor, successor) = topology.shift(axis, 1);

        grid.pack_boundary(pred_region, &mut buffers.to_pred);
        grid.pack_boundary(succ_region, &mut buffers.to_succ);

        transport.exchange(AxisMessages {
            axis,
            predecessor,
            successor,
            to_predecessor: &buffers.to_pred,
            to_successor: &buffers.to_succ,
            from_predecessor: &mut buffers.from_pred,
            from_successor: &mut buffers.from_succ,
        })?;

        grid.unpack_ghost(pred_region, &buffers.from_pred);
        grid.unpack_ghost(succ_region, &buffers.from_succ);
        trace!(rank = topology.rank(), ?axis, predecessor, successor, "ghost slices updated");
        Ok(())
    }
}
