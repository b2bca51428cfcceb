//! Mapping of the global grid onto the process mesh.

use thiserror::Error;

use crate::grid::LocalGrid;
use crate::topology::{Axis, ProcessTopology};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("grid {axis:?} extent {cells} does not split evenly across {parts} workers")]
    Uneven {
        axis: Axis,
        cells: usize,
        parts: usize,
    },
    #[error("sub-domains must be at least one cell wide and tall, got {width}x{height}")]
    Empty { width: usize, height: usize },
}

/// One rank's share of the global grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    global_width: usize,
    global_height: usize,
    local_width: usize,
    local_height: usize,
    origin_x: usize,
    origin_y: usize,
}

impl Partition {
    /// Splits a `global_width x global_height` grid over the mesh. Both
    /// extents must divide exactly by the mesh extent on that axis.
    pub fn from_global(
        global_width: usize,
        global_height: usize,
        topology: &ProcessTopology,
    ) -> Result<Self, PartitionError> {
        let (px, py) = topology.dims();
        if global_width % px != 0 {
            return Err(PartitionError::Uneven {
                axis: Axis::X,
                cells: global_width,
                parts: px,
            });
        }
        if global_height % py != 0 {
            return Err(PartitionError::Uneven {
                axis: Axis::Y,
                cells: global_height,
                parts: py,
            });
        }
        Self::from_local(global_width / px, global_height / py, topology)
    }

    /// Every rank owns a `local_width x local_height` block; the global grid
    /// is the mesh of those blocks.
    pub fn from_local(
        local_width: usize,
        local_height: usize,
        topology: &ProcessTopology,
    ) -> Result<Self, PartitionError> {
        if local_width == 0 || local_height == 0 {
            return Err(PartitionError::Empty {
                width: local_width,
                height: local_height,
            });
        }
        let (px, py) = topology.dims();
        let (cx, cy) = topology.coords();
        Ok(Self {
            global_width: local_width * px,
            global_height: local_height * py,
            local_width,
            local_height,
            origin_x: cx * local_width,
            origin_y: cy * local_height,
        })
    }

    pub fn global_size(&self) -> (usize, usize) {
        (self.global_width, self.global_height)
    }

    pub fn local_size(&self) -> (usize, usize) {
        (self.local_width, self.local_height)
    }

    /// Global coordinates of this rank's top-left interior cell.
    pub fn origin(&self) -> (usize, usize) {
        (self.origin_x, self.origin_y)
    }

    /// A fresh all-dead buffer with the ghost ring.
    pub fn allocate(&self) -> LocalGrid {
        LocalGrid::new(self.local_width, self.local_height)
    }
}
