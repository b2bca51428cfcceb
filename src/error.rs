//! Crate-wide error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::partition::PartitionError;
use crate::pattern::PatternError;
use crate::snapshot::SnapshotError;
use crate::topology::TopologyError;
use crate::transport::ExchangeError;

pub type Result<T, E = LifeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LifeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("process mesh: {0}")]
    Topology(#[from] TopologyError),
    #[error("domain decomposition: {0}")]
    Partition(#[from] PartitionError),
    #[error("halo exchange: {0}")]
    Exchange(#[from] ExchangeError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("simulation has already terminated")]
    Terminated,
    #[error("cannot start worker thread for rank {rank}")]
    Spawn {
        rank: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("worker thread for rank {rank} panicked")]
    WorkerPanicked { rank: usize },
}

impl LifeError {
    /// True for errors that only report another worker going away.
    pub fn is_peer_loss(&self) -> bool {
        matches!(
            self,
            LifeError::Exchange(ExchangeError::PeerUnreachable { .. })
        )
    }
}
