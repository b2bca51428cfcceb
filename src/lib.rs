//! Conway's Game of Life on a periodic two-dimensional mesh of workers.
//!
//! The global grid is a torus cut into equal rectangles, one per worker.
//! Every generation each worker refreshes the one-cell ghost ring around its
//! rectangle from its neighbours, then evolves its interior locally.
//! Workers are threads of one process ([`transport::MemoryTransport`]) or,
//! with the `mpi` feature, separate MPI processes.

pub mod config;
pub mod display;
pub mod error;
pub mod grid;
pub mod halo;
pub mod partition;
pub mod pattern;
pub mod rules;
pub mod simulation;
pub mod snapshot;
pub mod topology;
pub mod transport;

pub use config::SimulationConfig;
pub use error::{LifeError, Result};
pub use grid::{Grid, LocalGrid};
pub use rules::Rule;
pub use simulation::{assemble, run_threaded, RunSummary, Seeding, Simulation};
