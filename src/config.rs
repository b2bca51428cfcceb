//! Run configuration.
//!
//! Everything the simulation needs is carried in one [`SimulationConfig`]
//! value, loaded from TOML and/or filled in from the command line:
//!
//! ```toml
//! generations = 200
//! mesh_x = 2
//! seed = 7
//!
//! [grid]
//! split = "global"
//! width = 64
//! height = 32
//!
//! [snapshot]
//! vtk = true
//! every = 10
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::partition::{Partition, PartitionError};
use crate::rules::{Rule, RuleError};
use crate::topology::{MeshDims, ProcessTopology};

pub const DEFAULT_GENERATIONS: u64 = 100;
pub const DEFAULT_LOCAL_WIDTH: usize = 10;
pub const DEFAULT_LOCAL_HEIGHT: usize = 1;
pub const DEFAULT_DENSITY: f64 = 0.1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How the grid size is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "split", rename_all = "snake_case")]
pub enum GridSpec {
    /// Size of each rank's sub-domain; the global grid grows with the mesh.
    PerRank { width: usize, height: usize },
    /// Size of the whole grid; must divide evenly over the mesh.
    Global { width: usize, height: usize },
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec::PerRank {
            width: DEFAULT_LOCAL_WIDTH,
            height: DEFAULT_LOCAL_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotConfig {
    /// Write `.vti` files.
    pub vtk: bool,
    /// Emit every this many generations; 0 never emits.
    pub every: u64,
    pub directory: PathBuf,
    pub prefix: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            vtk: false,
            every: 1,
            directory: PathBuf::from("vti"),
            prefix: "gol".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub generations: u64,
    pub grid: GridSpec,
    /// Requested mesh width in workers, 0 = choose.
    pub mesh_x: usize,
    /// Requested mesh height in workers, 0 = choose.
    pub mesh_y: usize,
    /// RLE file with the initial cells. Random fill when absent.
    pub pattern: Option<PathBuf>,
    pub seed: u64,
    /// Probability that a randomly filled cell starts alive.
    pub density: f64,
    pub rule: String,
    pub snapshot: SnapshotConfig,
    /// Print each emitted generation to the terminal.
    pub show: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            generations: DEFAULT_GENERATIONS,
            grid: GridSpec::default(),
            mesh_x: 0,
            mesh_y: 0,
            pattern: None,
            seed: 0,
            density: DEFAULT_DENSITY,
            rule: Rule::CONWAY.to_string(),
            snapshot: SnapshotConfig::default(),
            show: false,
        }
    }
}

impl SimulationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = match self.grid {
            GridSpec::PerRank { width, height } | GridSpec::Global { width, height } => {
                (width, height)
            }
        };
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must be at least 1x1, got {width}x{height}"
            )));
        }
        if !(0.0..=1.0).contains(&self.density) {
            return Err(ConfigError::Invalid(format!(
                "density {} is not a probability",
                self.density
            )));
        }
        self.rule()?;
        Ok(())
    }

    pub fn mesh(&self) -> MeshDims {
        MeshDims::new(self.mesh_x, self.mesh_y)
    }

    pub fn rule(&self) -> Result<Rule, ConfigError> {
        Ok(self.rule.parse()?)
    }

    pub fn partition(&self, topology: &ProcessTopology) -> Result<Partition, PartitionError> {
        match self.grid {
            GridSpec::PerRank { width, height } => Partition::from_local(width, height, topology),
            GridSpec::Global { width, height } => Partition::from_global(width, height, topology),
        }
    }
}
