//! The per-worker generation loop.
//!
//! Each worker owns two buffers of the same shape. One generation is:
//!
//! 1. *exchanging*: refresh the ghost ring of `current` from the neighbours
//!    and wait for every transfer to land,
//! 2. *evolving*: compute `next` from `current`,
//! 3. *emitting* (when due): hand `current` to the snapshot sink,
//! 4. swap the buffers.
//!
//! The generation count is fixed up front; there is no early exit.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

use crate::config::SimulationConfig;
use crate::error::{LifeError, Result};
use crate::grid::{Grid, LocalGrid};
use crate::halo::HaloExchanger;
use crate::partition::Partition;
use crate::pattern::{check_fit, Pattern};
use crate::rules::{self, Rule};
use crate::snapshot::{Frame, SnapshotSink};
use crate::topology::ProcessTopology;
use crate::transport::{MemoryTransport, Transport};

/// Where the initial cells come from.
#[derive(Debug, Clone)]
pub enum Seeding {
    /// Independent random fill on every rank. The stream of rank `r` is
    /// derived from `seed` and `r`, so runs are reproducible and ranks are
    /// not correlated.
    Random { seed: u64, density: f64 },
    /// A decoded RLE pattern, placed at the global origin.
    Pattern(Pattern),
    /// An explicit global field, placed at the global origin.
    Field(Grid),
}

impl Seeding {
    /// Loads the configured pattern, or falls back to a random fill.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        Ok(match &config.pattern {
            Some(path) => Seeding::Pattern(Pattern::load(path)?),
            None => Seeding::Random {
                seed: config.seed,
                density: config.density,
            },
        })
    }

    fn fill(&self, grid: &mut LocalGrid, partition: &Partition, rank: usize) -> Result<()> {
        let (gw, gh) = partition.global_size();
        let (ox, oy) = partition.origin();
        match self {
            Seeding::Random { seed, density } => {
                let mut rng = ChaCha8Rng::seed_from_u64(rank_seed(*seed, rank));
                for y in 0..grid.height() {
                    for x in 0..grid.width() {
                        grid.set_interior(x, y, rng.gen_bool(*density));
                    }
                }
            }
            Seeding::Pattern(pattern) => {
                pattern.check_fit(gw, gh)?;
                grid.load_interior(pattern.cells(), ox, oy);
            }
            Seeding::Field(field) => {
                check_fit(field, gw, gh)?;
                grid.load_interior(field, ox, oy);
            }
        }
        Ok(())
    }
}

/// Per-rank random stream seed.
pub fn rank_seed(seed: u64, rank: usize) -> u64 {
    seed ^ (rank as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Exchanging,
    Evolving,
    Emitting,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initializing => "initializing",
            Phase::Exchanging => "exchanging",
            Phase::Evolving => "evolving",
            Phase::Emitting => "emitting",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// What a worker reports once all generations have run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rank: usize,
    pub origin: (usize, usize),
    pub global_size: (usize, usize),
    pub generations: u64,
    /// Final interior, without the ghost ring.
    pub interior: Grid,
    pub elapsed: Duration,
}

pub struct Simulation<T> {
    transport: T,
    topology: ProcessTopology,
    partition: Partition,
    exchanger: HaloExchanger,
    rule: Rule,
    current: LocalGrid,
    next: LocalGrid,
    generation: u64,
    generations: u64,
    snapshot_every: u64,
    phase: Phase,
}

impl<T: Transport> Simulation<T> {
    /// Builds the topology and partition for this rank, allocates both
    /// buffers and applies the initial fill.
    pub fn new(config: &SimulationConfig, seeding: &Seeding, transport: T) -> Result<Self> {
        config.validate()?;
        let rank = transport.rank();
        let topology = ProcessTopology::new(transport.size(), rank, config.mesh())?;
        let partition = config.partition(&topology)?;
        let rule = config.rule()?;
        if let Seeding::Pattern(pattern) = seeding {
            if let Some(declared) = pattern.rule().filter(|declared| *declared != rule) {
                warn!(rank, %declared, configured = %rule, "pattern was written for another rule");
            }
        }

        let mut current = partition.allocate();
        let next = partition.allocate();
        seeding.fill(&mut current, &partition, rank)?;
        let exchanger = HaloExchanger::new(&current);

        let (px, py) = topology.dims();
        let (cx, cy) = topology.coords();
        let (lw, lh) = partition.local_size();
        let (ox, oy) = partition.origin();
        info!(
            rank,
            mesh = %format_args!("{px}x{py}"),
            coords = %format_args!("({cx}, {cy})"),
            local = %format_args!("{lw}x{lh}"),
            origin = %format_args!("({ox}, {oy})"),
            transfers = HaloExchanger::transfers_per_generation(&topology),
            live = current.live_interior_count(),
            "worker initialized"
        );

        Ok(Self {
            transport,
            topology,
            partition,
            exchanger,
            rule,
            current,
            next,
            generation: 0,
            generations: config.generations,
            snapshot_every: config.snapshot.every,
            phase: Phase::Initializing,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Generations completed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn topology(&self) -> &ProcessTopology {
        &self.topology
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// The current buffer, ghost ring included.
    pub fn grid(&self) -> &LocalGrid {
        &self.current
    }

    fn enter(&mut self, phase: Phase) {
        trace!(rank = self.topology.rank(), generation = self.generation, from = %self.phase, to = %phase, "phase");
        self.phase = phase;
    }

    /// Advances one generation. Fails with [`LifeError::Terminated`] once
    /// the configured number of generations has run.
    pub fn step<S: SnapshotSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        if self.generation >= self.generations {
            if self.phase != Phase::Terminated {
                self.enter(Phase::Terminated);
            }
            return Err(LifeError::Terminated);
        }

        self.enter(Phase::Exchanging);
        self.exchanger
            .exchange(&mut self.current, &self.topology, &mut self.transport)?;

        self.enter(Phase::Evolving);
        rules::evolve(&self.current, &mut self.next, &self.rule);

        if self.snapshot_every > 0 && self.generation % self.snapshot_every == 0 {
            self.enter(Phase::Emitting);
            sink.emit(&Frame {
                rank: self.topology.rank(),
                generation: self.generation,
                origin: self.partition.origin(),
                global_size: self.partition.global_size(),
                grid: &self.current,
            })?;
        }

        std::mem::swap(&mut self.current, &mut self.next);
        self.generation += 1;
        debug!(rank = self.topology.rank(), generation = self.generation, "generation complete");
        if self.generation == self.generations {
            self.enter(Phase::Terminated);
        }
        Ok(())
    }

    /// Runs the remaining generations and shuts the worker down.
    pub fn run<S: SnapshotSink + ?Sized>(mut self, sink: &mut S) -> Result<RunSummary> {
        let started = Instant::now();
        while self.generation < self.generations {
            self.step(sink)?;
        }
        if self.phase != Phase::Terminated {
            self.enter(Phase::Terminated);
        }

        let summary = RunSummary {
            rank: self.topology.rank(),
            origin: self.partition.origin(),
            global_size: self.partition.global_size(),
            generations: self.generation,
            interior: self.current.interior_grid(),
            elapsed: started.elapsed(),
        };
        info!(
            rank = summary.rank,
            generations = summary.generations,
            live = summary.interior.live_count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "worker finished"
        );
        Ok(summary)
    }
}

/// Runs `workers` ranks as threads of this process, connected by a
/// [`MemoryTransport`] mesh. `make_sink` builds each rank's snapshot sink
/// on that rank's thread.
///
/// On failure the root cause is returned rather than the peer losses it
/// triggered on the other ranks.
pub fn run_threaded<F, S>(
    config: &SimulationConfig,
    seeding: &Seeding,
    workers: usize,
    make_sink: F,
) -> Result<Vec<RunSummary>>
where
    F: Fn(usize) -> S + Sync,
    S: SnapshotSink,
{
    let make_sink = &make_sink;
    let outcomes: Vec<Result<RunSummary>> = thread::scope(|scope| {
        let spawned: Vec<_> = MemoryTransport::mesh(workers)
            .into_iter()
            .map(|transport| {
                let rank = transport.rank();
                // a closure that fails to spawn drops its endpoint, so the
                // started ranks see a peer loss instead of waiting forever
                let handle = thread::Builder::new()
                    .name(format!("rank-{rank}"))
                    .spawn_scoped(scope, move || {
                        let mut sink = make_sink(rank);
                        Simulation::new(config, seeding, transport)?.run(&mut sink)
                    });
                (rank, handle)
            })
            .collect();
        spawned
            .into_iter()
            .map(|(rank, handle)| match handle {
                Ok(handle) => handle
                    .join()
                    .unwrap_or(Err(LifeError::WorkerPanicked { rank })),
                Err(source) => Err(LifeError::Spawn { rank, source }),
            })
            .collect()
    });

    let mut summaries = Vec::with_capacity(workers);
    let mut failure: Option<LifeError> = None;
    for outcome in outcomes {
        match outcome {
            Ok(summary) => summaries.push(summary),
            Err(err) => {
                let root_cause = failure
                    .as_ref()
                    .map_or(true, |first| first.is_peer_loss() && !err.is_peer_loss());
                if root_cause {
                    failure = Some(err);
                }
            }
        }
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(summaries),
    }
}

/// Stitches rank interiors back into the global grid.
pub fn assemble(summaries: &[RunSummary]) -> Grid {
    let (gw, gh) = summaries
        .first()
        .map(|s| s.global_size)
        .unwrap_or((0, 0));
    let mut grid = Grid::new(gw, gh);
    for summary in summaries {
        let (ox, oy) = summary.origin;
        for y in 0..summary.interior.height() {
            for x in 0..summary.interior.width() {
                grid.set(ox + x, oy + y, summary.interior.get(x, y));
            }
        }
    }
    grid
}
