use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mesh_life::config::{
    GridSpec, SimulationConfig, DEFAULT_GENERATIONS, DEFAULT_LOCAL_HEIGHT, DEFAULT_LOCAL_WIDTH,
};
use mesh_life::snapshot::{Discard, SnapshotSink, TerminalSink, Tee, VtkWriter};
use mesh_life::{assemble, run_threaded, Seeding};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Every rank is a thread of this process
    Threads,
    /// Every rank is an MPI process; launch with mpirun
    Mpi,
}

/// Game of Life on a periodic mesh of workers
#[derive(Parser, Debug)]
#[command(name = "mesh_life")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Game of Life on a periodic process mesh", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// TOML configuration file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Backend::Threads)]
    backend: Backend,

    /// Worker threads for the threads backend
    #[arg(short = 'n', long, default_value_t = 1)]
    workers: usize,

    /// Generations to run; zero or less uses the default
    #[arg(short, long, allow_negative_numbers = true)]
    generations: Option<i64>,

    /// Sub-domain width per worker; zero or less uses the default
    #[arg(long, allow_negative_numbers = true)]
    width: Option<i64>,

    /// Sub-domain height per worker; zero or less uses the default
    #[arg(long, allow_negative_numbers = true)]
    height: Option<i64>,

    /// Whole-grid width, split over the mesh
    #[arg(long, requires = "global_height", conflicts_with_all = ["width", "height"])]
    global_width: Option<usize>,

    /// Whole-grid height, split over the mesh
    #[arg(long, requires = "global_width")]
    global_height: Option<usize>,

    /// Workers along x, 0 chooses
    #[arg(long)]
    mesh_x: Option<usize>,

    /// Workers along y, 0 chooses
    #[arg(long)]
    mesh_y: Option<usize>,

    /// RLE file with the initial pattern
    #[arg(short, long)]
    pattern: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Probability that a random cell starts alive
    #[arg(long)]
    density: Option<f64>,

    /// Birth/survival rule, e.g. B3/S23
    #[arg(long)]
    rule: Option<String>,

    /// Write VTK ImageData snapshots
    #[arg(long)]
    vtk: bool,

    /// Emit every N generations, 0 never
    #[arg(long)]
    snapshot_every: Option<u64>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    prefix: Option<String>,

    /// Draw each emitted generation in the terminal
    #[arg(long)]
    show: bool,
}

fn or_default(value: i64, default: usize) -> usize {
    usize::try_from(value).ok().filter(|&v| v > 0).unwrap_or(default)
}

impl Cli {
    fn into_config(self) -> anyhow::Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SimulationConfig::default(),
        };

        if let Some(generations) = self.generations {
            config.generations = or_default(generations, DEFAULT_GENERATIONS as usize) as u64;
        }
        if let (Some(width), Some(height)) = (self.global_width, self.global_height) {
            config.grid = GridSpec::Global { width, height };
        } else if self.width.is_some() || self.height.is_some() {
            let (width, height) = match config.grid {
                GridSpec::PerRank { width, height } => (width, height),
                GridSpec::Global { .. } => (DEFAULT_LOCAL_WIDTH, DEFAULT_LOCAL_HEIGHT),
            };
            config.grid = GridSpec::PerRank {
                width: self.width.map_or(width, |w| or_default(w, DEFAULT_LOCAL_WIDTH)),
                height: self.height.map_or(height, |h| or_default(h, DEFAULT_LOCAL_HEIGHT)),
            };
        }
        if let Some(mesh_x) = self.mesh_x {
            config.mesh_x = mesh_x;
        }
        if let Some(mesh_y) = self.mesh_y {
            config.mesh_y = mesh_y;
        }
        if self.pattern.is_some() {
            config.pattern = self.pattern;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(density) = self.density {
            config.density = density;
        }
        if let Some(rule) = self.rule {
            config.rule = rule;
        }
        if let Some(every) = self.snapshot_every {
            config.snapshot.every = every;
        }
        if let Some(directory) = self.output_dir {
            config.snapshot.directory = directory;
        }
        if let Some(prefix) = self.prefix {
            config.snapshot.prefix = prefix;
        }
        config.snapshot.vtk |= self.vtk;
        config.show |= self.show;

        config.validate().context("invalid settings")?;
        Ok(config)
    }
}

fn make_sink(config: &SimulationConfig) -> Box<dyn SnapshotSink + Send> {
    let mut tee = Tee::new();
    if config.snapshot.vtk {
        tee.push(VtkWriter::new(
            config.snapshot.directory.clone(),
            config.snapshot.prefix.clone(),
        ));
    }
    if config.show {
        tee.push(TerminalSink::stdout());
    }
    if tee.is_empty() {
        Box::new(Discard)
    } else {
        Box::new(tee)
    }
}

fn run_threads(config: &SimulationConfig, seeding: &Seeding, workers: usize) -> anyhow::Result<()> {
    let summaries = run_threaded(config, seeding, workers, |_| make_sink(config))
        .context("threaded run failed")?;
    let world = assemble(&summaries);
    let slowest = summaries.iter().map(|s| s.elapsed).max().unwrap_or_default();
    info!(
        workers,
        size = %format_args!("{}x{}", world.width(), world.height()),
        generations = config.generations,
        live = world.live_count(),
        elapsed_ms = slowest.as_millis() as u64,
        "run complete"
    );
    Ok(())
}

#[cfg(feature = "mpi")]
fn run_mpi(config: &SimulationConfig, seeding: &Seeding) -> anyhow::Result<()> {
    use mesh_life::transport::mpi::MpiTransport;
    use mesh_life::transport::Transport;
    use mesh_life::Simulation;
    use tracing::error;

    let mut transport = MpiTransport::initialize().context("starting MPI")?;
    let rank = transport.rank();
    let mut sink = make_sink(config);
    let outcome =
        Simulation::new(config, seeding, &mut transport).and_then(|sim| sim.run(&mut sink));
    match outcome {
        Ok(_) => Ok(()),
        Err(err) => {
            // peers may be blocked on this rank's halo, so take the whole job down
            error!(rank, error = %err, "fatal, aborting every rank");
            transport.abort(1)
        }
    }
}

#[cfg(not(feature = "mpi"))]
fn run_mpi(_config: &SimulationConfig, _seeding: &Seeding) -> anyhow::Result<()> {
    bail!("built without MPI support; rebuild with `--features mpi`")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let backend = cli.backend;
    let workers = cli.workers;
    let config = cli.into_config()?;
    let seeding = Seeding::from_config(&config).context("preparing the initial cells")?;

    match backend {
        Backend::Threads => {
            if workers == 0 {
                bail!("at least one worker is required");
            }
            run_threads(&config, &seeding, workers)
        }
        Backend::Mpi => run_mpi(&config, &seeding),
    }
}
