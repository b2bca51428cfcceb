use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use mesh_life::config::{GridSpec, SimulationConfig};
use mesh_life::snapshot::{Discard, Frame, SnapshotError, SnapshotSink};
use mesh_life::{assemble, run_threaded, Grid, LifeError, Rule, Seeding};

/// Plain torus step over a whole grid, no partitioning.
fn torus_step(grid: &Grid) -> Grid {
    let (w, h) = (grid.width(), grid.height());
    let mut next = Grid::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut n = 0;
            for dy in [h - 1, 0, 1] {
                for dx in [w - 1, 0, 1] {
                    if (dx, dy) != (0, 0) && grid.get((x + dx) % w, (y + dy) % h) {
                        n += 1;
                    }
                }
            }
            next.set(x, y, Rule::CONWAY.next_state(grid.get(x, y), n));
        }
    }
    next
}

fn torus_run(grid: &Grid, generations: u64) -> Grid {
    (0..generations).fold(grid.clone(), |g, _| torus_step(&g))
}

fn shifted(grid: &Grid, dx: usize, dy: usize) -> Grid {
    let (w, h) = (grid.width(), grid.height());
    let mut out = Grid::new(w, h);
    for y in 0..h {
        for x in 0..w {
            out.set((x + dx) % w, (y + dy) % h, grid.get(x, y));
        }
    }
    out
}

fn random_field(width: usize, height: usize, seed: u64) -> Grid {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut grid = Grid::new(width, height);
    for y in 0..height {
        for x in 0..width {
            grid.set(x, y, rng.gen_bool(0.35));
        }
    }
    grid
}

fn config_for(field: &Grid, mesh: (usize, usize), generations: u64) -> SimulationConfig {
    SimulationConfig {
        generations,
        grid: GridSpec::Global {
            width: field.width(),
            height: field.height(),
        },
        mesh_x: mesh.0,
        mesh_y: mesh.1,
        ..SimulationConfig::default()
    }
}

fn run_mesh(field: &Grid, workers: usize, mesh: (usize, usize), generations: u64) -> Grid {
    let config = config_for(field, mesh, generations);
    let summaries =
        run_threaded(&config, &Seeding::Field(field.clone()), workers, |_| Discard).unwrap();
    assert_eq!(summaries.len(), workers);
    assemble(&summaries)
}

fn glider_field(width: usize, height: usize) -> Grid {
    let mut field = Grid::new(width, height);
    for (x, y) in [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)] {
        field.set(x, y, true);
    }
    field
}

#[test]
fn zero_generations_leave_the_field_untouched() {
    let field = random_field(8, 6, 1);
    assert_eq!(run_mesh(&field, 4, (2, 2), 0), field);
}

#[test]
fn block_is_still() {
    let block = Grid::from_rows(&["....", ".oo.", ".oo.", "...."]);
    for generations in [1, 2, 3, 7, 10, 25] {
        assert_eq!(run_mesh(&block, 1, (0, 0), generations), block, "after {generations}");
    }
    // split so the block straddles all four ranks
    let centered = Grid::from_rows(&["......", "......", "..oo..", "..oo..", "......", "......"]);
    for generations in [1, 4, 9] {
        assert_eq!(run_mesh(&centered, 4, (2, 2), generations), centered);
    }
}

#[test]
fn blinker_has_period_two() {
    let vertical = Grid::from_rows(&[".....", "..o..", "..o..", "..o..", "....."]);
    let horizontal = Grid::from_rows(&[".....", ".....", ".ooo.", ".....", "....."]);
    for k in 0..6 {
        assert_eq!(run_mesh(&vertical, 1, (0, 0), 2 * k), vertical, "after {}", 2 * k);
        assert_eq!(run_mesh(&vertical, 1, (0, 0), 2 * k + 1), horizontal, "after {}", 2 * k + 1);
    }
}

#[test]
fn glider_moves_one_cell_diagonally_every_four_generations() {
    let field = glider_field(6, 6);
    assert_eq!(run_mesh(&field, 1, (0, 0), 4), shifted(&field, 1, 1));
}

#[test]
fn glider_crosses_every_seam_and_corner() {
    // 8x8 torus over a 2x2 mesh: 32 generations carry the glider once around
    // both axes, through every rank and every diagonal neighbour
    let field = glider_field(8, 8);
    assert_eq!(run_mesh(&field, 4, (2, 2), 32), field);
    assert_eq!(run_mesh(&field, 4, (2, 2), 12), shifted(&field, 3, 3));
}

#[test]
fn split_along_x_matches_one_worker() {
    let field = random_field(8, 4, 2);
    let expected = run_mesh(&field, 1, (0, 0), 1);
    assert_eq!(run_mesh(&field, 2, (2, 1), 1), expected);
    assert_eq!(expected, torus_step(&field));
}

#[test]
fn strips_along_y_match_reference() {
    let field = random_field(6, 8, 3);
    assert_eq!(run_mesh(&field, 4, (1, 4), 6), torus_run(&field, 6));
}

#[test]
fn full_mesh_matches_reference() {
    let field = random_field(12, 8, 4);
    assert_eq!(run_mesh(&field, 6, (3, 2), 8), torus_run(&field, 8));
    assert_eq!(run_mesh(&field, 4, (2, 2), 8), torus_run(&field, 8));
}

#[test]
fn per_rank_grid_grows_with_the_mesh() {
    let config = SimulationConfig {
        generations: 3,
        grid: GridSpec::PerRank { width: 5, height: 3 },
        mesh_x: 2,
        mesh_y: 2,
        ..SimulationConfig::default()
    };
    let seeding = Seeding::Random { seed: 9, density: 0.4 };
    let summaries = run_threaded(&config, &seeding, 4, |_| Discard).unwrap();
    let world = assemble(&summaries);
    assert_eq!((world.width(), world.height()), (10, 6));

    let mut origins: Vec<_> = summaries.iter().map(|s| s.origin).collect();
    origins.sort();
    assert_eq!(origins, vec![(0, 0), (0, 3), (5, 0), (5, 3)]);

    // same seed, same world
    let again = assemble(&run_threaded(&config, &seeding, 4, |_| Discard).unwrap());
    assert_eq!(world, again);
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<(usize, u64, usize)>>>,
}

impl SnapshotSink for Recorder {
    fn emit(&mut self, frame: &Frame<'_>) -> Result<(), SnapshotError> {
        self.seen.lock().unwrap().push((
            frame.rank,
            frame.generation,
            frame.grid.live_interior_count(),
        ));
        Ok(())
    }
}

#[test]
fn snapshots_follow_the_cadence() {
    let field = glider_field(8, 4);
    let mut config = config_for(&field, (2, 1), 7);
    config.snapshot.every = 3;
    let recorder = Recorder::default();
    run_threaded(&config, &Seeding::Field(field), 2, |_| recorder.clone()).unwrap();

    let mut seen = recorder.seen.lock().unwrap().clone();
    seen.sort();
    let frames: Vec<_> = seen.iter().map(|&(rank, generation, _)| (rank, generation)).collect();
    assert_eq!(frames, vec![(0, 0), (0, 3), (0, 6), (1, 0), (1, 3), (1, 6)]);
    // generation 0 is the seeded state: all five cells sit in rank 0
    assert_eq!(seen[0].2, 5);
    assert_eq!(seen[3].2, 0);
}

#[test]
fn disabled_snapshots_never_emit() {
    let field = glider_field(4, 4);
    let mut config = config_for(&field, (0, 0), 5);
    config.snapshot.every = 0;
    let recorder = Recorder::default();
    run_threaded(&config, &Seeding::Field(field), 1, |_| recorder.clone()).unwrap();
    assert!(recorder.seen.lock().unwrap().is_empty());
}

struct FailAt(u64);

impl SnapshotSink for FailAt {
    fn emit(&mut self, frame: &Frame<'_>) -> Result<(), SnapshotError> {
        if frame.generation == self.0 {
            Err(SnapshotError::Io {
                path: "unwritable".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        } else {
            Ok(())
        }
    }
}

#[test]
fn one_failing_rank_stops_the_run_with_its_own_error() {
    let field = random_field(8, 8, 5);
    let config = config_for(&field, (2, 2), 10);
    let err = run_threaded(&config, &Seeding::Field(field), 4, |rank| {
        FailAt(if rank == 2 { 3 } else { u64::MAX })
    })
    .unwrap_err();
    assert!(matches!(err, LifeError::Snapshot(_)), "got {err}");
}

#[test]
fn oversized_pattern_is_rejected() {
    let field = Grid::new(9, 4);
    let config = SimulationConfig {
        grid: GridSpec::Global { width: 8, height: 4 },
        ..SimulationConfig::default()
    };
    let err = run_threaded(&config, &Seeding::Field(field), 2, |_| Discard).unwrap_err();
    assert!(!err.is_peer_loss());
}
