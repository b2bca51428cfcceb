use std::fs;
use std::path::Path;

use tempfile::TempDir;

use mesh_life::config::{GridSpec, SimulationConfig};
use mesh_life::snapshot::VtkWriter;
use mesh_life::{run_threaded, Grid, Seeding};

const MARKER: &[u8] = b"<AppendedData encoding=\"raw\">\n_";

struct Vti {
    header: String,
    values: Vec<f32>,
}

fn read_vti(path: &Path) -> Vti {
    let bytes = fs::read(path).unwrap();
    let start = bytes
        .windows(MARKER.len())
        .position(|w| w == MARKER)
        .expect("appended data marker")
        + MARKER.len();
    let count = u64::from_le_bytes(bytes[start..start + 8].try_into().unwrap()) as usize;
    let data = &bytes[start + 8..start + 8 + count];
    Vti {
        header: String::from_utf8(bytes[..start].to_vec()).unwrap(),
        values: data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect(),
    }
}

fn run_with_vtk(dir: &Path, field: Grid, mesh: (usize, usize), generations: u64) {
    let config = SimulationConfig {
        generations,
        grid: GridSpec::Global {
            width: field.width(),
            height: field.height(),
        },
        mesh_x: mesh.0,
        mesh_y: mesh.1,
        ..SimulationConfig::default()
    };
    let workers = mesh.0 * mesh.1;
    run_threaded(&config, &Seeding::Field(field), workers, |_| {
        VtkWriter::new(dir.to_path_buf(), "gol")
    })
    .unwrap();
}

#[test]
fn one_file_per_rank_and_generation() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("nested").join("vti");
    run_with_vtk(&dir, Grid::from_rows(&["o...", "...o"]), (2, 1), 2);

    let mut names: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "gol_0-00000.vti",
            "gol_0-00001.vti",
            "gol_1-00000.vti",
            "gol_1-00001.vti",
        ]
    );
}

#[test]
fn cells_are_written_bottom_up_as_floats() {
    let tmp = TempDir::new().unwrap();
    run_with_vtk(tmp.path(), Grid::from_rows(&["o...", "...o"]), (2, 1), 1);

    let left = read_vti(&tmp.path().join("gol_0-00000.vti"));
    assert!(left.header.contains(r#"<Piece Extent="0 2 0 2 0 0">"#));
    assert!(left.header.contains(r#"Name="gol""#));
    assert_eq!(left.values, vec![0.0, 0.0, 1.0, 0.0]);

    let right = read_vti(&tmp.path().join("gol_1-00000.vti"));
    assert!(right.header.contains(r#"<Piece Extent="2 4 0 2 0 0">"#));
    assert_eq!(right.values, vec![0.0, 1.0, 0.0, 0.0]);
}

#[test]
fn top_rank_sits_at_the_top_of_the_image() {
    let tmp = TempDir::new().unwrap();
    run_with_vtk(tmp.path(), Grid::new(2, 4), (1, 2), 1);

    let top = read_vti(&tmp.path().join("gol_0-00000.vti"));
    assert!(top.header.contains(r#"Extent="0 2 2 4 0 0""#));
    let bottom = read_vti(&tmp.path().join("gol_1-00000.vti"));
    assert!(bottom.header.contains(r#"Extent="0 2 0 2 0 0""#));
    assert_eq!(bottom.values.len(), 4);
}

#[test]
fn unwritable_directory_fails_the_run() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("file");
    fs::write(&blocker, b"not a directory").unwrap();

    let config = SimulationConfig {
        generations: 1,
        grid: GridSpec::PerRank { width: 2, height: 2 },
        ..SimulationConfig::default()
    };
    let err = run_threaded(&config, &Seeding::Field(Grid::new(2, 2)), 1, |_| {
        VtkWriter::new(blocker.join("vti"), "gol")
    })
    .unwrap_err();
    assert!(err.to_string().contains("cannot write snapshot"));
}
