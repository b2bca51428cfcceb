//! Per-rank, per-generation output.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::display;
use crate::grid::LocalGrid;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot write snapshot {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One rank's interior at one generation, with its place in the global grid.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub rank: usize,
    pub generation: u64,
    /// Global coordinates of the interior's top-left cell.
    pub origin: (usize, usize),
    pub global_size: (usize, usize),
    pub grid: &'a LocalGrid,
}

pub trait SnapshotSink {
    fn emit(&mut self, frame: &Frame<'_>) -> Result<(), SnapshotError>;
}

impl<S: SnapshotSink + ?Sized> SnapshotSink for Box<S> {
    fn emit(&mut self, frame: &Frame<'_>) -> Result<(), SnapshotError> {
        (**self).emit(frame)
    }
}

/// Drops every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl SnapshotSink for Discard {
    fn emit(&mut self, _frame: &Frame<'_>) -> Result<(), SnapshotError> {
        Ok(())
    }
}

/// Writes VTK `ImageData` files, one per rank and generation, named
/// `<directory>/<prefix>_<rank>-<generation:05>.vti`.
///
/// Cells are a single `Float32` cell-data channel in raw appended form,
/// preceded by a `UInt64` byte count. Each file's extent sits at the rank's
/// origin, with the y axis flipped so grid row 0 is the top of the image.
#[derive(Debug, Clone)]
pub struct VtkWriter {
    directory: PathBuf,
    prefix: String,
}

impl VtkWriter {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, rank: usize, generation: u64) -> PathBuf {
        self.directory
            .join(format!("{}_{}-{:05}.vti", self.prefix, rank, generation))
    }

    fn write(&self, path: &Path, frame: &Frame<'_>) -> io::Result<()> {
        let grid = frame.grid;
        let (w, h) = (grid.width(), grid.height());
        let x0 = frame.origin.0;
        let y0 = frame.global_size.1 - frame.origin.1 - h;
        let extent = format!("{} {} {} {} 0 0", x0, x0 + w, y0, y0 + h);
        let name = &self.prefix;

        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, r#"<?xml version="1.0"?>"#)?;
        writeln!(
            out,
            r#"<VTKFile type="ImageData" version="0.1" byte_order="LittleEndian" header_type="UInt64">"#
        )?;
        writeln!(out, r#"<ImageData WholeExtent="{extent}" Origin="0 0 0" Spacing="1 1 1">"#)?;
        writeln!(out, r#"<Piece Extent="{extent}">"#)?;
        writeln!(out, r#"<CellData Scalars="{name}">"#)?;
        writeln!(
            out,
            r#"<DataArray type="Float32" Name="{name}" format="appended" offset="0"/>"#
        )?;
        writeln!(out, "</CellData>")?;
        writeln!(out, "</Piece>")?;
        writeln!(out, "</ImageData>")?;
        writeln!(out, r#"<AppendedData encoding="raw">"#)?;
        out.write_all(b"_")?;

        let bytes = (w * h * std::mem::size_of::<f32>()) as u64;
        out.write_all(&bytes.to_le_bytes())?;
        // VTK rows run bottom-up
        for y in (0..h).rev() {
            for x in 0..w {
                let value: f32 = if grid.interior(x, y) { 1.0 } else { 0.0 };
                out.write_all(&value.to_le_bytes())?;
            }
        }

        writeln!(out)?;
        writeln!(out, "</AppendedData>")?;
        writeln!(out, "</VTKFile>")?;
        out.flush()
    }
}

impl SnapshotSink for VtkWriter {
    fn emit(&mut self, frame: &Frame<'_>) -> Result<(), SnapshotError> {
        let path = self.path_for(frame.rank, frame.generation);
        let io_error = |source: io::Error| SnapshotError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.directory).map_err(io_error)?;
        self.write(&path, frame).map_err(io_error)?;
        debug!(rank = frame.rank, generation = frame.generation, path = %path.display(), "snapshot written");
        Ok(())
    }
}

/// Prints each frame's interior to a terminal.
#[derive(Debug)]
pub struct TerminalSink<W> {
    out: W,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SnapshotSink for TerminalSink<W> {
    fn emit(&mut self, frame: &Frame<'_>) -> Result<(), SnapshotError> {
        let text = display::render(&frame.grid.interior_grid());
        let io_error = |source: io::Error| SnapshotError::Io {
            path: PathBuf::from("<terminal>"),
            source,
        };
        writeln!(self.out, "{text}rank {} generation {}", frame.rank, frame.generation)
            .map_err(io_error)?;
        self.out.flush().map_err(io_error)
    }
}

/// Fans a frame out to several sinks in order.
#[derive(Default)]
pub struct Tee {
    sinks: Vec<Box<dyn SnapshotSink + Send>>,
}

impl Tee {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: impl SnapshotSink + Send + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl SnapshotSink for Tee {
    fn emit(&mut self, frame: &Frame<'_>) -> Result<(), SnapshotError> {
        self.sinks.iter_mut().try_for_each(|sink| sink.emit(frame))
    }
}
