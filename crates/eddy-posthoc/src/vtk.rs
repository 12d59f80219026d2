//! Block file writer: one leaf dataset per VTK XML file.
//!
//! Files use appended raw data with `UInt64` block headers and no
//! compression. Array payloads are streamed straight from the dataset
//! after the XML header, so a block is never encoded into a second
//! in-memory copy.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use eddy_core::{ArrayValues, Association, Attributes, Dataset, Geometry};
use thiserror::Error;

/// Errors from writing a block file.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The file could not be created or written.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// The offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing to an in-memory or caller-owned sink failed.
    #[error("failed to encode block: {0}")]
    Stream(#[source] io::Error),
    /// The dataset's geometry is internally inconsistent.
    #[error("invalid {kind} geometry: {reason}")]
    Geometry {
        /// Class name of the dataset.
        kind: &'static str,
        /// What is inconsistent.
        reason: String,
    },
}

/// Capability to persist one leaf dataset to one file.
pub trait BlockWriter {
    /// Write `dataset` to `path`, replacing any existing file.
    fn write_block(&self, path: &Path, dataset: &Dataset) -> Result<(), WriteError>;
}

/// VTK XML writer (`.vti`, `.vtr`, `.vts`, `.vtu`, `.vtp`).
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlBlockWriter;

impl XmlBlockWriter {
    /// Encode `dataset` into `out`.
    pub fn encode<W: Write>(dataset: &Dataset, out: &mut W) -> Result<(), WriteError> {
        encode(dataset, out).map_err(|e| match e {
            EncodeError::Io(source) => WriteError::Stream(source),
            EncodeError::Geometry(reason) => WriteError::Geometry {
                kind: dataset.kind().class_name(),
                reason,
            },
        })
    }
}

impl BlockWriter for XmlBlockWriter {
    fn write_block(&self, path: &Path, dataset: &Dataset) -> Result<(), WriteError> {
        let io_err = |source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        encode(dataset, &mut out).map_err(|e| match e {
            EncodeError::Io(source) => io_err(source),
            EncodeError::Geometry(reason) => WriteError::Geometry {
                kind: dataset.kind().class_name(),
                reason,
            },
        })?;
        out.flush().map_err(io_err)
    }
}

enum EncodeError {
    Io(io::Error),
    Geometry(String),
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// A borrowed array payload.
#[derive(Clone, Copy)]
enum Raw<'a> {
    F32(&'a [f32]),
    F64(&'a [f64]),
    I32(&'a [i32]),
    I64(&'a [i64]),
    U8(&'a [u8]),
}

impl<'a> From<&'a ArrayValues> for Raw<'a> {
    fn from(v: &'a ArrayValues) -> Self {
        match v {
            ArrayValues::F32(v) => Self::F32(v),
            ArrayValues::F64(v) => Self::F64(v),
            ArrayValues::I32(v) => Self::I32(v),
            ArrayValues::I64(v) => Self::I64(v),
            ArrayValues::U8(v) => Self::U8(v),
        }
    }
}

impl Raw<'_> {
    fn type_name(self) -> &'static str {
        match self {
            Self::F32(_) => "Float32",
            Self::F64(_) => "Float64",
            Self::I32(_) => "Int32",
            Self::I64(_) => "Int64",
            Self::U8(_) => "UInt8",
        }
    }

    fn byte_len(self) -> u64 {
        let bytes = match self {
            Self::F32(v) => v.len() * 4,
            Self::F64(v) => v.len() * 8,
            Self::I32(v) => v.len() * 4,
            Self::I64(v) => v.len() * 8,
            Self::U8(v) => v.len(),
        };
        bytes as u64
    }

    fn write_to<W: Write>(self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.byte_len().to_le_bytes())?;
        match self {
            Self::F32(v) => v.iter().try_for_each(|x| out.write_all(&x.to_le_bytes())),
            Self::F64(v) => v.iter().try_for_each(|x| out.write_all(&x.to_le_bytes())),
            Self::I32(v) => v.iter().try_for_each(|x| out.write_all(&x.to_le_bytes())),
            Self::I64(v) => v.iter().try_for_each(|x| out.write_all(&x.to_le_bytes())),
            Self::U8(v) => out.write_all(v),
        }
    }
}

/// XML header under construction plus the payloads it references, in
/// appended-section order.
struct Layout<'a> {
    xml: String,
    depth: usize,
    payloads: Vec<Raw<'a>>,
    offset: u64,
}

impl<'a> Layout<'a> {
    fn new() -> Self {
        Self {
            xml: String::new(),
            depth: 0,
            payloads: Vec::new(),
            offset: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.xml.push_str("  ");
        }
        self.xml.push_str(text);
        self.xml.push('\n');
    }

    fn open(&mut self, text: &str) {
        self.line(text);
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(&format!("</{tag}>"));
    }

    fn array(&mut self, name: &str, components: u32, raw: Raw<'a>, tuples: Option<usize>) {
        let mut tag = format!(
            "<DataArray type=\"{}\" Name=\"{}\" NumberOfComponents=\"{components}\"",
            raw.type_name(),
            escape(name)
        );
        if let Some(n) = tuples {
            let _ = write!(tag, " NumberOfTuples=\"{n}\"");
        }
        let _ = write!(tag, " format=\"appended\" offset=\"{}\"/>", self.offset);
        self.line(&tag);
        self.offset += 8 + raw.byte_len();
        self.payloads.push(raw);
    }

    fn attributes(&mut self, tag: &str, attrs: &'a Attributes, with_tuples: bool) {
        if attrs.is_empty() {
            return;
        }
        self.open(&format!("<{tag}>"));
        for a in attrs {
            let tuples = with_tuples.then(|| a.tuples());
            self.array(a.name(), a.components(), a.values().into(), tuples);
        }
        self.close(tag);
    }

    fn piece_data(&mut self, ds: &'a Dataset) {
        self.attributes("PointData", ds.attributes(Association::Point), false);
        self.attributes("CellData", ds.attributes(Association::Cell), false);
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn triple(v: &[f64; 3]) -> String {
    format!("{} {} {}", v[0], v[1], v[2])
}

fn check_points(points: &[f64]) -> Result<(), EncodeError> {
    if points.len() % 3 != 0 {
        return Err(EncodeError::Geometry(format!(
            "{} point coordinates is not a multiple of 3",
            points.len()
        )));
    }
    Ok(())
}

fn check_cells(connectivity: &[i64], offsets: &[i64]) -> Result<(), EncodeError> {
    let end = offsets.last().copied().unwrap_or(0);
    if end < 0 || end as usize != connectivity.len() {
        return Err(EncodeError::Geometry(format!(
            "last offset {end} does not match connectivity length {}",
            connectivity.len()
        )));
    }
    Ok(())
}

fn layout(ds: &Dataset) -> Result<Layout<'_>, EncodeError> {
    let class = ds.kind().class_name();
    let mut l = Layout::new();
    l.line("<?xml version=\"1.0\"?>");
    l.open(&format!(
        "<VTKFile type=\"{class}\" version=\"1.0\" \
             byte_order=\"LittleEndian\" header_type=\"UInt64\">"
    ));

    let field = ds.attributes(Association::Field);
    match ds.geometry() {
        Geometry::Image {
            extent,
            origin,
            spacing,
        } => {
            l.open(&format!(
                "<ImageData WholeExtent=\"{extent}\" Origin=\"{}\" Spacing=\"{}\">",
                triple(origin),
                triple(spacing)
            ));
            l.attributes("FieldData", field, true);
            l.open(&format!("<Piece Extent=\"{extent}\">"));
            l.piece_data(ds);
        }
        Geometry::Rectilinear { extent, x, y, z } => {
            let dims = extent.point_dims();
            for (axis, (coords, n)) in [x, y, z].into_iter().zip(dims).enumerate() {
                if coords.len() != n {
                    return Err(EncodeError::Geometry(format!(
                        "axis {axis} has {} coordinates for {n} points",
                        coords.len()
                    )));
                }
            }
            l.open(&format!("<RectilinearGrid WholeExtent=\"{extent}\">"));
            l.attributes("FieldData", field, true);
            l.open(&format!("<Piece Extent=\"{extent}\">"));
            l.piece_data(ds);
            l.open("<Coordinates>");
            l.array("x", 1, Raw::F64(x), None);
            l.array("y", 1, Raw::F64(y), None);
            l.array("z", 1, Raw::F64(z), None);
            l.close("Coordinates");
        }
        Geometry::Structured { extent, points } => {
            check_points(points)?;
            if points.len() / 3 != extent.point_count() {
                return Err(EncodeError::Geometry(format!(
                    "{} points for extent {extent}",
                    points.len() / 3
                )));
            }
            l.open(&format!("<StructuredGrid WholeExtent=\"{extent}\">"));
            l.attributes("FieldData", field, true);
            l.open(&format!("<Piece Extent=\"{extent}\">"));
            l.piece_data(ds);
            points_element(&mut l, points);
        }
        Geometry::Unstructured {
            points,
            connectivity,
            offsets,
            cell_types,
        } => {
            check_points(points)?;
            check_cells(connectivity, offsets)?;
            if cell_types.len() != offsets.len() {
                return Err(EncodeError::Geometry(format!(
                    "{} cell types for {} cells",
                    cell_types.len(),
                    offsets.len()
                )));
            }
            l.open("<UnstructuredGrid>");
            l.attributes("FieldData", field, true);
            l.open(&format!(
                "<Piece NumberOfPoints=\"{}\" NumberOfCells=\"{}\">",
                points.len() / 3,
                offsets.len()
            ));
            l.piece_data(ds);
            points_element(&mut l, points);
            l.open("<Cells>");
            l.array("connectivity", 1, Raw::I64(connectivity), None);
            l.array("offsets", 1, Raw::I64(offsets), None);
            l.array("types", 1, Raw::U8(cell_types), None);
            l.close("Cells");
        }
        Geometry::Poly {
            points,
            connectivity,
            offsets,
        } => {
            check_points(points)?;
            check_cells(connectivity, offsets)?;
            l.open("<PolyData>");
            l.attributes("FieldData", field, true);
            l.open(&format!(
                "<Piece NumberOfPoints=\"{}\" NumberOfVerts=\"0\" NumberOfLines=\"0\" \
                     NumberOfStrips=\"0\" NumberOfPolys=\"{}\">",
                points.len() / 3,
                offsets.len()
            ));
            l.piece_data(ds);
            points_element(&mut l, points);
            l.open("<Polys>");
            l.array("connectivity", 1, Raw::I64(connectivity), None);
            l.array("offsets", 1, Raw::I64(offsets), None);
            l.close("Polys");
        }
    }
    l.close("Piece");
    l.close(class);
    Ok(l)
}

fn points_element<'a>(l: &mut Layout<'a>, points: &'a [f64]) {
    l.open("<Points>");
    l.array("Points", 3, Raw::F64(points), None);
    l.close("Points");
}

fn encode<W: Write>(ds: &Dataset, out: &mut W) -> Result<(), EncodeError> {
    let layout = layout(ds)?;
    out.write_all(layout.xml.as_bytes())?;
    out.write_all(b"  <AppendedData encoding=\"raw\">\n   _")?;
    for raw in &layout.payloads {
        raw.write_to(out)?;
    }
    out.write_all(b"\n  </AppendedData>\n</VTKFile>\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_core::{DataArray, Extent};

    fn encoded(ds: &Dataset) -> Vec<u8> {
        let mut buf = Vec::new();
        XmlBlockWriter::encode(ds, &mut buf).unwrap();
        buf
    }

    fn payload_start(buf: &[u8]) -> usize {
        let marker = b"encoding=\"raw\">\n   _";
        buf.windows(marker.len()).position(|w| w == marker).unwrap() + marker.len()
    }

    fn header(buf: &[u8]) -> &str {
        std::str::from_utf8(&buf[..payload_start(buf)]).unwrap()
    }

    #[test]
    fn image_block_header_and_offsets() {
        let ds = Dataset::image([0, 2, 0, 0, 0, 0], [0.0; 3], [1.0; 3])
            .with_array(Association::Point, DataArray::from_f64("t", vec![1.0, 2.0, 3.0]))
            .with_array(Association::Cell, DataArray::ghost_flags(vec![0, 1]));
        let buf = encoded(&ds);
        let h = header(&buf);
        assert!(h.contains("<VTKFile type=\"ImageData\""), "{h}");
        assert!(h.contains("header_type=\"UInt64\""), "{h}");
        assert!(h.contains("WholeExtent=\"0 2 0 0 0 0\""), "{h}");
        let t = "Name=\"t\" NumberOfComponents=\"1\" format=\"appended\" offset=\"0\"";
        assert!(h.contains(t), "{h}");
        // 8-byte header + 3 f64 values precede the ghost array.
        let ghosts =
            "Name=\"vtkGhostType\" NumberOfComponents=\"1\" format=\"appended\" offset=\"32\"";
        assert!(h.contains(ghosts), "{h}");
        assert!(h.contains("<AppendedData encoding=\"raw\">"), "{h}");

        let start = payload_start(&buf);
        let payload_len = u64::from_le_bytes(buf[start..start + 8].try_into().unwrap());
        assert_eq!(payload_len, 24);
        let first = f64::from_le_bytes(buf[start + 8..start + 16].try_into().unwrap());
        assert_eq!(first, 1.0);
        assert!(buf.ends_with(b"</VTKFile>\n"));
    }

    #[test]
    fn field_data_carries_tuple_counts() {
        let ds = Dataset::image([0, 1, 0, 0, 0, 0], [0.0; 3], [1.0; 3])
            .with_array(Association::Field, DataArray::from_f64("dt", vec![0.1]));
        let buf = encoded(&ds);
        let h = header(&buf);
        let field = h.find("<FieldData>").unwrap();
        let piece = h.find("<Piece").unwrap();
        assert!(field < piece);
        assert!(h.contains("NumberOfTuples=\"1\""), "{h}");
    }

    #[test]
    fn poly_block_writes_points_and_polys() {
        let ds = Dataset::new(Geometry::Poly {
            points: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            connectivity: vec![0, 1, 2],
            offsets: vec![3],
        });
        let h = String::from_utf8_lossy(&encoded(&ds)).into_owned();
        assert!(h.contains("NumberOfPoints=\"3\""));
        assert!(h.contains("NumberOfPolys=\"1\""));
        assert!(h.contains("<Polys>"));
        assert!(h.contains("Name=\"Points\" NumberOfComponents=\"3\""));
    }

    #[test]
    fn unstructured_requires_consistent_cells() {
        let ds = Dataset::new(Geometry::Unstructured {
            points: vec![0.0; 12],
            connectivity: vec![0, 1, 2],
            offsets: vec![4],
            cell_types: vec![10],
        });
        let mut buf = Vec::new();
        let err = XmlBlockWriter::encode(&ds, &mut buf).unwrap_err();
        assert!(matches!(err, WriteError::Geometry { kind: "UnstructuredGrid", .. }), "{err}");
    }

    #[test]
    fn rectilinear_checks_axis_lengths() {
        let ds = Dataset::new(Geometry::Rectilinear {
            extent: Extent([0, 2, 0, 0, 0, 0]),
            x: vec![0.0, 1.0],
            y: vec![0.0],
            z: vec![0.0],
        });
        let mut buf = Vec::new();
        assert!(XmlBlockWriter::encode(&ds, &mut buf).is_err());
    }

    #[test]
    fn names_are_escaped() {
        let ds = Dataset::image([0, 1, 0, 0, 0, 0], [0.0; 3], [1.0; 3])
            .with_array(Association::Point, DataArray::from_f64("a<b>&\"c\"", vec![0.0, 1.0]));
        let h = String::from_utf8_lossy(&encoded(&ds)).into_owned();
        assert!(h.contains("Name=\"a&lt;b&gt;&amp;&quot;c&quot;\""), "{h}");
    }

    #[test]
    fn write_block_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x.vti");
        let ds = Dataset::image([0, 1, 0, 0, 0, 0], [0.0; 3], [1.0; 3]);
        match XmlBlockWriter.write_block(&path, &ds) {
            Err(WriteError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
