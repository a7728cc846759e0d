/// Reads ESRI ".shp" Shapefile, as per
/// https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
use std::fs;
use std::io;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;
use super::cursor::{ByteCursor, CursorError};

const SHP_HEADER_LENGTH: usize = 100;
const SHP_RECORD_HEADER_LENGTH: usize = 8;
const SHP_MAGIC_NUMBER: u32 = 9994;
const SHP_VERSION: u32 = 1000;
/// Record bodies up to this size are read past during the offset scan, not seeked past.
const SHP_SKIP_BY_READING: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum ShpError {
    #[error("{0}")]
    IOError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("No shape record {index}: the file has {count}")]
    NoSuchRecord { index: usize, count: usize },
}

impl From<CursorError> for ShpError {
    fn from(err: CursorError) -> ShpError {
        ShpError::ParseError(err.to_string())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShpShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

/// The record layout a shape type uses, ignoring its Z/M dimensions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShapeKind {
    Null,
    Point,
    MultiPoint,
    PolyLine,
    Polygon,
    MultiPatch,
}

impl ShpShapeType {
    pub fn with_u32(u: u32) -> Option<ShpShapeType> {
        match u {
            0  => Some(ShpShapeType::Null),
            1  => Some(ShpShapeType::Point),
            3  => Some(ShpShapeType::PolyLine),
            5  => Some(ShpShapeType::Polygon),
            8  => Some(ShpShapeType::MultiPoint),
            11 => Some(ShpShapeType::PointZ),
            13 => Some(ShpShapeType::PolyLineZ),
            15 => Some(ShpShapeType::PolygonZ),
            18 => Some(ShpShapeType::MultiPointZ),
            21 => Some(ShpShapeType::PointM),
            23 => Some(ShpShapeType::PolyLineM),
            25 => Some(ShpShapeType::PolygonM),
            28 => Some(ShpShapeType::MultiPointM),
            31 => Some(ShpShapeType::MultiPatch),
            _ => None,
        }
    }

    pub fn kind(self) -> ShapeKind {
        match self {
            ShpShapeType::Null => ShapeKind::Null,
            ShpShapeType::Point | ShpShapeType::PointZ | ShpShapeType::PointM => ShapeKind::Point,
            ShpShapeType::MultiPoint | ShpShapeType::MultiPointZ | ShpShapeType::MultiPointM => ShapeKind::MultiPoint,
            ShpShapeType::PolyLine | ShpShapeType::PolyLineZ | ShpShapeType::PolyLineM => ShapeKind::PolyLine,
            ShpShapeType::Polygon | ShpShapeType::PolygonZ | ShpShapeType::PolygonM => ShapeKind::Polygon,
            ShpShapeType::MultiPatch => ShapeKind::MultiPatch,
        }
    }

    /// True for the types whose records store a Z coordinate per vertex.
    pub fn has_z(self) -> bool {
        match self {
            ShpShapeType::PointZ
            | ShpShapeType::PolyLineZ
            | ShpShapeType::PolygonZ
            | ShpShapeType::MultiPointZ
            | ShpShapeType::MultiPatch => true,
            _ => false,
        }
    }

    /// True for the types whose records _may_ store an M value per vertex.
    ///
    /// Z types carry optional measures too.
    pub fn has_m(self) -> bool {
        match self {
            ShpShapeType::PointM
            | ShpShapeType::PolyLineM
            | ShpShapeType::PolygonM
            | ShpShapeType::MultiPointM => true,
            _ => self.has_z(),
        }
    }
}

/// Role of one part of a MultiPatch (or, by convention, Polygon) record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PartType {
    TriangleStrip,
    TriangleFan,
    OuterRing,
    InnerRing,
    FirstRing,
    Ring,
}

impl PartType {
    pub fn with_i32(i: i32) -> Option<PartType> {
        match i {
            0 => Some(PartType::TriangleStrip),
            1 => Some(PartType::TriangleFan),
            2 => Some(PartType::OuterRing),
            3 => Some(PartType::InnerRing),
            4 => Some(PartType::FirstRing),
            5 => Some(PartType::Ring),
            _ => None,
        }
    }
}

/// Marks an M value the file does not store.
pub const NO_MEASURE: f64 = f64::NAN;

/// One vertex. `z` is 0 for types without Z; `m` is 0 for types without M and
/// `NO_MEASURE` when an M-capable record omits its measures.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub m: f64,
}

impl Vertex {
    pub fn has_m(&self) -> bool {
        !self.m.is_nan()
    }
}

/// X/Y/Z/M extents: (xmin, ymin, xmax, ymax, zmin, zmax, mmin, mmax).
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct ShpBoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub m_min: f64,
    pub m_max: f64,
}

#[derive(Debug, Copy, Clone)]
pub struct ShpHeader {
    pub file_n_bytes: usize,
    pub shape_type: ShpShapeType,
    pub bounding_box: ShpBoundingBox,
}

/// A decoded record, before its vertices are grouped into parts.
///
/// `part_starts` and `part_types` are as long as the record's part count.
/// Only MultiPatch records store part types; every other record gets
/// `PartType::Ring` (5) for each part.
#[derive(Debug, Clone, PartialEq)]
pub struct RawShape {
    pub shape_type: ShpShapeType,
    pub record_number: u32,
    pub bounding_box: ShpBoundingBox,
    pub part_starts: Box<[i32]>,
    pub part_types: Box<[i32]>,
    pub vertices: Box<[Vertex]>,
}

/// Reads the first 100 bytes of the file.
///
/// Side-effect: advances the file cursor 100 bytes.
fn read_shp_header<R: Read>(file: &mut R) -> Result<ShpHeader, ShpError> {
    let mut buf = [0u8; SHP_HEADER_LENGTH];
    file.read_exact(&mut buf)?;

    let mut c = ByteCursor::new(&buf);
    let magic_number = c.read_u32_be()?;
    c.skip(20)?;
    let file_len = c.read_u32_be()?;
    let version = c.read_u32_le()?;
    let shape_type_u32 = c.read_u32_le()?;
    let b = c.read_f64s_le(8)?;

    if magic_number != SHP_MAGIC_NUMBER {
        return Err(ShpError::ParseError(format!("File has wrong magic number: found {}, expected {}", magic_number, SHP_MAGIC_NUMBER)));
    }

    if version != SHP_VERSION {
        return Err(ShpError::ParseError(format!("File has wrong version: found {}, expected {}", version, SHP_VERSION)));
    }

    match ShpShapeType::with_u32(shape_type_u32) {
        None => Err(ShpError::ParseError(format!("File has nonexistent shape type {}", shape_type_u32))),
        Some(shape_type) => Ok(ShpHeader {
            file_n_bytes: file_len as usize * 2,
            shape_type: shape_type,
            bounding_box: ShpBoundingBox {
                x_min: b[0],
                y_min: b[1],
                x_max: b[2],
                y_max: b[3],
                z_min: b[4],
                z_max: b[5],
                m_min: b[6],
                m_max: b[7],
            },
        }),
    }
}

/// Reads the optional trailing M section: a range, then one value per vertex.
///
/// Writers may leave it out entirely; the record is then simply shorter.
fn read_measures(c: &mut ByteCursor, n: usize) -> Result<Option<(f64, f64, Vec<f64>)>, CursorError> {
    if c.remaining() < 16 + 8 * n {
        return Ok(None);
    }
    let m_min = c.read_f64_le()?;
    let m_max = c.read_f64_le()?;
    let ms = c.read_f64s_le(n)?;
    Ok(Some((m_min, m_max, ms)))
}

fn parse_point(c: &mut ByteCursor, shape_type: ShpShapeType, record_number: u32) -> Result<RawShape, ShpError> {
    let x = c.read_f64_le()?;
    let y = c.read_f64_le()?;
    let z = if shape_type.has_z() { c.read_f64_le()? } else { 0. };
    let m = if !shape_type.has_m() {
        0.
    } else if c.remaining() >= 8 {
        c.read_f64_le()?
    } else {
        NO_MEASURE
    };

    Ok(RawShape {
        shape_type: shape_type,
        record_number: record_number,
        bounding_box: ShpBoundingBox {
            x_min: x,
            y_min: y,
            x_max: x,
            y_max: y,
            z_min: z,
            z_max: z,
            m_min: m,
            m_max: m,
        },
        part_starts: Box::new([]),
        part_types: Box::new([]),
        vertices: vec![Vertex { x: x, y: y, z: z, m: m }].into_boxed_slice(),
    })
}

fn read_count(c: &mut ByteCursor, what: &str, record_number: u32) -> Result<usize, ShpError> {
    let n = c.read_i32_le()?;
    if n < 0 {
        return Err(ShpError::ParseError(format!("Record number {} has a negative {} count: {}", record_number, what, n)));
    }
    Ok(n as usize)
}

/// Parses MultiPoint, PolyLine, Polygon and MultiPatch records, in any
/// dimension.
fn parse_multi(c: &mut ByteCursor, shape_type: ShpShapeType, record_number: u32) -> Result<RawShape, ShpError> {
    let kind = shape_type.kind();
    let b = c.read_f64s_le(4)?;

    let num_parts = if kind == ShapeKind::MultiPoint { 0 } else { read_count(c, "part", record_number)? };
    let num_points = read_count(c, "point", record_number)?;

    let part_starts = c.read_i32s_le(num_parts)?;
    let part_types = if kind == ShapeKind::MultiPatch {
        c.read_i32s_le(num_parts)?
    } else {
        vec![5; num_parts]
    };

    c.require(num_points.saturating_mul(16))?;
    let xys = c.read_f64s_le(num_points * 2)?;
    let mut vertices: Vec<Vertex> = xys.chunks(2)
        .map(|xy| Vertex { x: xy[0], y: xy[1], z: 0., m: 0. })
        .collect();

    let mut bounding_box = ShpBoundingBox {
        x_min: b[0],
        y_min: b[1],
        x_max: b[2],
        y_max: b[3],
        ..ShpBoundingBox::default()
    };

    if shape_type.has_z() {
        bounding_box.z_min = c.read_f64_le()?;
        bounding_box.z_max = c.read_f64_le()?;
        for (v, z) in vertices.iter_mut().zip(c.read_f64s_le(num_points)?) {
            v.z = z;
        }
    }

    if shape_type.has_m() {
        match read_measures(c, num_points)? {
            Some((m_min, m_max, ms)) => {
                bounding_box.m_min = m_min;
                bounding_box.m_max = m_max;
                for (v, m) in vertices.iter_mut().zip(ms) {
                    v.m = m;
                }
            }
            None => {
                bounding_box.m_min = NO_MEASURE;
                bounding_box.m_max = NO_MEASURE;
                for v in vertices.iter_mut() {
                    v.m = NO_MEASURE;
                }
            }
        }
    }

    Ok(RawShape {
        shape_type: shape_type,
        record_number: record_number,
        bounding_box: bounding_box,
        part_starts: part_starts.into_boxed_slice(),
        part_types: part_types.into_boxed_slice(),
        vertices: vertices.into_boxed_slice(),
    })
}

/// Decodes one record's content (everything after its 8-byte header).
///
/// Each record names its own shape type. That is usually the file's type, but
/// any record may be a Null shape.
pub fn parse_shape(buf: &[u8], record_number: u32) -> Result<RawShape, ShpError> {
    let mut c = ByteCursor::new(buf);
    let shape_type_u32 = c.read_u32_le()?;
    let shape_type = match ShpShapeType::with_u32(shape_type_u32) {
        Some(t) => t,
        None => return Err(ShpError::ParseError(format!("Record number {} has nonexistent shape type {}", record_number, shape_type_u32))),
    };

    match shape_type.kind() {
        ShapeKind::Null => Ok(RawShape {
            shape_type: shape_type,
            record_number: record_number,
            bounding_box: ShpBoundingBox::default(),
            part_starts: Box::new([]),
            part_types: Box::new([]),
            vertices: Box::new([]),
        }),
        ShapeKind::Point => parse_point(&mut c, shape_type, record_number),
        _ => parse_multi(&mut c, shape_type, record_number),
    }
}

/// Reads an ESRI ".shp" Shapefile, following instructions at
/// https://www.esri.com/library/whitepapers/pdfs/shapefile.pdf
///
/// Construction scans every record header once and remembers where each
/// record starts, so `read_shape()` can seek straight to any record. No
/// ".shx" index is needed.
#[derive(Debug)]
pub struct ShpReader<R: Read + Seek> {
    file: R,
    n_bytes: u64,
    offsets: Box<[u64]>,
    pub header: ShpHeader,
}

/// Advances `file` by `n` bytes. Short skips read through the bytes so a
/// buffered reader keeps its buffer.
fn skip_bytes<R: Read + Seek>(file: &mut R, n: u64) -> Result<(), ShpError> {
    if n <= SHP_SKIP_BY_READING {
        let skipped = io::copy(&mut file.by_ref().take(n), &mut io::sink())?;
        if skipped < n {
            return Err(ShpError::IOError(io::Error::new(io::ErrorKind::UnexpectedEof, "shape record runs past end of file")));
        }
    } else {
        file.seek(SeekFrom::Current(n as i64))?;
    }
    Ok(())
}

/// Walks the record headers from byte 100 to `end`, returning the offset of
/// each record header.
fn scan_record_offsets<R: Read + Seek>(file: &mut R, end: u64) -> Result<Vec<u64>, ShpError> {
    let mut offsets = Vec::new();
    let mut pos = SHP_HEADER_LENGTH as u64;
    let mut header_buf = [0u8; SHP_RECORD_HEADER_LENGTH];

    file.seek(SeekFrom::Start(pos))?;
    while pos + SHP_RECORD_HEADER_LENGTH as u64 <= end {
        file.read_exact(&mut header_buf)?;
        let mut c = ByteCursor::new(&header_buf);
        let record_number = c.read_u32_be()?;
        let content_length = c.read_u32_be()? as u64 * 2;

        if record_number as usize != offsets.len() + 1 {
            tracing::debug!(
                offset = pos,
                record_number = record_number,
                expected = offsets.len() + 1,
                "Shape record number out of sequence"
            );
        }

        offsets.push(pos);
        pos += SHP_RECORD_HEADER_LENGTH as u64 + content_length;
        if content_length > 0 && pos < end {
            skip_bytes(file, content_length)?;
        }
    }

    Ok(offsets)
}

impl<R: Read + Seek> ShpReader<R> {
    pub fn new(mut file: R) -> Result<ShpReader<R>, ShpError> {
        file.seek(SeekFrom::Start(0))?;
        let header = read_shp_header(&mut file)?;
        let n_bytes = file.seek(SeekFrom::End(0))?;

        let declared = header.file_n_bytes as u64;
        let end = if declared >= SHP_HEADER_LENGTH as u64 && declared <= n_bytes {
            declared
        } else {
            n_bytes
        };
        if declared != n_bytes {
            tracing::debug!(declared = declared, actual = n_bytes, "Shapefile header disagrees with file length");
        }

        let offsets = scan_record_offsets(&mut file, end)?;

        Ok(ShpReader {
            file: file,
            n_bytes: n_bytes,
            offsets: offsets.into_boxed_slice(),
            header: header,
        })
    }

    pub fn n_records(&self) -> usize {
        self.offsets.len()
    }

    /// Seeks to record `index` (0-based) and decodes it.
    ///
    /// A damaged record yields `Err` but leaves the reader usable for other
    /// records.
    pub fn read_shape(&mut self, index: usize) -> Result<RawShape, ShpError> {
        let offset = match self.offsets.get(index) {
            Some(&offset) => offset,
            None => return Err(ShpError::NoSuchRecord { index: index, count: self.offsets.len() }),
        };

        let mut header_buf = [0u8; SHP_RECORD_HEADER_LENGTH];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut header_buf)?;
        let mut c = ByteCursor::new(&header_buf);
        let record_number = c.read_u32_be()?;
        let content_length = c.read_u32_be()? as u64 * 2;

        let available = self.n_bytes - offset - SHP_RECORD_HEADER_LENGTH as u64;
        if content_length > available {
            return Err(ShpError::ParseError(format!("Record number {} says it has {} bytes, but only {} remain in the file", record_number, content_length, available)));
        }

        let mut buf = vec![0u8; content_length as usize];
        self.file.read_exact(&mut buf)?;
        parse_shape(&buf, record_number)
    }

    pub fn into_inner(self) -> R {
        self.file
    }
}

/// Opens an ESRI ".shp" Shapefile from the filesystem.
pub fn open(path: &Path) -> Result<ShpReader<io::BufReader<fs::File>>, ShpError> {
    let f = fs::File::open(path)?;
    ShpReader::new(io::BufReader::new(f))
}
