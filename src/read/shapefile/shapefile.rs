use std::fs;
use std::io;
use std::io::{Read, Seek};
use std::path::Path;
use thiserror::Error;
use crate::geo;
use super::dbf;
use super::geo::{bounding_box, reconstruct};
use super::options::ReadOptions;
use super::shp;

/// A shapefile feature: geometry plus its ".dbf" row.
pub type Feature = geo::Feature<dbf::DbfRecord>;

/// Why one record could not be assembled.
#[derive(Debug, Error)]
pub enum RecordFormatError {
    #[error("{0}")]
    ShpError(#[from] shp::ShpError),
    #[error("{0}")]
    DbfError(#[from] dbf::DbfError),
}

#[derive(Debug, Error)]
pub enum ShapefileError {
    /// The ".shp" file could not be opened.
    #[error("{0}")]
    ShpError(#[from] shp::ShpError),
    /// The ".dbf" file could not be opened.
    #[error("{0}")]
    DbfError(#[from] dbf::DbfError),
    /// The two files do not describe the same records.
    #[error("Join error: {0}")]
    JoinError(String),
    /// One record is damaged. Other records may still be read.
    #[error("Record {index}: {source}")]
    RecordError {
        index: usize,
        #[source]
        source: RecordFormatError,
    },
    #[error("No record {index}: the file has {count}")]
    OutOfRange { index: usize, count: usize },
}

impl ShapefileError {
    pub fn is_out_of_range(&self) -> bool {
        match *self {
            ShapefileError::OutOfRange { .. } => true,
            _ => false,
        }
    }

    pub fn is_record_error(&self) -> bool {
        match *self {
            ShapefileError::RecordError { .. } => true,
            _ => false,
        }
    }
}

/// Random access to the features of a ".shp"/".dbf" pair.
///
/// Every `feature()` call seeks and reads both files, so a `ShapeFile` takes
/// `&mut self` and can't be shared between threads without a lock. Dropping
/// it (or calling `close()`) closes both files.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use shpread::read::shapefile::{ReadOptions, ShapeFile};
///
/// # fn read(shp_bytes: Vec<u8>, dbf_bytes: Vec<u8>) {
/// let mut shapefile = ShapeFile::new(Cursor::new(shp_bytes), Cursor::new(dbf_bytes), ReadOptions::default()).unwrap();
///
/// for i in 0..shapefile.shape_count() {
///     match shapefile.feature(i) {
///         Some(feature) => println!("{}", feature),
///         None => println!("record {} is unreadable", i),
///     }
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct ShapeFile<R: Read + Seek, S: Read + Seek> {
    shp_reader: shp::ShpReader<R>,
    dbf_reader: dbf::DbfReader<S>,
    options: ReadOptions,
}

impl<R: Read + Seek, S: Read + Seek> ShapeFile<R, S> {
    /// Reads both headers and indexes every ".shp" record.
    ///
    /// Fails if either file is malformed or if their record counts differ.
    pub fn new(r: R, s: S, options: ReadOptions) -> Result<ShapeFile<R, S>, ShapefileError> {
        let shp_reader = shp::ShpReader::new(r)?;
        let dbf_reader = dbf::DbfReader::new(s, options.encoding)?;

        if shp_reader.n_records() != dbf_reader.n_records() {
            return Err(ShapefileError::JoinError(format!(
                "'.shp' file has {} records but '.dbf' file has {}",
                shp_reader.n_records(),
                dbf_reader.n_records()
            )));
        }

        tracing::debug!(
            shape_type = ?shp_reader.header.shape_type,
            shape_count = shp_reader.n_records(),
            field_count = dbf_reader.meta.fields.len(),
            "Opened shapefile"
        );

        Ok(ShapeFile {
            shp_reader: shp_reader,
            dbf_reader: dbf_reader,
            options: options,
        })
    }

    pub fn shape_type(&self) -> shp::ShpShapeType {
        self.shp_reader.header.shape_type
    }

    pub fn shape_count(&self) -> usize {
        self.shp_reader.n_records()
    }

    pub fn field_count(&self) -> usize {
        self.dbf_reader.meta.fields.len()
    }

    /// The whole file's box, from the ".shp" header.
    pub fn bounding_box(&self) -> shp::ShpBoundingBox {
        self.shp_reader.header.bounding_box
    }

    pub fn fields(&self) -> &[dbf::DbfField] {
        &self.dbf_reader.meta.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&dbf::DbfField> {
        self.dbf_reader.get_field(name)
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Reads the raw ".shp" record at `index`, without touching the ".dbf".
    pub fn raw_shape(&mut self, index: usize) -> Result<shp::RawShape, ShapefileError> {
        self.check_index(index)?;
        self.shp_reader.read_shape(index)
            .map_err(|err| ShapefileError::RecordError { index: index, source: err.into() })
    }

    fn check_index(&self, index: usize) -> Result<(), ShapefileError> {
        if index >= self.shape_count() {
            Err(ShapefileError::OutOfRange { index: index, count: self.shape_count() })
        } else {
            Ok(())
        }
    }

    /// Assembles feature `index` (0-based) from both files.
    pub fn try_feature(&mut self, index: usize) -> Result<Feature, ShapefileError> {
        let shape = self.raw_shape(index)?;
        let attributes = self.dbf_reader.read_record(index)
            .map_err(|err| ShapefileError::RecordError { index: index, source: err.into() })?;

        Ok(geo::Feature {
            id: index as u64,
            bounding_box: bounding_box(&shape),
            geometry: reconstruct(&shape, &self.options),
            attributes: attributes,
        })
    }

    /// Like `try_feature()`, but any failure becomes `None`.
    ///
    /// Damaged records are logged at `warn` level.
    pub fn feature(&mut self, index: usize) -> Option<Feature> {
        match self.try_feature(index) {
            Ok(feature) => Some(feature),
            Err(ref err) if err.is_out_of_range() => None,
            Err(err) => {
                tracing::warn!(index = index, error = %err, "Skipping unreadable shapefile record");
                None
            }
        }
    }

    /// Iterates over every feature in order.
    pub fn features(&mut self) -> Features<'_, R, S> {
        Features { shapefile: self, next_index: 0 }
    }

    /// Closes both files.
    pub fn close(self) {
        let (r, s) = self.into_inner();
        drop(r);
        drop(s);
    }

    pub fn into_inner(self) -> (R, S) {
        (self.shp_reader.into_inner(), self.dbf_reader.into_inner())
    }
}

#[derive(Debug)]
pub struct Features<'a, R: Read + Seek + 'a, S: Read + Seek + 'a> {
    shapefile: &'a mut ShapeFile<R, S>,
    next_index: usize,
}

impl<'a, R: Read + Seek, S: Read + Seek> Iterator for Features<'a, R, S> {
    type Item = Result<Feature, ShapefileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.shapefile.shape_count() {
            None
        } else {
            let ret = self.shapefile.try_feature(self.next_index);
            self.next_index += 1;
            Some(ret)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.shapefile.shape_count() - self.next_index;
        (n, Some(n))
    }
}

/// Open by ".shp" filename (or by the name both files share).
///
/// The ".dbf" path is derived by swapping the extension; opening fails if
/// that file does not exist.
pub fn open_with(path: &Path, options: ReadOptions) -> Result<ShapeFile<io::BufReader<fs::File>, io::BufReader<fs::File>>, ShapefileError> {
    let shp_path = path.with_extension("shp");
    let dbf_path = path.with_extension("dbf");

    let shp_f = fs::File::open(&shp_path).map_err(shp::ShpError::from)?;
    let dbf_f = fs::File::open(&dbf_path).map_err(dbf::DbfError::from)?;

    ShapeFile::new(io::BufReader::new(shp_f), io::BufReader::new(dbf_f), options)
}

pub fn open(path: &Path) -> Result<ShapeFile<io::BufReader<fs::File>, io::BufReader<fs::File>>, ShapefileError> {
    open_with(path, ReadOptions::default())
}
