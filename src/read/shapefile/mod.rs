//! Reads ".shp" and accompanying ".dbf" files.
//!
//! There are two pieces of information ".shp" and ".dbf" files _don't_
//! contain:
//!
//! * The _projection_ isn't specified. Sometimes there's a ".prj" file that
//!   contains that information, but no file format can represent all the
//!   projections out there in the world. This library ignores the file and
//!   returns `f64` points.
//! * The _text encoding_ of ".dbf" strings isn't specified. Pick one with
//!   `ReadOptions::encoding()` or one of the `open_*()` helpers; the default
//!   is UTF-8.
//!
//! Records are read by index: opening scans the ".shp" once to find where
//! every record starts, so the ".shx" index file is never read.
//!
//! # Examples
//!
//! Open by ".shp" filename:
//!
//! ```no_run
//! use std::path::Path;
//! use shpread::read::shapefile;
//!
//! let mut reader = shapefile::open_utf8(Path::new("counties.shp")).unwrap();
//!
//! for i in 0..reader.shape_count() {
//!     // feature() returns None for damaged records
//!     if let Some(feature) = reader.feature(i) {
//!         println!("{}", feature);
//!     }
//! }
//! ```
//!
//! Read multi-part lines and classify rings by winding order:
//!
//! ```no_run
//! use std::path::Path;
//! use shpread::read::shapefile::{self, LineParts, ReadOptions, RingRoles};
//!
//! let options = ReadOptions::default()
//!     .line_parts(LineParts::AllParts)
//!     .ring_roles(RingRoles::Winding);
//! let mut reader = shapefile::open_with(Path::new("rivers.shp"), options).unwrap();
//!
//! for feature_result in reader.features() {
//!     // feature_result is a Result<Feature, ShapefileError>
//!     println!("{:?}", feature_result);
//! }
//! ```

use std::fs;
use std::io;
use std::path::Path;

pub mod cursor;
pub mod dbf;
pub mod shp;
pub mod geo;
pub mod options;
pub mod shapefile;

pub use self::dbf::{AttributeValue, DbfField, DbfRecord, DbfType};
pub use self::shp::{PartType, RawShape, ShpBoundingBox, ShpShapeType, Vertex};
pub use self::geo::{reconstruct, split_parts, RawPart};
pub use self::options::{LineParts, ReadOptions, RingRoles};
pub use self::shapefile::{Feature, Features, RecordFormatError, ShapeFile, ShapefileError};
pub use self::shapefile::{open, open_with};

pub type FileShapeFile = ShapeFile<io::BufReader<fs::File>, io::BufReader<fs::File>>;

pub fn open_ascii(shp_path: &Path) -> Result<FileShapeFile, ShapefileError> {
    open_with(shp_path, ReadOptions::default().encoding(encoding::all::ASCII))
}

pub fn open_utf8(shp_path: &Path) -> Result<FileShapeFile, ShapefileError> {
    open_with(shp_path, ReadOptions::default().encoding(encoding::all::UTF_8))
}

pub fn open_windows1252(shp_path: &Path) -> Result<FileShapeFile, ShapefileError> {
    open_with(shp_path, ReadOptions::default().encoding(encoding::all::WINDOWS_1252))
}
