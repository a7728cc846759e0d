/// Reads xbase ".dbf" file, as per
/// https://www.clicketyclick.dk/databases/xbase/format/dbf.html

use std::fmt;
use std::fs;
use std::io;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use encoding::DecoderTrap;
use regex::Regex;
use thiserror::Error;
use super::cursor::{ByteCursor, CursorError};

const DBF_HEADER_LENGTH: usize = 32;
const DBF_FIELD_DESCRIPTOR_LENGTH: usize = 32;
const DBF_HEADER_TERMINATOR: u8 = 0x0d;
const DBF_DELETED_FLAG: u8 = b'*';

lazy_static! {
    // What C's atoi() and atof() would consume.
    static ref INTEGER_PREFIX: Regex = Regex::new(r"^[+-]?[0-9]+").expect("valid regex");
    static ref FLOAT_PREFIX: Regex = Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?").expect("valid regex");
}

#[derive(Debug, Error)]
pub enum DbfError {
    #[error("{0}")]
    IOError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("No attribute record {index}: the file has {count}")]
    NoSuchRecord { index: usize, count: usize },
}

impl From<CursorError> for DbfError {
    fn from(err: CursorError) -> DbfError {
        DbfError::ParseError(err.to_string())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DbfType {
    String,
    Integer,
    Double,
    Logical,
}

impl DbfType {
    /// Resolves a descriptor's type code. Numbers without decimals are
    /// integers.
    fn with_code(code: u8, decimal_count: u8) -> Option<DbfType> {
        match code {
            b'C' => Some(DbfType::String),
            b'N' | b'F' if decimal_count == 0 => Some(DbfType::Integer),
            b'N' | b'F' => Some(DbfType::Double),
            b'L' => Some(DbfType::Logical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbfField {
    pub name: Arc<str>,
    pub data_type: DbfType,
    /// Byte offset within a record, counting the deletion flag.
    pub offset: usize,
    pub len: usize,
    pub decimal_count: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Integer(i64),
    Double(f64),
    Logical(bool),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AttributeValue::String(ref s) => write!(f, "{:?}", s),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Double(d) => write!(f, "{}", d),
            AttributeValue::Logical(b) => write!(f, "{}", b),
        }
    }
}

fn parse_integer(text: &str) -> i64 {
    let text = text.trim_start();
    match INTEGER_PREFIX.find(text) {
        None => 0,
        Some(m) => match m.as_str().parse::<i64>() {
            Ok(i) => i,
            // overflow: saturate
            Err(_) => m.as_str().parse::<f64>().map(|d| d as i64).unwrap_or(0),
        },
    }
}

fn parse_double(text: &str) -> f64 {
    let text = text.trim_start();
    FLOAT_PREFIX.find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.)
}

fn parse_logical(text: &str) -> bool {
    match text.trim_start().bytes().next() {
        Some(b'T') | Some(b't') | Some(b'Y') | Some(b'y') => true,
        _ => false,
    }
}

impl DbfField {
    /// Decodes this field's slot of a raw record.
    pub fn decode(&self, record: &[u8], encoding: encoding::EncodingRef) -> Result<AttributeValue, DbfError> {
        let bytes = match record.get(self.offset..self.offset + self.len) {
            Some(bytes) => bytes,
            None => return Err(DbfError::ParseError(format!("Field {} lies outside the {}-byte record", self.name, record.len()))),
        };

        let text = encoding.decode(bytes, DecoderTrap::Replace)
            .map_err(|err| DbfError::ParseError(format!("Field {} has undecodable text: {}", self.name, err)))?;

        Ok(match self.data_type {
            DbfType::String => AttributeValue::String(text.trim_end_matches(|c: char| c == ' ' || c == '\0').to_string()),
            DbfType::Integer => AttributeValue::Integer(parse_integer(&text)),
            DbfType::Double => AttributeValue::Double(parse_double(&text)),
            DbfType::Logical => AttributeValue::Logical(parse_logical(&text)),
        })
    }
}

/// One decoded row: values in field-declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct DbfRecord {
    /// The row carries the deletion flag. Deleted rows are returned anyway.
    pub deleted: bool,
    values: Box<[(Arc<str>, AttributeValue)]>,
}

impl DbfRecord {
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.iter().find(|&&(ref k, _)| &**k == name).map(|&(_, ref v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|&(ref k, ref v)| (&**k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for DbfRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug)]
struct DbfHeader {
    n_records: usize,
    n_header_bytes: usize,
    n_bytes_per_record: usize,
}

pub struct DbfMeta {
    pub n_records: usize,
    pub n_header_bytes: usize,
    pub n_bytes_per_record: usize,
    pub fields: Box<[DbfField]>,
    pub encoding: encoding::EncodingRef,
}

// encoding::EncodingRef does not implement std::fmt::Debug
impl fmt::Debug for DbfMeta {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("DbfMeta")
            .field("n_records", &self.n_records)
            .field("n_header_bytes", &self.n_header_bytes)
            .field("n_bytes_per_record", &self.n_bytes_per_record)
            .field("fields", &self.fields)
            .field("encoding", &self.encoding.name())
            .finish()
    }
}

/// Reads the first 32 bytes of the file.
///
/// Side-effect: advances the file cursor 32 bytes.
fn read_dbf_header<R: Read>(file: &mut R) -> Result<DbfHeader, DbfError> {
    let mut buf = [0u8; DBF_HEADER_LENGTH];
    file.read_exact(&mut buf)?;

    // It's hard to come up with a ParseError, because virtually any
    // combination of 32 bytes is a valid .dbf header.
    //
    // The one exception: invalid dates. bytes 1-3 (base 0) are "YMD"
    // in hex. All years are valid; there are 12 valid months and 31
    // valid days.
    if buf[2] > 12 || buf[3] > 31 {
        return Err(DbfError::ParseError(String::from("The first four bytes of the file mention an invalid creation date. This is not a valid .dbf file.")));
    }

    let mut c = ByteCursor::new(&buf);
    c.skip(4)?;
    let header = DbfHeader {
        n_records: c.read_u32_le()? as usize,
        n_header_bytes: c.read_u16_le()? as usize,
        n_bytes_per_record: c.read_u16_le()? as usize,
    };

    if header.n_header_bytes < DBF_HEADER_LENGTH {
        return Err(DbfError::ParseError(format!("Header length {} is shorter than the {}-byte prologue", header.n_header_bytes, DBF_HEADER_LENGTH)));
    }
    Ok(header)
}

/// Reads all field definitions from the file.
///
/// Assumes exactly DBF_HEADER_LENGTH bytes of the file have been read already.
/// In other words, call this after read_dbf_header().
fn read_dbf_fields<R: Read>(file: &mut R, dbf_header: &DbfHeader, encoding: encoding::EncodingRef) -> Result<Box<[DbfField]>, DbfError> {
    let mut buf = vec![0u8; dbf_header.n_header_bytes - DBF_HEADER_LENGTH];
    file.read_exact(&mut buf)?;

    let mut fields = Vec::<DbfField>::new();
    let mut offset = 1; // deletion flag

    for descriptor in buf.chunks(DBF_FIELD_DESCRIPTOR_LENGTH) {
        if descriptor[0] == DBF_HEADER_TERMINATOR || descriptor.len() < DBF_FIELD_DESCRIPTOR_LENGTH {
            break;
        }

        let mut c = ByteCursor::new(descriptor);
        let raw_name = c.take(11)?;
        let code = c.read_u8()?;
        c.skip(4)?;
        let len = c.read_u8()? as usize;
        let decimal_count = c.read_u8()?;

        let name_end = raw_name.iter().position(|&b| b == 0).unwrap_or(raw_name.len());
        let name = encoding.decode(&raw_name[..name_end], DecoderTrap::Replace)
            .map_err(|err| DbfError::ParseError(format!("Field {} has an undecodable name: {}", fields.len(), err)))?;
        let name = name.trim();

        let data_type = match DbfType::with_code(code, decimal_count) {
            Some(t) => t,
            None => return Err(DbfError::ParseError(format!("Field {} has unsupported type code {:?}", name, code as char))),
        };

        if offset + len > dbf_header.n_bytes_per_record {
            return Err(DbfError::ParseError(format!("Field {} ends at byte {}, past the {}-byte record", name, offset + len, dbf_header.n_bytes_per_record)));
        }

        fields.push(DbfField {
            name: Arc::from(name),
            data_type: data_type,
            offset: offset,
            len: len,
            decimal_count: decimal_count,
        });
        offset += len;
    }

    Ok(fields.into_boxed_slice())
}

/// Reads the header, including field definitions, from a .dbf file.
///
/// Assumes the cursor is at the start of the file.
fn read_dbf_meta<R: Read>(file: &mut R, encoding: encoding::EncodingRef) -> Result<DbfMeta, DbfError> {
    let dbf_header = read_dbf_header(file)?;
    let dbf_fields = read_dbf_fields(file, &dbf_header, encoding)?;
    Ok(DbfMeta {
        n_records: dbf_header.n_records,
        n_header_bytes: dbf_header.n_header_bytes,
        n_bytes_per_record: dbf_header.n_bytes_per_record,
        fields: dbf_fields,
        encoding: encoding,
    })
}

/// Reads an xBase ".dbf" file, following instructions at
/// https://www.clicketyclick.dk/databases/xbase/format/dbf.html
///
/// Records are fixed-width, so `read_record()` seeks straight to any one.
#[derive(Debug)]
pub struct DbfReader<R: Read + Seek> {
    file: R,
    pub meta: Arc<DbfMeta>,
}

impl<R: Read + Seek> DbfReader<R> {
    pub fn new(mut file: R, encoding: encoding::EncodingRef) -> Result<DbfReader<R>, DbfError> {
        file.seek(SeekFrom::Start(0))?;
        let meta = read_dbf_meta(&mut file, encoding)?;
        Ok(DbfReader {
            file: file,
            meta: Arc::new(meta),
        })
    }

    pub fn n_records(&self) -> usize {
        self.meta.n_records
    }

    pub fn get_field(&self, name: &str) -> Option<&DbfField> {
        self.meta.fields.iter().find(|f| &*f.name == name)
    }

    /// Seeks to row `index` (0-based) and decodes every field.
    pub fn read_record(&mut self, index: usize) -> Result<DbfRecord, DbfError> {
        let meta = &self.meta;
        if index >= meta.n_records {
            return Err(DbfError::NoSuchRecord { index: index, count: meta.n_records });
        }

        let offset = meta.n_header_bytes as u64 + index as u64 * meta.n_bytes_per_record as u64;
        let mut buf = vec![0u8; meta.n_bytes_per_record];
        self.file.seek(SeekFrom::Start(offset))?;
        if let Err(err) = self.file.read_exact(&mut buf) {
            return Err(if err.kind() == io::ErrorKind::UnexpectedEof {
                DbfError::ParseError(format!("Record {} is truncated", index))
            } else {
                DbfError::IOError(err)
            });
        }

        let values = meta.fields.iter()
            .map(|field| field.decode(&buf, meta.encoding).map(|v| (field.name.clone(), v)))
            .collect::<Result<Vec<_>, DbfError>>()?;

        Ok(DbfRecord {
            deleted: buf.first() == Some(&DBF_DELETED_FLAG),
            values: values.into_boxed_slice(),
        })
    }

    pub fn into_inner(self) -> R {
        self.file
    }
}

/// Opens an xBase ".dbf" file from the filesystem.
pub fn open(path: &Path, encoding: encoding::EncodingRef) -> Result<DbfReader<io::BufReader<fs::File>>, DbfError> {
    let f = fs::File::open(path)?;
    DbfReader::new(io::BufReader::new(f), encoding)
}
