//! Writes small ".shp"/".dbf" pairs for tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

pub const POINT: u32 = 1;
pub const POLYLINE: u32 = 3;
pub const POLYGON: u32 = 5;
pub const MULTIPOINT: u32 = 8;
pub const POINTZ: u32 = 11;
pub const POLYLINEZ: u32 = 13;
pub const POLYGONZ: u32 = 15;
pub const MULTIPOINTZ: u32 = 18;
pub const POINTM: u32 = 21;

fn has_z(shape_type: u32) -> bool {
    shape_type >= 11 && shape_type < 21
}

fn has_m(shape_type: u32) -> bool {
    shape_type >= 11
}

fn min_max<I: Iterator<Item = f64>>(vs: I) -> (f64, f64) {
    vs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn doubles(buf: &mut Vec<u8>, vs: &[f64]) {
    for v in vs {
        buf.write_f64::<LittleEndian>(*v).unwrap();
    }
}

/// A vertex as (x, y, z, m). Z and M are written only when the type has them.
pub type V = (f64, f64, f64, f64);

pub fn point_record(shape_type: u32, v: V) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(shape_type).unwrap();
    doubles(&mut buf, &[v.0, v.1]);
    if has_z(shape_type) {
        doubles(&mut buf, &[v.2]);
    }
    if has_m(shape_type) {
        doubles(&mut buf, &[v.3]);
    }
    buf
}

/// MultiPoint, PolyLine or Polygon content. MultiPoint types take one part.
pub fn multi_record(shape_type: u32, parts: &[&[V]]) -> Vec<u8> {
    let is_multipoint = shape_type % 10 == 8;
    let vertices: Vec<V> = parts.iter().flat_map(|p| p.iter().cloned()).collect();
    let (x_min, x_max) = min_max(vertices.iter().map(|v| v.0));
    let (y_min, y_max) = min_max(vertices.iter().map(|v| v.1));

    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(shape_type).unwrap();
    doubles(&mut buf, &[x_min, y_min, x_max, y_max]);
    if !is_multipoint {
        buf.write_i32::<LittleEndian>(parts.len() as i32).unwrap();
    }
    buf.write_i32::<LittleEndian>(vertices.len() as i32).unwrap();
    if !is_multipoint {
        let mut start = 0;
        for p in parts {
            buf.write_i32::<LittleEndian>(start).unwrap();
            start += p.len() as i32;
        }
    }
    for v in &vertices {
        doubles(&mut buf, &[v.0, v.1]);
    }
    if has_z(shape_type) {
        let (z_min, z_max) = min_max(vertices.iter().map(|v| v.2));
        doubles(&mut buf, &[z_min, z_max]);
        for v in &vertices {
            doubles(&mut buf, &[v.2]);
        }
    }
    if has_m(shape_type) {
        let (m_min, m_max) = min_max(vertices.iter().map(|v| v.3));
        doubles(&mut buf, &[m_min, m_max]);
        for v in &vertices {
            doubles(&mut buf, &[v.3]);
        }
    }
    buf
}

pub fn shp_file(shape_type: u32, bbox: [f64; 8], records: &[Vec<u8>]) -> Vec<u8> {
    let n_bytes: usize = 100 + records.iter().map(|c| 8 + c.len()).sum::<usize>();
    let mut buf = Vec::new();
    buf.write_u32::<BigEndian>(9994).unwrap();
    buf.extend_from_slice(&[0u8; 20]);
    buf.write_u32::<BigEndian>((n_bytes / 2) as u32).unwrap();
    buf.write_u32::<LittleEndian>(1000).unwrap();
    buf.write_u32::<LittleEndian>(shape_type).unwrap();
    doubles(&mut buf, &bbox);
    for (i, content) in records.iter().enumerate() {
        buf.write_u32::<BigEndian>(i as u32 + 1).unwrap();
        buf.write_u32::<BigEndian>((content.len() / 2) as u32).unwrap();
        buf.extend_from_slice(content);
    }
    buf
}

/// Fields are (name, type code, length, decimals); rows hold one value per
/// field, padded with spaces on the right.
pub fn dbf_file(fields: &[(&str, u8, u8, u8)], rows: &[Vec<&str>]) -> Vec<u8> {
    let n_header_bytes = 32 + 32 * fields.len() + 1;
    let n_bytes_per_record = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();

    let mut buf = vec![3u8, 121, 6, 15];
    buf.write_u32::<LittleEndian>(rows.len() as u32).unwrap();
    buf.write_u16::<LittleEndian>(n_header_bytes as u16).unwrap();
    buf.write_u16::<LittleEndian>(n_bytes_per_record as u16).unwrap();
    buf.extend_from_slice(&[0u8; 20]);
    for &(name, code, len, decimals) in fields {
        let mut descriptor = [0u8; 32];
        descriptor[..name.len()].copy_from_slice(name.as_bytes());
        descriptor[11] = code;
        descriptor[16] = len;
        descriptor[17] = decimals;
        buf.extend_from_slice(&descriptor);
    }
    buf.push(0x0d);
    for row in rows {
        buf.push(b' ');
        for (value, field) in row.iter().zip(fields) {
            let mut cell = vec![b' '; field.2 as usize];
            cell[..value.len()].copy_from_slice(value.as_bytes());
            buf.extend_from_slice(&cell);
        }
    }
    buf.push(0x1a);
    buf
}

/// Writes `<dir>/<name>.shp` and `<dir>/<name>.dbf`; returns the ".shp" path.
pub fn write_pair(dir: &Path, name: &str, shp: &[u8], dbf: &[u8]) -> PathBuf {
    let shp_path = dir.join(format!("{}.shp", name));
    fs::write(&shp_path, shp).unwrap();
    fs::write(dir.join(format!("{}.dbf", name)), dbf).unwrap();
    shp_path
}

/// A one-field table with `n` rows named "row0", "row1", ...
pub fn names_dbf(n: usize) -> Vec<u8> {
    let names: Vec<String> = (0..n).map(|i| format!("row{}", i)).collect();
    let rows: Vec<Vec<&str>> = names.iter().map(|s| vec![s.as_str()]).collect();
    dbf_file(&[("NAME", b'C', 10, 0)], &rows)
}
