//! Bounds-checked reads of fixed-width integers and floats from a byte slice.
//!
//! Shapefiles mix byte orders: ".shp" headers are partly big-endian, record
//! contents and all of ".dbf" are little-endian. `ByteCursor` keeps a position
//! and refuses to read past the end of its buffer.
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("needed {wanted} bytes at offset {offset}, but only {available} remain")]
pub struct CursorError {
    pub offset: usize,
    pub wanted: usize,
    pub available: usize,
}

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> ByteCursor<'a> {
        ByteCursor { buf: buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fails unless `n` more bytes can be read. Lets callers validate a
    /// length field before allocating for it.
    pub fn require(&self, n: usize) -> Result<(), CursorError> {
        if n > self.remaining() {
            Err(CursorError {
                offset: self.pos,
                wanted: n,
                available: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CursorError> {
        self.require(n)?;
        let ret = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(ret)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), CursorError> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, CursorError> {
        self.take(1).map(|b| b[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, CursorError> {
        self.take(2).map(LittleEndian::read_u16)
    }

    pub fn read_u32_be(&mut self) -> Result<u32, CursorError> {
        self.take(4).map(BigEndian::read_u32)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, CursorError> {
        self.take(4).map(LittleEndian::read_u32)
    }

    pub fn read_i32_le(&mut self) -> Result<i32, CursorError> {
        self.take(4).map(LittleEndian::read_i32)
    }

    pub fn read_f64_le(&mut self) -> Result<f64, CursorError> {
        self.take(8).map(LittleEndian::read_f64)
    }

    /// Reads `n` consecutive little-endian doubles.
    pub fn read_f64s_le(&mut self, n: usize) -> Result<Vec<f64>, CursorError> {
        let bytes = self.take(n.checked_mul(8).unwrap_or(usize::max_value()))?;
        Ok(bytes.chunks(8).map(LittleEndian::read_f64).collect())
    }

    /// Reads `n` consecutive little-endian 32-bit signed integers.
    pub fn read_i32s_le(&mut self, n: usize) -> Result<Vec<i32>, CursorError> {
        let bytes = self.take(n.checked_mul(4).unwrap_or(usize::max_value()))?;
        Ok(bytes.chunks(4).map(LittleEndian::read_i32).collect())
    }
}

#[cfg(test)]
mod test {
    use super::{ByteCursor, CursorError};

    #[test]
    fn mixed_byte_orders() {
        let buf = [0x00, 0x00, 0x27, 0x0a, 0xe8, 0x03, 0x00, 0x00];
        let mut c = ByteCursor::new(&buf);
        assert_eq!(9994, c.read_u32_be().unwrap());
        assert_eq!(1000, c.read_u32_le().unwrap());
        assert_eq!(0, c.remaining());
    }

    #[test]
    fn doubles() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1.5f64.to_le_bytes());
        buf.extend_from_slice(&(-2.25f64).to_le_bytes());
        let mut c = ByteCursor::new(&buf);
        assert_eq!(vec![1.5, -2.25], c.read_f64s_le(2).unwrap());
    }

    #[test]
    fn read_past_end() {
        let buf = [1u8, 2, 3];
        let mut c = ByteCursor::new(&buf);
        c.skip(1).unwrap();
        assert_eq!(
            Err(CursorError { offset: 1, wanted: 4, available: 2 }),
            c.read_i32_le()
        );
        // a failed read does not move the cursor
        assert_eq!(1, c.position());
        assert_eq!(2, c.read_u8().unwrap());
    }

    #[test]
    fn huge_counts_fail_without_allocating() {
        let buf = [0u8; 16];
        let mut c = ByteCursor::new(&buf);
        assert!(c.read_f64s_le(usize::max_value() / 2).is_err());
        assert!(c.read_i32s_le(5).is_err());
        assert_eq!(4, c.read_i32s_le(4).unwrap().len());
    }
}
