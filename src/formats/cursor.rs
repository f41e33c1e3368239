use byteorder::{ByteOrder, LittleEndian};

use crate::error::{OpenError, OpenErrorKind};

/// Bounds-checked forward reader over an in-memory image.
pub(crate) struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn bytes(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], OpenError> {
        let s = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or(OpenErrorKind::Truncated {
                what,
                need: self.pos + n,
                have: self.data.len()
            })?;
        self.pos += n;
        Ok(s)
    }

    pub fn u8(&mut self, what: &'static str) -> Result<u8, OpenError> {
        Ok(self.bytes(1, what)?[0])
    }

    pub fn u16_le(&mut self, what: &'static str) -> Result<u16, OpenError> {
        Ok(LittleEndian::read_u16(self.bytes(2, what)?))
    }

    pub fn u32_le(&mut self, what: &'static str) -> Result<u32, OpenError> {
        Ok(LittleEndian::read_u32(self.bytes(4, what)?))
    }

    pub fn skip(&mut self, n: usize, what: &'static str) -> Result<(), OpenError> {
        self.bytes(n, what).map(|_| ())
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }
}
