//! Bounded Binary Reader
//!
//! [`Reader`] is a cursor over a shared, immutable byte buffer. Every reader
//! covers a window `[begin, end)` of the buffer; sub-readers narrow that
//! window so that a parser decoding one section of a file can never read
//! into the next one.
//!
//! All multi-byte values are little-endian. Accesses outside the window
//! return [`ForgeError::Reader`] instead of panicking.

use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::errors::{ForgeError, Result};

#[derive(Clone)]
pub struct Reader {
    data: Arc<[u8]>,
    begin: usize,
    end: usize,
    pos: usize,
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("begin", &self.begin)
            .field("end", &self.end)
            .field("position", &self.position())
            .finish()
    }
}

impl Reader {
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        let end = data.len();
        Self {
            data,
            begin: 0,
            end,
            pos: 0,
        }
    }

    /// Number of bytes covered by this reader.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.end - self.begin
    }

    /// Current position relative to the start of this reader.
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos - self.begin
    }

    #[inline]
    #[must_use]
    pub fn eof(&self) -> bool {
        self.pos >= self.end
    }

    #[inline]
    #[must_use]
    pub fn can_read(&self, len: usize) -> bool {
        self.pos.checked_add(len).is_some_and(|e| e <= self.end)
    }

    /// Checks that `count` elements of `element_size` bytes fit in the unread
    /// part of this reader. Header counts pass through here before they size
    /// an allocation.
    pub fn ensure_count(&self, count: usize, element_size: usize) -> Result<()> {
        match count.checked_mul(element_size) {
            Some(len) if self.can_read(len) => Ok(()),
            _ => Err(ForgeError::format(format!(
                "Count {count} at offset {} does not fit in the remaining {} bytes",
                self.position(),
                self.end - self.pos
            ))),
        }
    }

    fn bounds_error(&self, offset: usize, len: usize) -> ForgeError {
        ForgeError::Reader {
            offset,
            len,
            size: self.size(),
        }
    }

    // ========================================================================
    // Seeking
    // ========================================================================

    pub fn seek_from_begin(&mut self, position: usize) -> Result<()> {
        if position > self.size() {
            return Err(self.bounds_error(position, 0));
        }
        self.pos = self.begin + position;
        Ok(())
    }

    pub fn seek_from_end(&mut self, offset: usize) -> Result<()> {
        let position = self
            .size()
            .checked_sub(offset)
            .ok_or_else(|| self.bounds_error(offset, 0))?;
        self.seek_from_begin(position)
    }

    pub fn seek_forward(&mut self, offset: usize) -> Result<()> {
        if !self.can_read(offset) {
            return Err(self.bounds_error(self.position(), offset));
        }
        self.pos += offset;
        Ok(())
    }

    pub fn seek_backward(&mut self, offset: usize) -> Result<()> {
        let position = self
            .position()
            .checked_sub(offset)
            .ok_or_else(|| self.bounds_error(self.position(), offset))?;
        self.seek_from_begin(position)
    }

    // ========================================================================
    // Sub-readers
    // ========================================================================

    fn sub_reader(&self, absolute_begin: usize, len: usize) -> Result<Self> {
        let absolute_end = absolute_begin
            .checked_add(len)
            .filter(|e| *e <= self.end)
            .ok_or_else(|| self.bounds_error(absolute_begin - self.begin, len))?;
        Ok(Self {
            data: Arc::clone(&self.data),
            begin: absolute_begin,
            end: absolute_end,
            pos: absolute_begin,
        })
    }

    /// Reader over `len` bytes starting at `position` (relative to this reader's start).
    pub fn sub_reader_from_begin(&self, position: usize, len: usize) -> Result<Self> {
        if position > self.size() {
            return Err(self.bounds_error(position, len));
        }
        self.sub_reader(self.begin + position, len)
    }

    /// Reader over everything from `position` to the end of this reader.
    pub fn sub_reader_from_begin_to_end(&self, position: usize) -> Result<Self> {
        let len = self
            .size()
            .checked_sub(position)
            .ok_or_else(|| self.bounds_error(position, 0))?;
        self.sub_reader_from_begin(position, len)
    }

    /// Reader over the next `len` bytes. Does not move this reader.
    pub fn sub_reader_from_current(&self, len: usize) -> Result<Self> {
        self.sub_reader(self.pos, len)
    }

    /// Reader over `len` bytes starting `offset` bytes after the current position.
    pub fn sub_reader_from_current_at(&self, offset: usize, len: usize) -> Result<Self> {
        if !self.can_read(offset) {
            return Err(self.bounds_error(self.position(), offset));
        }
        self.sub_reader(self.pos + offset, len)
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Borrows the next `len` bytes and advances past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        if !self.can_read(len) {
            return Err(self.bounds_error(self.position(), len));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..self.pos])
    }

    /// Remaining bytes of this reader without advancing.
    #[must_use]
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..self.end]
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_array().map(i16::from_le_bytes)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    /// Reads an `i32` that is used as a count or offset. Negative values are rejected.
    pub fn read_size(&mut self) -> Result<usize> {
        let offset = self.position();
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| {
            ForgeError::format(format!(
                "Expected non-negative size at offset {offset}, got {value}"
            ))
        })
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_i32()? != 0)
    }

    pub fn read_vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Reads a fixed-length, NUL padded string. The result ends at the first NUL.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        let bytes = bytes
            .iter()
            .position(|b| *b == 0)
            .map_or(bytes, |nul| &bytes[..nul]);
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

impl From<Vec<u8>> for Reader {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&[u8]> for Reader {
    fn from(data: &[u8]) -> Self {
        Self::from_bytes(data)
    }
}
