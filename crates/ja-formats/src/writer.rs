//! Big-endian byte writer over a growable buffer.

use byteorder::{BigEndian, ByteOrder};

use crate::tag::Tag;

/// Writes big-endian values at a movable position.
///
/// Writing past the end grows the buffer; seeking past the end zero-fills
/// on the next write.
#[derive(Clone, Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
    pos: usize,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn seek(&mut self, pos: usize) -> &mut Self {
        self.pos = pos;
        self
    }

    /// Move to the end of the written data.
    pub fn seek_end(&mut self) -> &mut Self {
        self.pos = self.buf.len();
        self
    }

    /// Zero-pad up to the next multiple of `n`.
    pub fn align(&mut self, n: usize) -> &mut Self {
        if n > 1 {
            let rem = self.pos % n;
            if rem != 0 {
                self.zeros(n - rem);
            }
        }
        self
    }

    pub fn zeros(&mut self, n: usize) -> &mut Self {
        let end = self.pos + n;
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].fill(0);
        self.pos = end;
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        let end = self.pos + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.bytes(&[v])
    }

    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.bytes(&[v as u8])
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        let mut b = [0; 2];
        BigEndian::write_u16(&mut b, v);
        self.bytes(&b)
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        let mut b = [0; 2];
        BigEndian::write_i16(&mut b, v);
        self.bytes(&b)
    }

    pub fn u24(&mut self, v: u32) -> &mut Self {
        let mut b = [0; 3];
        BigEndian::write_u24(&mut b, v & 0x00FF_FFFF);
        self.bytes(&b)
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        let mut b = [0; 4];
        BigEndian::write_u32(&mut b, v);
        self.bytes(&b)
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        let mut b = [0; 4];
        BigEndian::write_i32(&mut b, v);
        self.bytes(&b)
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        let mut b = [0; 8];
        BigEndian::write_u64(&mut b, v);
        self.bytes(&b)
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        let mut b = [0; 4];
        BigEndian::write_f32(&mut b, v);
        self.bytes(&b)
    }

    pub fn tag(&mut self, tag: Tag) -> &mut Self {
        self.bytes(tag.as_bytes())
    }

    /// String bytes followed by a zero byte.
    pub fn cstr(&mut self, s: &str) -> &mut Self {
        self.bytes(s.as_bytes()).u8(0)
    }

    /// Overwrite a u32 at `pos` without moving the write position.
    pub fn patch_u32(&mut self, pos: usize, v: u32) -> &mut Self {
        let saved = self.pos;
        self.seek(pos).u32(v);
        self.pos = saved;
        self
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
