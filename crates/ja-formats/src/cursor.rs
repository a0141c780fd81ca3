//! Big-endian byte cursor over any addressable byte source.
//!
//! Every decoder in this crate reads through [`ByteCursor`]. Sources are
//! random-access ([`ByteSource::read_at`]), so a cursor never rewinds on its
//! own; callers save and restore [`ByteCursor::tell`] around nested reads.
//! [`VirtualRegion`] narrows a source to a window so nested blobs can be
//! decoded with blob-relative offsets without copying.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use binrw::{BinRead, Endian};
use byteorder::{BigEndian, ByteOrder};

use crate::error::{FormatError, Result};
use crate::tag::Tag;

// ---------------------------------------------------------------------------
// ByteSource
// ---------------------------------------------------------------------------

/// Random-access, read-only bytes.
pub trait ByteSource {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with the bytes at `[pos, pos + buf.len())`.
    ///
    /// Fails without reading anything if that range is not inside the source.
    fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<()>;

    /// Copy `[pos, pos + len)` into a new vector.
    fn read_vec(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; len];
        self.read_at(pos, &mut buf)?;
        Ok(buf)
    }
}

impl ByteSource for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let len = <[u8]>::len(self) as u64;
        let end = pos.checked_add(buf.len() as u64);
        match end {
            Some(end) if end <= len => {
                buf.copy_from_slice(&self[pos as usize..end as usize]);
                Ok(())
            }
            _ => Err(FormatError::TruncatedRead {
                offset: pos,
                needed: buf.len(),
                len,
            }),
        }
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.as_slice().read_at(pos, buf)
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &T {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(pos, buf)
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Arc<T> {
    fn len(&self) -> u64 {
        (**self).len()
    }

    fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(pos, buf)
    }
}

// ---------------------------------------------------------------------------
// VirtualRegion
// ---------------------------------------------------------------------------

/// A read-only window `[start, start + size)` over another source.
///
/// Offsets passed to the region are relative to `start`. Regions nest.
#[derive(Clone, Debug)]
pub struct VirtualRegion<S> {
    source: S,
    start: u64,
    size: u64,
}

impl<S: ByteSource> VirtualRegion<S> {
    pub fn new(source: S, start: u64, size: u64) -> Result<Self> {
        let outer = source.len();
        match start.checked_add(size) {
            Some(end) if end <= outer => Ok(Self { source, start, size }),
            _ => Err(FormatError::OutOfBounds {
                offset: start,
                len: size,
                size: outer,
            }),
        }
    }

    /// Absolute start of the window inside its source.
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S: ByteSource> ByteSource for VirtualRegion<S> {
    fn len(&self) -> u64 {
        self.size
    }

    fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let len = buf.len() as u64;
        match pos.checked_add(len) {
            Some(end) if end <= self.size => self.source.read_at(self.start + pos, buf),
            _ => Err(FormatError::OutOfBounds {
                offset: pos,
                len,
                size: self.size,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// A file read with positioned reads.
///
/// The handle sits behind a mutex so the source can be shared; each read
/// seeks and reads under the lock.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let needed = buf.len();
        let len = self.len;
        let truncated = move || FormatError::TruncatedRead {
            offset: pos,
            needed,
            len,
        };
        match pos.checked_add(needed as u64) {
            Some(end) if end <= self.len => {}
            _ => return Err(truncated()),
        }
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => truncated(),
            _ => FormatError::Io(e),
        })
    }
}

// ---------------------------------------------------------------------------
// Fixed-size records
// ---------------------------------------------------------------------------

/// A fixed-size big-endian structure read in one piece.
pub trait Record: for<'a> BinRead<Args<'a> = ()> {
    /// Size of the record on disk.
    const SIZE: usize;
}

// ---------------------------------------------------------------------------
// ByteCursor
// ---------------------------------------------------------------------------

/// A position over a [`ByteSource`]. All numeric reads are big-endian.
#[derive(Clone, Debug)]
pub struct ByteCursor<S> {
    source: S,
    pos: u64,
}

impl<S: ByteSource> ByteCursor<S> {
    pub fn new(source: S) -> Self {
        Self { source, pos: 0 }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    pub fn len(&self) -> u64 {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn tell(&self) -> u64 {
        self.pos
    }

    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.pos)
    }

    /// Move to an absolute position. Positions past the end are rejected.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        let len = self.len();
        if pos > len {
            return Err(FormatError::OutOfBounds {
                offset: pos,
                len: 0,
                size: len,
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        let target = self.pos.checked_add(n).ok_or(FormatError::OutOfBounds {
            offset: self.pos,
            len: n,
            size: self.len(),
        })?;
        self.seek(target)
    }

    /// Advance to the next multiple of `n`.
    pub fn align(&mut self, n: u64) -> Result<()> {
        if n <= 1 {
            return Ok(());
        }
        let rem = self.pos % n;
        if rem != 0 {
            self.skip(n - rem)?;
        }
        Ok(())
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.source.read_at(self.pos, buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let buf = self.source.read_vec(self.pos, n)?;
        self.pos += n as u64;
        Ok(buf)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Byte at the current position without consuming it.
    pub fn peek_u8(&self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.source.read_at(self.pos, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(&self.read_array::<2>()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(&self.read_array::<2>()?))
    }

    /// Unsigned 24-bit value, as used by sequence offsets.
    pub fn read_u24(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u24(&self.read_array::<3>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(&self.read_array::<4>()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(&self.read_array::<4>()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(&self.read_array::<8>()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(BigEndian::read_i64(&self.read_array::<8>()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(BigEndian::read_f32(&self.read_array::<4>()?))
    }

    pub fn read_tag(&mut self) -> Result<Tag> {
        Ok(Tag(self.read_array::<4>()?))
    }

    /// Read a tag and fail with `InvalidMagic` unless it equals `expected`.
    pub fn expect_tag(&mut self, expected: Tag) -> Result<()> {
        let offset = self.pos;
        let found = self.read_tag()?;
        if found != expected {
            return Err(FormatError::InvalidMagic {
                offset,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// `n` bytes taken as ASCII, one char per byte.
    pub fn read_fixed_string(&mut self, n: usize) -> Result<String> {
        Ok(self.read_bytes(n)?.into_iter().map(char::from).collect())
    }

    /// Bytes up to a zero byte, which is consumed but not returned.
    pub fn read_null_terminated_string(&mut self) -> Result<String> {
        let start = self.pos;
        let mut out = String::new();
        loop {
            if self.pos >= self.len() {
                self.pos = start;
                return Err(FormatError::UnexpectedEndOfData { offset: start });
            }
            match self.read_u8()? {
                0 => return Ok(out),
                b => out.push(char::from(b)),
            }
        }
    }

    /// Read one fixed-size [`Record`].
    pub fn read_record<T: Record>(&mut self) -> Result<T> {
        let buf = self.read_bytes(T::SIZE)?;
        let mut reader = io::Cursor::new(buf);
        Ok(T::read_options(&mut reader, Endian::Big, ())?)
    }

    /// Run `f` at `pos`, then restore the current position.
    pub fn at<T>(&mut self, pos: u64, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.pos;
        self.seek(pos)?;
        let out = f(self);
        self.pos = saved;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinRead;

    #[derive(BinRead, Debug, PartialEq)]
    #[br(big)]
    struct Pair {
        a: u16,
        #[br(pad_before = 1)]
        b: u8,
    }

    impl Record for Pair {
        const SIZE: usize = 4;
    }

    #[test]
    fn numeric_reads_are_big_endian() {
        let data: Vec<u8> = vec![
            0x12, 0x34, 0xAB, 0xCD, 0xEF, 0x01, 0x02, 0x03, 0x04, 0x3F, 0x80, 0x00, 0x00,
        ];
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read_u16().unwrap(), 0x1234);
        assert_eq!(c.read_u24().unwrap(), 0xABCDEF);
        assert_eq!(c.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(c.read_f32().unwrap(), 1.0);
        assert_eq!(c.tell(), 13);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn signed_reads() {
        let data: Vec<u8> = vec![0xFF, 0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0x80];
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read_i16().unwrap(), -2);
        assert_eq!(c.read_i32().unwrap(), -1);
        assert_eq!(c.read_i8().unwrap(), -128);
    }

    #[test]
    fn short_read_is_truncated_and_keeps_position() {
        let data: Vec<u8> = vec![1, 2, 3];
        let mut c = ByteCursor::new(&data);
        c.read_u8().unwrap();
        let err = c.read_u32().unwrap_err();
        assert!(matches!(err, FormatError::TruncatedRead { offset: 1, needed: 4, len: 3 }));
        assert_eq!(c.tell(), 1);
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let data: Vec<u8> = vec![0; 4];
        let mut c = ByteCursor::new(&data);
        assert!(c.seek(4).is_ok());
        assert!(matches!(c.seek(5), Err(FormatError::OutOfBounds { .. })));
        assert_eq!(c.tell(), 4);
    }

    #[test]
    fn align_skips_to_multiple() {
        let data: Vec<u8> = vec![0; 16];
        let mut c = ByteCursor::new(&data);
        c.skip(5).unwrap();
        c.align(4).unwrap();
        assert_eq!(c.tell(), 8);
        c.align(4).unwrap();
        assert_eq!(c.tell(), 8);
    }

    #[test]
    fn strings() {
        let data: Vec<u8> = b"abcdNAME\0tail".to_vec();
        let mut c = ByteCursor::new(&data);
        assert_eq!(c.read_fixed_string(4).unwrap(), "abcd");
        assert_eq!(c.read_null_terminated_string().unwrap(), "NAME");
        assert_eq!(c.tell(), 9);
        let err = c.read_null_terminated_string().unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEndOfData { offset: 9 }));
    }

    #[test]
    fn expect_tag_reports_both_tags() {
        let data: Vec<u8> = b"WSYS".to_vec();
        let mut c = ByteCursor::new(&data);
        match c.expect_tag(Tag::new(b"IBNK")) {
            Err(FormatError::InvalidMagic { expected, found, .. }) => {
                assert_eq!(expected, Tag::new(b"IBNK"));
                assert_eq!(found, Tag::new(b"WSYS"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn region_reads_are_relative_and_bounded() {
        let data: Vec<u8> = (0u8..32).collect();
        let region = VirtualRegion::new(&data, 8, 8).unwrap();
        let mut c = ByteCursor::new(&region);
        assert_eq!(c.read_u8().unwrap(), 8);
        c.seek(4).unwrap();
        assert_eq!(c.read_u32().unwrap(), 0x0C0D_0E0F);
        assert!(matches!(c.read_u8(), Err(FormatError::OutOfBounds { offset: 8, .. })));
        c.seek(6).unwrap();
        assert!(matches!(c.read_u32(), Err(FormatError::OutOfBounds { .. })));
    }

    #[test]
    fn regions_nest() {
        let data: Vec<u8> = (0u8..32).collect();
        let outer = VirtualRegion::new(&data, 4, 20).unwrap();
        let inner = VirtualRegion::new(&outer, 4, 8).unwrap();
        let mut c = ByteCursor::new(&inner);
        assert_eq!(c.read_u8().unwrap(), 8);
        assert!(VirtualRegion::new(&outer, 16, 8).is_err());
    }

    #[test]
    fn region_must_fit_source() {
        let data: Vec<u8> = vec![0; 10];
        assert!(VirtualRegion::new(&data, 6, 4).is_ok());
        assert!(matches!(
            VirtualRegion::new(&data, 6, 5),
            Err(FormatError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn at_restores_position() {
        let data: Vec<u8> = vec![0, 1, 2, 3, 4, 5];
        let mut c = ByteCursor::new(&data);
        c.skip(1).unwrap();
        let v = c.at(4, |c| c.read_u16()).unwrap();
        assert_eq!(v, 0x0405);
        assert_eq!(c.tell(), 1);
    }

    #[test]
    fn read_record_consumes_declared_size() {
        let data: Vec<u8> = vec![0x00, 0x2A, 0xEE, 0x07, 0x99];
        let mut c = ByteCursor::new(&data);
        let rec: Pair = c.read_record().unwrap();
        assert_eq!(rec, Pair { a: 42, b: 7 });
        assert_eq!(c.tell(), 4);
    }

    #[test]
    fn file_source_reads_positioned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [9u8, 8, 7, 6, 5]).unwrap();
        let src = FileSource::open(&path).unwrap();
        let mut c = ByteCursor::new(&src);
        c.seek(2).unwrap();
        assert_eq!(c.read_u16().unwrap(), 0x0706);
        assert!(matches!(c.read_u16(), Err(FormatError::TruncatedRead { .. })));
    }
}
