//! Sources of the control/diff/extra stream.
//!
//! The engine pulls every byte it needs through [`ControlSource`], which has a
//! single all-or-nothing operation. Whether the payload is stored raw or
//! bzip2-compressed is decided by the caller through [`Transport`]; the file
//! itself does not say.
use super::error::{Error, Result};
use bzip2::read::BzDecoder;
use std::io::Read;

/// Encoding of the payload that follows the header.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Transport {
    /// Stored as is.
    #[default]
    Raw,

    /// A single bzip2 stream.
    Bzip2,
}

impl Transport {
    /// Wrap an already positioned reader as a control source.
    pub fn open<'r, R: Read + 'r>(self, reader: R) -> Box<dyn ControlSource + 'r> {
        match self {
            Transport::Raw => Box::new(RawSource::new(reader)),
            Transport::Bzip2 => Box::new(Bzip2Source::new(reader)),
        }
    }
}

/// Byte source driving the patch engine.
pub trait ControlSource {
    /// Fill the whole of `buf`.
    ///
    /// A short read, end of stream included, is an error. Nothing is
    /// buffered beyond the position of the underlying reader.
    fn read_all(&mut self, buf: &mut [u8]) -> Result<()>;
}

impl<S: ControlSource + ?Sized> ControlSource for &mut S {
    #[inline]
    fn read_all(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_all(buf)
    }
}

impl<S: ControlSource + ?Sized> ControlSource for Box<S> {
    #[inline]
    fn read_all(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read_all(buf)
    }
}

/// Uncompressed payload.
pub struct RawSource<R> {
    inner: R,
}

impl<R: Read> RawSource<R> {
    /// Read the payload straight from `inner`.
    pub fn new(inner: R) -> Self {
        RawSource { inner }
    }
}

impl<R: Read> ControlSource for RawSource<R> {
    #[inline]
    fn read_all(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(Error::Stream)
    }
}

/// Bzip2-compressed payload.
pub struct Bzip2Source<R> {
    inner: BzDecoder<R>,
}

impl<R: Read> Bzip2Source<R> {
    /// Decompress the payload read from `inner`.
    pub fn new(inner: R) -> Self {
        Bzip2Source {
            inner: BzDecoder::new(inner),
        }
    }
}

impl<R: Read> ControlSource for Bzip2Source<R> {
    #[inline]
    fn read_all(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(Error::Stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use std::io::{Cursor, Write};

    #[test]
    fn raw_reads_exactly() {
        let mut src = RawSource::new(&b"abcdef"[..]);
        let mut buf = [0; 4];
        src.read_all(&mut buf).unwrap();
        assert_eq!(&buf, b"abcd");
        src.read_all(&mut buf[..0]).unwrap();
        assert!(matches!(src.read_all(&mut buf), Err(Error::Stream(_))));
    }

    #[test]
    fn bzip2_reads_exactly() {
        let mut packed = Vec::new();
        {
            let mut enc = BzEncoder::new(Cursor::new(&mut packed), Compression::default());
            enc.write_all(b"abcdef").unwrap();
            enc.finish().unwrap();
        }

        let mut src = Transport::Bzip2.open(&packed[..]);
        let mut buf = [0; 6];
        src.read_all(&mut buf).unwrap();
        assert_eq!(&buf, b"abcdef");
        assert!(src.read_all(&mut buf[..1]).is_err());
    }

    #[test]
    fn bzip2_rejects_raw_bytes() {
        let mut src = Transport::Bzip2.open(&b"definitely not bzip2"[..]);
        let mut buf = [0; 4];
        assert!(matches!(src.read_all(&mut buf), Err(Error::Stream(_))));
    }
}
