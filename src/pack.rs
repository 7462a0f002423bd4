#![forbid(unsafe_code)]
use super::error::{Error, Result};
use super::header::{Header, HEADER_SIZE};
use super::int::encode_int;
use super::stream::Transport;
use super::Control;
use bzip2::write::BzEncoder;
use log::debug;
use std::io::Write;

/// Compression level of the bzip2 compressor.
pub use bzip2::Compression;

/// Default buffer size for delta calculation.
pub const BUFFER_SIZE: usize = 4096;

/// Writer of `ENDSLEY/BSDIFF43` patches from precomputed instructions.
///
/// No matching is done here: the caller decides which instructions turn old
/// into new, and the packer encodes them together with the delta and extra
/// bytes they imply.
///
/// Pack a patch that keeps a common prefix and replaces the tail:
/// ```
/// use bspatch43::{Bspatch, Control, Packer};
///
/// let old = b"hello, world";
/// let new = b"hello, there!";
/// let ctrls = vec![Control { add: 7, copy: 6, seek: 0 }];
///
/// let mut patch = Vec::new();
/// Packer::new(old, new).pack(ctrls, &mut patch).unwrap();
/// assert_eq!(Bspatch::new(&patch).unwrap().apply(old).unwrap(), new);
/// ```
pub struct Packer<'o, 'n> {
    old: &'o [u8],
    new: &'n [u8],
    transport: Transport,
    level: Compression,
    bsize: usize,
}

impl<'o, 'n> Packer<'o, 'n> {
    /// Create new configuration for packing a patch from `old` to `new`.
    pub fn new(old: &'o [u8], new: &'n [u8]) -> Self {
        Packer {
            old,
            new,
            transport: Transport::default(),
            level: Compression::default(),
            bsize: BUFFER_SIZE,
        }
    }

    /// Set how the payload is stored (default is `Transport::Raw`).
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Set the compression level of bzip2, used with `Transport::Bzip2`.
    pub fn compression_level(mut self, lv: Compression) -> Self {
        self.level = lv;
        self
    }

    /// Set the buffer size for delta calculation (`bs >= 128`, default is `BUFFER_SIZE`).
    pub fn buffer_size(mut self, mut bs: usize) -> Self {
        if bs < 128 {
            bs = 128;
        }
        self.bsize = bs;
        self
    }

    /// Encode the instructions and write the complete patch.
    ///
    /// The instructions must cover `new` exactly. Nothing is written to
    /// `patch` unless they do. The size of patch would be returned if no
    /// error occurs.
    pub fn pack<I, P>(&self, ctrls: I, mut patch: P) -> Result<u64>
    where
        I: IntoIterator<Item = Control>,
        P: Write,
    {
        let header = Header {
            new_size: self.new.len() as u64,
        }
        .to_bytes()?;

        let mut body = Vec::new();
        match self.transport {
            Transport::Raw => self.encode(ctrls, &mut body)?,
            Transport::Bzip2 => {
                let mut bz = BzEncoder::new(&mut body, self.level);
                self.encode(ctrls, &mut bz)?;
                bz.finish().map_err(Error::Write)?;
            }
        }
        debug!(
            "packed {} -> {} bytes into {} byte {:?} payload",
            self.old.len(),
            self.new.len(),
            body.len(),
            self.transport
        );

        patch.write_all(&header[..]).map_err(Error::Write)?;
        patch.write_all(&body[..]).map_err(Error::Write)?;
        patch.flush().map_err(Error::Write)?;
        Ok((HEADER_SIZE + body.len()) as u64)
    }

    /// Write controls, delta data and extra data, interleaved.
    fn encode<I, W>(&self, ctrls: I, w: &mut W) -> Result<()>
    where
        I: IntoIterator<Item = Control>,
        W: Write,
    {
        let (s, t) = (self.old, self.new);
        let mut spos: i64 = 0;
        let mut tpos: usize = 0;
        let mut cbuf = [0; 24];
        let mut dat = Vec::with_capacity(self.bsize);

        for ctl in ctrls {
            let remain = (t.len() - tpos) as u64;
            if ctl.add > remain || ctl.copy > remain - ctl.add {
                return Err(Error::Overflow(format!(
                    "{:?} overruns target at {} of {}",
                    ctl,
                    tpos,
                    t.len()
                )));
            }
            let add = ctl.add as usize;
            let copy = ctl.copy as usize;

            // Write control data.
            cbuf[0..8].copy_from_slice(&encode_int(add as i64)?);
            cbuf[8..16].copy_from_slice(&encode_int(copy as i64)?);
            cbuf[16..24].copy_from_slice(&encode_int(ctl.seek)?);
            w.write_all(&cbuf[..]).map_err(Error::Write)?;

            // Compute and write delta data, using limited buffer `dat`.
            let mut done = 0;
            while done < add {
                let k = Ord::min(add - done, self.bsize);
                dat.extend((done..done + k).map(|i| {
                    let x = old_byte(s, spos.saturating_add(i as i64));
                    t[tpos + i].wrapping_sub(x)
                }));
                w.write_all(&dat[..]).map_err(Error::Write)?;
                dat.clear();
                done += k;
            }
            tpos += add;

            // Write extra data.
            w.write_all(&t[tpos..tpos + copy]).map_err(Error::Write)?;
            tpos += copy;
            if tpos == t.len() {
                continue;
            }

            spos = spos
                .checked_add(add as i64)
                .and_then(|p| p.checked_add(ctl.seek))
                .ok_or_else(|| Error::Overflow(format!("old cursor overflows at {:?}", ctl)))?;
        }

        if tpos != t.len() {
            return Err(Error::Overflow(format!(
                "instructions cover {} of {} target bytes",
                tpos,
                t.len()
            )));
        }
        Ok(())
    }
}

/// Old byte at `pos`, zero outside of `old`.
#[inline]
fn old_byte(old: &[u8], pos: i64) -> u8 {
    usize::try_from(pos)
        .ok()
        .and_then(|i| old.get(i).copied())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::super::header::MAGIC;
    use super::super::Bspatch;
    use super::*;

    fn pack(old: &[u8], new: &[u8], ctrls: Vec<Control>) -> Result<Vec<u8>> {
        let mut p = Vec::new();
        Packer::new(old, new).pack(ctrls, &mut p)?;
        Ok(p)
    }

    #[test]
    fn identity_layout() {
        let p = pack(b"abcdef", b"abcdef", vec![Control { add: 6, copy: 0, seek: 0 }]).unwrap();
        let mut expected = MAGIC.to_vec();
        expected.extend_from_slice(&[6, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(&[6, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(&[0; 16]);
        expected.extend_from_slice(&[0; 6]);
        assert_eq!(p, expected);
    }

    #[test]
    fn negative_seek_layout() {
        let p = pack(b"ab", b"ab", vec![
            Control { add: 1, copy: 0, seek: -1 },
            Control { add: 1, copy: 0, seek: 0 },
        ])
        .unwrap();
        assert_eq!(&p[40..48], &[1, 0, 0, 0, 0, 0, 0, 0x80]);
        // Second delta is b - a since the old cursor went back.
        assert_eq!(p[p.len() - 1], 1);
    }

    #[test]
    fn delta_outside_old_is_literal() {
        let p = pack(b"", b"xy", vec![Control { add: 2, copy: 0, seek: 0 }]).unwrap();
        assert_eq!(&p[p.len() - 2..], b"xy");
    }

    #[test]
    fn incomplete_cover_is_rejected() {
        let mut p = Vec::new();
        let r = Packer::new(b"abc", b"abcd").pack(vec![Control { add: 3, copy: 0, seek: 0 }], &mut p);
        assert!(matches!(r, Err(Error::Overflow(_))));
        assert!(p.is_empty());
    }

    #[test]
    fn overrun_is_rejected() {
        let r = pack(b"abc", b"abc", vec![Control { add: 2, copy: 2, seek: 0 }]);
        assert!(matches!(r, Err(Error::Overflow(_))));
    }

    #[test]
    fn unencodable_seek_is_rejected() {
        let r = pack(b"a", b"a", vec![Control { add: 1, copy: 0, seek: i64::MIN }]);
        assert!(matches!(r, Err(Error::Overflow(_))));
    }

    #[test]
    fn small_buffer_splits_delta() {
        let old: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let new: Vec<u8> = old.iter().map(|b| b.wrapping_mul(3)).collect();
        let ctrls = || vec![Control { add: 1000, copy: 0, seek: 0 }];

        let mut p1 = Vec::new();
        let mut p2 = Vec::new();
        Packer::new(&old, &new).buffer_size(1).pack(ctrls(), &mut p1).unwrap();
        Packer::new(&old, &new).pack(ctrls(), &mut p2).unwrap();
        assert_eq!(p1, p2);
    }

    #[test]
    fn compression_level_changes_payload_only() {
        let old: Vec<u8> = (0..20000u32).map(|i| (i % 251) as u8).collect();
        let new: Vec<u8> = old.iter().rev().copied().collect();
        let ctrls = || vec![Control { add: 15000, copy: 5000, seek: 0 }];

        let mut fast = Vec::new();
        let mut best = Vec::new();
        Packer::new(&old, &new)
            .transport(Transport::Bzip2)
            .compression_level(Compression::fast())
            .pack(ctrls(), &mut fast)
            .unwrap();
        Packer::new(&old, &new)
            .transport(Transport::Bzip2)
            .compression_level(Compression::best())
            .pack(ctrls(), &mut best)
            .unwrap();

        assert_eq!(&fast[..HEADER_SIZE], &best[..HEADER_SIZE]);
        assert_ne!(fast[HEADER_SIZE..], best[HEADER_SIZE..]);
        for p in [&fast, &best].iter() {
            let t = Bspatch::new(p).unwrap().transport(Transport::Bzip2).apply(&old).unwrap();
            assert_eq!(t, new);
        }
    }

    #[test]
    fn final_seek_is_not_checked() {
        let r = pack(b"ab", b"ab", vec![Control { add: 2, copy: 0, seek: i64::MAX }]);
        assert!(r.is_ok());
    }
}
