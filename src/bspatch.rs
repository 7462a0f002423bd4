#![forbid(unsafe_code)]
use super::error::{Error, Result};
use super::header::{Header, HEADER_SIZE};
use super::int::{decode_int, INT_SIZE};
use super::stream::{ControlSource, Transport};
use log::{debug, trace};

/// Largest piece of a diff or extra string read in one go.
///
/// The target grows by at most this much ahead of the bytes actually
/// delivered by the control source.
pub const READ_CHUNK: usize = 64 * 1024;

/// Bounds-checked patcher for `ENDSLEY/BSDIFF43` patches.
///
/// Apply a raw patch held in memory:
/// ```
/// use bspatch43::{Bspatch, Result};
///
/// fn bspatch(old: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
///     Bspatch::new(patch)?.apply(old)
/// }
/// ```
///
/// Apply a patch whose payload was bzip2-compressed:
/// ```
/// use bspatch43::{Bspatch, Result, Transport};
///
/// fn bspatch(old: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
///     Bspatch::new(patch)?.transport(Transport::Bzip2).apply(old)
/// }
/// ```
pub struct Bspatch<'p> {
    header: Header,
    payload: &'p [u8],
    transport: Transport,
}

impl<'p> Bspatch<'p> {
    /// Parse the patch header and create new patcher configuration.
    ///
    /// Return error if the header is truncated, has the wrong magic, or
    /// declares a negative target size.
    pub fn new(patch: &'p [u8]) -> Result<Self> {
        let header = Header::parse(patch)?;
        Ok(Bspatch {
            header,
            payload: &patch[HEADER_SIZE..],
            transport: Transport::default(),
        })
    }

    /// Set how the payload after the header is stored (default is `Transport::Raw`).
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Hint the final target size, as provided in the patch header.
    pub fn hint_target_size(&self) -> u64 {
        self.header.new_size
    }

    /// Apply patch to the old data and return the complete target.
    pub fn apply(&self, old: &[u8]) -> Result<Vec<u8>> {
        self.header
            .check_payload(self.transport, self.payload.len() as u64)?;
        let mut new = alloc_target(self.header.new_size)?;
        let mut source = self.transport.open(self.payload);
        apply(old, &mut new, self.header.target_len(), &mut source)?;
        Ok(new)
    }
}

/// Reserve room for a target of exactly `size` bytes.
///
/// The buffer is returned empty; nothing is written to it until the
/// engine has the bytes in hand.
pub fn alloc_target(size: u64) -> Result<Vec<u8>> {
    let len = usize::try_from(size).map_err(|_| Error::InvalidSize(size as i64))?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|source| Error::Allocation { size, source })?;
    Ok(buf)
}

/// Reconstruct the `size` bytes of the target into `new` from `old` and
/// the control stream.
///
/// `new` is cleared first. Each instruction reads `add` delta bytes onto
/// the end of `new`, adds whatever old bytes overlap the old cursor, then
/// reads `copy` literal bytes and moves the old cursor by `seek`. The loop
/// ends exactly when `new` holds `size` bytes.
///
/// On error the contents of `new` are unspecified.
pub fn apply<S>(old: &[u8], new: &mut Vec<u8>, size: usize, source: &mut S) -> Result<()>
where
    S: ControlSource + ?Sized,
{
    let mut oldpos: i64 = 0;
    let mut ctl = [0; 3 * INT_SIZE];
    new.clear();

    debug!("applying patch: {} -> {} bytes", old.len(), size);
    while new.len() < size {
        let newpos = new.len();
        source.read_all(&mut ctl)?;
        let (add, copy, seek) = decode_control(&ctl);
        trace!("control add={} copy={} seek={} at {}", add, copy, seek, newpos);

        let bounds = move || Error::Bounds {
            add,
            copy,
            pos: newpos as u64,
            size: size as u64,
        };

        // Diff string.
        let add_len = checked_len(add, size - newpos).ok_or_else(bounds)?;
        read_into(source, new, add_len)?;
        add_old(&mut new[newpos..], old, oldpos);

        // Extra string.
        let copy_len = checked_len(copy, size - new.len()).ok_or_else(bounds)?;
        read_into(source, new, copy_len)?;

        // The old cursor is dead once the target is full.
        if new.len() == size {
            break;
        }
        oldpos = oldpos
            .checked_add(add)
            .and_then(|p| p.checked_add(seek))
            .ok_or_else(bounds)?;
    }

    Ok(())
}

/// Append exactly `n` bytes from `source` to `buf`, growing it one chunk
/// at a time.
fn read_into<S>(source: &mut S, buf: &mut Vec<u8>, mut n: usize) -> Result<()>
where
    S: ControlSource + ?Sized,
{
    while n > 0 {
        let k = Ord::min(n, READ_CHUNK);
        let start = buf.len();
        buf.resize(start + k, 0);
        source.read_all(&mut buf[start..])?;
        n -= k;
    }
    Ok(())
}

#[inline]
fn decode_control(ctl: &[u8; 3 * INT_SIZE]) -> (i64, i64, i64) {
    let mut b = [0; INT_SIZE];
    let mut next = |i: usize| {
        b.copy_from_slice(&ctl[i * INT_SIZE..(i + 1) * INT_SIZE]);
        decode_int(&b)
    };
    (next(0), next(1), next(2))
}

/// Length `n` if it is non-negative and fits in `remain`.
#[inline]
fn checked_len(n: i64, remain: usize) -> Option<usize> {
    usize::try_from(n).ok().filter(|&n| n <= remain)
}

/// Add the old bytes at `oldpos..` onto `delta`, skipping positions that
/// fall outside `old`.
#[inline]
fn add_old(delta: &mut [u8], old: &[u8], oldpos: i64) {
    let lo = oldpos.max(0);
    let hi = oldpos
        .saturating_add(delta.len() as i64)
        .min(old.len() as i64);
    if lo >= hi {
        return;
    }

    let dst = &mut delta[(lo - oldpos) as usize..(hi - oldpos) as usize];
    let src = &old[lo as usize..hi as usize];
    for (n, o) in dst.iter_mut().zip(src) {
        *n = n.wrapping_add(*o);
    }
}
