//! The 24-byte patch header.
//!
//! ```text
//! offset  size  meaning
//!      0    16  magic "ENDSLEY/BSDIFF43"
//!     16     8  target size, sign-magnitude
//!     24     -  control/diff/extra stream (raw or bzip2)
//! ```
use super::error::{Error, Result};
use super::int::{decode_int, encode_int, INT_SIZE};
use super::stream::Transport;

/// Patch file magic.
pub const MAGIC: &[u8; 16] = b"ENDSLEY/BSDIFF43";

/// Size of the header, which is also where the payload stream starts.
pub const HEADER_SIZE: usize = MAGIC.len() + INT_SIZE;

/// Parsed patch header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Exact length of the reconstructed target.
    pub new_size: u64,
}

impl Header {
    /// Parse the header at the start of `patch`.
    ///
    /// Anything shorter than `HEADER_SIZE` is a truncated patch.
    pub fn parse(patch: &[u8]) -> Result<Self> {
        let raw: &[u8; HEADER_SIZE] = patch
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(Error::Truncated)?;
        Header::from_bytes(raw)
    }

    /// Validate magic and decode the target size.
    pub fn from_bytes(raw: &[u8; HEADER_SIZE]) -> Result<Self> {
        if &raw[..MAGIC.len()] != MAGIC {
            return Err(Error::BadMagic);
        }

        let mut size = [0; INT_SIZE];
        size.copy_from_slice(&raw[MAGIC.len()..]);
        let new_size = decode_int(&size);
        if new_size < 0 || usize::try_from(new_size).is_err() {
            return Err(Error::InvalidSize(new_size));
        }

        Ok(Header {
            new_size: new_size as u64,
        })
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE]> {
        let size = i64::try_from(self.new_size)
            .map_err(|_| Error::Overflow(format!("target size {}", self.new_size)))?;
        let mut raw = [0; HEADER_SIZE];
        raw[..MAGIC.len()].copy_from_slice(MAGIC);
        raw[MAGIC.len()..].copy_from_slice(&encode_int(size)?);
        Ok(raw)
    }

    /// Target size as a buffer length.
    pub fn target_len(&self) -> usize {
        // Checked against usize::MAX when parsed.
        self.new_size as usize
    }

    /// Reject a target that the payload cannot possibly describe.
    ///
    /// Every target byte travels through a raw payload once, as delta or
    /// extra, so a raw payload shorter than the target is corrupt. A
    /// compressed payload can expand arbitrarily and is not checked.
    pub fn check_payload(&self, transport: Transport, payload_len: u64) -> Result<()> {
        if transport == Transport::Raw && self.new_size > payload_len {
            return Err(Error::InvalidSize(self.new_size as i64));
        }
        Ok(())
    }
}
