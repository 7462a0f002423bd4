/*!
Bounds-checked patcher for `ENDSLEY/BSDIFF43` binary delta files.

A patch is a 24-byte header (magic and target size) followed by a stream of
`(add, copy, seek)` instructions, each trailed by its delta and extra bytes.
The stream is stored raw or as one bzip2 stream; the caller picks which via
[`Transport`].
*/

pub mod bspatch;
pub mod error;
pub mod file;
pub mod header;
pub mod int;
pub mod pack;
pub mod stream;

pub use bspatch::Bspatch;
pub use error::{Error, Result};
pub use file::{apply_patch, patch_file, patch_files, Job, Options};
pub use header::{Header, MAGIC};
pub use pack::{Compression, Packer};
pub use stream::{ControlSource, Transport};

/// Single bsdiff control instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Control {
    /// Bytes added onto old data.
    pub add: u64,
    /// Bytes copied verbatim.
    pub copy: u64,
    /// Old cursor move after the instruction.
    pub seek: i64,
}
