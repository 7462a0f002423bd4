//! Patching files on disk.
//!
//! The whole old file and the whole target are held in memory. The target
//! is only touched once the patch applied cleanly, and a regular target is
//! replaced in one rename, so a failed patch never leaves a half-written
//! target behind.
use super::bspatch::{alloc_target, apply};
use super::error::{Error, Result};
use super::header::{Header, HEADER_SIZE};
use super::stream::Transport;
use log::{debug, warn};
use rayon::prelude::*;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// File patching options.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Options {
    /// How the payload after the header is stored.
    pub transport: Transport,
}

impl Options {
    /// Default options: raw payload.
    pub fn new() -> Self {
        Options::default()
    }

    /// Set the payload transport (default is `Transport::Raw`).
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }
}

/// One independent old/patch/target triple for [`patch_files`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Job {
    /// File the patch was made against.
    pub old: PathBuf,
    /// Target to create or replace.
    pub new: PathBuf,
    /// The patch itself.
    pub patch: PathBuf,
}

/// Apply the patch at `patch_path` to `old_path` and write `new_path`.
///
/// An existing target is overwritten. Returns the size of the target.
pub fn patch_file<O, N, P>(old_path: O, new_path: N, patch_path: P, opts: &Options) -> Result<u64>
where
    O: AsRef<Path>,
    N: AsRef<Path>,
    P: AsRef<Path>,
{
    let (old_path, new_path, patch_path) = (old_path.as_ref(), new_path.as_ref(), patch_path.as_ref());

    let mut patch = File::open(patch_path).map_err(|e| Error::io(patch_path, e))?;
    let header = read_header(&mut patch, patch_path)?;
    let patch_len = patch.metadata().map_err(|e| Error::io(patch_path, e))?.len();
    header.check_payload(opts.transport, patch_len.saturating_sub(HEADER_SIZE as u64))?;
    debug!(
        "{}: target size {}, {:?} payload",
        patch_path.display(),
        header.new_size,
        opts.transport
    );

    let old = read_old(old_path)?;
    let mut new = alloc_target(header.new_size)?;

    patch
        .seek(SeekFrom::Start(HEADER_SIZE as u64))
        .map_err(|e| Error::io(patch_path, e))?;
    let mut source = opts.transport.open(BufReader::new(patch));
    apply(&old, &mut new, header.target_len(), &mut source)?;
    drop(source);

    write_target(new_path, &new)?;
    debug!("{}: wrote {} bytes", new_path.display(), new.len());
    Ok(new.len() as u64)
}

/// Patch with default options and report the outcome as a status code.
///
/// Returns `0` on success, or [`Error::status`] of the failure.
pub fn apply_patch<O, N, P>(old_path: O, new_path: N, patch_path: P) -> i32
where
    O: AsRef<Path>,
    N: AsRef<Path>,
    P: AsRef<Path>,
{
    match patch_file(old_path, new_path, patch_path, &Options::default()) {
        Ok(_) => 0,
        Err(e) => {
            warn!("bspatch: {}", e);
            e.status()
        }
    }
}

/// Apply independent patches in parallel, one job per triple.
///
/// Results are in the order of `jobs`. Jobs must not share a target path.
pub fn patch_files(jobs: &[Job], opts: &Options) -> Vec<Result<u64>> {
    jobs.par_iter()
        .map(|job| patch_file(&job.old, &job.new, &job.patch, opts))
        .collect()
}

/// Read and validate the header, telling a truncated patch apart from a
/// failing read.
fn read_header(patch: &mut File, path: &Path) -> Result<Header> {
    let mut raw = [0; HEADER_SIZE];
    match patch.read_exact(&mut raw) {
        Ok(()) => Header::from_bytes(&raw),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::Truncated),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Load the whole old file.
fn read_old(path: &Path) -> Result<Vec<u8>> {
    let with_path = |e| Error::io(path, e);

    let mut file = File::open(path).map_err(with_path)?;
    let size = file.seek(SeekFrom::End(0)).map_err(with_path)?;
    file.seek(SeekFrom::Start(0)).map_err(with_path)?;

    let len = usize::try_from(size)
        .map_err(|_| with_path(io::Error::new(io::ErrorKind::Other, "file too large")))?;
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|source| Error::Allocation { size, source })?;
    file.take(size).read_to_end(&mut data).map_err(with_path)?;
    if data.len() != len {
        return Err(with_path(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "file shrank while reading",
        )));
    }
    Ok(data)
}

/// Write all of `data` to the target.
///
/// A regular or missing target is replaced by renaming a fully written
/// temporary file from the same directory over it; a symlink to a regular
/// file is followed and its destination replaced. Anything else, such as a
/// device node, is written in place and never removed.
fn write_target(path: &Path, data: &[u8]) -> Result<()> {
    let with_path = |e| Error::io(path, e);

    match fs::metadata(path) {
        Ok(meta) if !meta.is_file() => {
            debug!("{}: not a regular file, writing in place", path.display());
            let mut file = OpenOptions::new().write(true).open(path).map_err(with_path)?;
            file.write_all(data).and_then(|_| file.flush()).map_err(with_path)
        }
        Ok(meta) => {
            let real = fs::canonicalize(path).map_err(with_path)?;
            replace_file(&real, data, Some(meta.permissions())).map_err(with_path)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            replace_file(path, data, None).map_err(with_path)
        }
        Err(e) => Err(with_path(e)),
    }
}

/// Write `data` to a temporary file next to `path`, then rename it over
/// `path`. The temporary file is deleted if any step fails.
fn replace_file(path: &Path, data: &[u8], perm: Option<fs::Permissions>) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = temp_builder().tempfile_in(dir)?;
    if let Some(perm) = perm {
        fs::set_permissions(temp.path(), perm)?;
    }
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| {
        warn!("{}: cannot rename into place: {}", path.display(), e.error);
        e.error
    })?;
    Ok(())
}

fn temp_builder() -> tempfile::Builder<'static, 'static> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".bspatch43-");
    // 0666 & !umask, as File::create would give.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder
}
