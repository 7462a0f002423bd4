#![allow(unused)]

use bspatch43::header::HEADER_SIZE;
use bspatch43::int::encode_int;
use bspatch43::{Bspatch, Compression, Control, Header, Packer, Transport};
use bzip2::write::BzEncoder;
use chrono::Utc;
use rand::random;
use std::fs;
use std::io::{self, Write};
use std::path;

/// Pack a patch from explicit instructions.
pub fn pack(s: &[u8], t: &[u8], ctrls: &[Control], transport: Transport) -> Vec<u8> {
    let mut p = Vec::new();
    Packer::new(s, t)
        .transport(transport)
        .pack(ctrls.iter().copied(), io::Cursor::new(&mut p))
        .unwrap();
    p
}

/// Apply a patch held in memory.
pub fn bspatch(s: &[u8], p: &[u8], transport: Transport) -> bspatch43::Result<Vec<u8>> {
    Bspatch::new(p)?.transport(transport).apply(s)
}

/// Hand-assemble a raw patch, bypassing every check of the packer.
pub fn raw_patch(new_size: u64, parts: &[(i64, i64, i64, &[u8])]) -> Vec<u8> {
    let mut p = Header { new_size }.to_bytes().unwrap().to_vec();
    for &(add, copy, seek, data) in parts {
        p.extend_from_slice(&encode_int(add).unwrap());
        p.extend_from_slice(&encode_int(copy).unwrap());
        p.extend_from_slice(&encode_int(seek).unwrap());
        p.extend_from_slice(data);
    }
    p
}

/// Compress the payload of a hand-assembled patch, header left as is.
pub fn compress_payload(p: &[u8]) -> Vec<u8> {
    let mut bz = BzEncoder::new(p[..HEADER_SIZE].to_vec(), Compression::default());
    bz.write_all(&p[HEADER_SIZE..]).unwrap();
    bz.finish().unwrap()
}

/// Split the target into instructions driven by `cuts`, always covering
/// the whole target.
pub fn plan(t_len: usize, cuts: &[(u8, u8, i8)]) -> Vec<Control> {
    let mut ctrls = Vec::new();
    let mut rest = t_len as u64;
    for &(a, c, k) in cuts {
        let add = Ord::min(rest, a as u64);
        let copy = Ord::min(rest - add, c as u64);
        rest -= add + copy;
        ctrls.push(Control { add, copy, seek: k as i64 });
    }
    if rest > 0 {
        ctrls.push(Control { add: rest, copy: 0, seek: 0 });
    }
    ctrls
}

/// Distort `s` so that about `similar` of it survives.
pub fn distort(s: &[u8], similar: f64) -> Vec<u8> {
    s.iter()
        .map(|&b| if random::<f64>() < similar { b } else { random() })
        .collect()
}

pub fn random_bytes(n: usize) -> Vec<u8> {
    (0..n).map(|_| random()).collect()
}

pub fn create_temp<B: AsRef<[u8]>>(bytes: B) -> io::Result<path::PathBuf> {
    let p = temp_path()?;
    fs::write(p.as_path(), bytes)?;
    Ok(p)
}

/// Fresh path in the test directory, not created.
pub fn temp_path() -> io::Result<path::PathBuf> {
    let dir = std::env::temp_dir().join("bspatch43-test");
    fs::create_dir_all(dir.as_path())?;

    let id = format!("{}-{:x}", Utc::now().format("%s.%f"), random::<u32>());
    Ok(dir.join(id))
}

pub fn exists_file<P: AsRef<path::Path>>(name: P) -> bool {
    if let Ok(meta) = fs::metadata(name) {
        meta.is_file()
    } else {
        false
    }
}
