#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use yolo_ingest::publish::{MemoryObjectStore, UrlSigner};
use zip::write::SimpleFileOptions;

pub const BUCKET: &str = "media";
pub const SIGNING_KEY: &str = "test-signing-key";

/// Minimal PNG: signature plus an IHDR chunk, enough for header sniffing.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(33);
    bytes.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 2, 0, 0, 0]);
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes
}

pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, contents).expect("write file");
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    write_file(path, png_bytes(width, height));
}

/// Builds a zip archive in memory from `(name, bytes)` entries.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A small dataset in the `images/` + `labels/` layout.
///
/// Two images: `a.png` (64x48, two boxes) and `b.jpg` (not a real JPEG,
/// one box with a class id past the manifest).
pub fn sample_archive() -> Vec<u8> {
    let png = png_bytes(64, 48);
    zip_bytes(&[
        ("classes.txt", b"person\ncar\n"),
        ("images/train/a.png", &png),
        ("images/train/b.jpg", b"not really a jpeg"),
        (
            "labels/train/a.txt",
            b"0 0.5 0.5 0.25 0.25\n1 0.1 0.2 0.05 0.05\n",
        ),
        ("labels/train/b.txt", b"5 0.5 0.5 0.1 0.1\n"),
    ])
}

pub fn signer() -> UrlSigner {
    UrlSigner::new("http://localhost:9000", SIGNING_KEY).expect("create signer")
}

pub fn memory_store() -> MemoryObjectStore {
    MemoryObjectStore::new(BUCKET, signer())
}

/// Number of entries directly under `dir` (0 if it does not exist).
pub fn entry_count(dir: &Path) -> usize {
    match fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
