//! EPUB container extraction and reassembly.
//!
//! An EPUB is a zip whose first entry must be an uncompressed `mimetype`.

use crate::error::ArchiveError;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Component, Path};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Name of the mandatory first entry.
pub const MIMETYPE: &str = "mimetype";

/// Extracts every entry of `epub` into `dest`, returning the number of files written.
pub fn extract(epub: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let file = File::open(epub)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    std::fs::create_dir_all(dest)?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::UnsafePath(entry.name().to_string()))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&target)?);
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    Ok(written)
}

/// Converts a path relative to the archive root into a `/`-separated entry name.
pub fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Zips `source_dir` into `output`, `mimetype` first and stored, everything
/// else deflated in sorted order. Top-level files named in `exclude` are left out.
///
/// Timestamps are fixed so identical trees produce identical archives.
pub fn pack(source_dir: &Path, output: &Path, exclude: &[&str]) -> Result<usize, ArchiveError> {
    let mimetype_path = source_dir.join(MIMETYPE);
    if !mimetype_path.is_file() {
        return Err(ArchiveError::MissingMimetype(source_dir.to_path_buf()));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(source_dir).unwrap_or(entry.path());
        let name = entry_name(relative);
        if name == MIMETYPE || exclude.contains(&name.as_str()) {
            continue;
        }
        entries.push((name, entry.into_path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(BufWriter::new(File::create(output)?));

    let stored = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default());
    let deflated = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    writer.start_file(MIMETYPE, stored)?;
    io::copy(&mut File::open(&mimetype_path)?, &mut writer)?;

    for (name, path) in &entries {
        writer.start_file(name.as_str(), deflated)?;
        io::copy(&mut File::open(path)?, &mut writer)?;
    }

    writer.finish()?;
    Ok(entries.len() + 1)
}
