//! Multi-file payloads.
//!
//! Several files travel as one deflated ZIP archive: merge inputs on the way
//! up, split parts and rendered pages on the way down. Entries are always
//! stored flat, under their base names.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid archive: {0}")]
    Zip(#[from] ZipError),

    #[error("{0} has no usable file name")]
    Unnamed(PathBuf),
}

/// Packs `files` into a deflated archive at `dest`.
///
/// Later files whose base name was already packed are skipped. Returns the
/// names actually written, in order.
pub fn pack<P: AsRef<Path>>(files: &[P], dest: &Path) -> Result<Vec<String>, ArchiveError> {
    let mut writer = ZipWriter::new(File::create(dest)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut written = Vec::with_capacity(files.len());
    let mut seen = HashSet::new();

    for path in files {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ArchiveError::Unnamed(path.to_path_buf()))?
            .to_string();
        if !seen.insert(name.clone()) {
            warn!(file = %path.display(), "duplicate entry name, skipping");
            continue;
        }

        writer.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut writer)?;
        debug!(entry = %name, "packed");
        written.push(name);
    }

    writer.finish()?;
    Ok(written)
}

/// Extracts the PDF entries of `archive` into `dest_dir`, sorted by name.
///
/// Directories, non-PDF entries and names with `..` segments are skipped,
/// as is any entry that fails to extract. The caller decides whether the
/// remaining count is enough.
pub fn extract_pdfs_sorted(archive: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let mut extracted: Vec<(String, PathBuf)> = Vec::new();

    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(index, error = %e, "unreadable archive entry, skipping");
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let raw = entry.name().to_string();
        let Some(name) = flat_entry_name(&raw) else {
            warn!(entry = %raw, "unsafe entry name, skipping");
            continue;
        };
        if !name.to_ascii_lowercase().ends_with(".pdf") {
            debug!(entry = %raw, "not a PDF, skipping");
            continue;
        }
        if extracted.iter().any(|(existing, _)| *existing == name) {
            warn!(entry = %raw, "duplicate base name, skipping");
            continue;
        }

        let target = dest_dir.join(&name);
        let copied = File::create(&target).and_then(|mut out| io::copy(&mut entry, &mut out));
        match copied {
            Ok(bytes) => {
                debug!(entry = %name, bytes, "extracted");
                extracted.push((name, target));
            }
            Err(e) => {
                warn!(entry = %raw, error = %e, "failed to extract entry, skipping");
                let _ = std::fs::remove_file(&target);
            }
        }
    }

    extracted.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(extracted.into_iter().map(|(_, path)| path).collect())
}

/// Base name of an archive entry, or `None` if the entry tries to leave its
/// directory or has no name at all.
fn flat_entry_name(raw: &str) -> Option<String> {
    let segments: Vec<&str> = raw.split(['/', '\\']).collect();
    if segments.iter().any(|s| *s == "..") {
        return None;
    }
    segments
        .last()
        .filter(|s| !s.is_empty() && **s != ".")
        .map(|s| s.to_string())
}
