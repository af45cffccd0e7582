//! Per-session scratch directories.
//!
//! Each session gets its own directory under the configured temp root,
//! named from the sanitized client filename, the process id and a
//! process-wide counter:
//!
//! ```text
//! {temp_root}/docrelay_{base}_{pid}_{seq}/
//!     input.pdf      (input.zip for merge)
//!     output
//!     scratch/
//! ```
//!
//! The directory is removed when the [`SessionWorkspace`] is dropped.

use docrelay_protocol::Action;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

const MAX_EXTENSION_LEN: usize = 10;
const MAX_CREATE_ATTEMPTS: usize = 8;
const FALLBACK_BASE: &str = "file";

/// Keeps ASCII alphanumerics, `_` and `-`; everything else becomes `_`.
/// The result is cut to `max_len` characters and is never empty.
pub fn sanitize_base(stem: &str, max_len: usize) -> String {
    let safe: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();
    if safe.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        safe
    }
}

/// Splits a client-supplied filename into a stem and a lowercase extension,
/// ignoring any directory components.
fn split_filename(filename: &str) -> (&str, String) {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, ext.to_ascii_lowercase())
        }
        _ => (name, String::new()),
    }
}

/// Name the result is announced under.
pub fn suggested_name(action: Action, base: &str) -> String {
    match action {
        Action::PdfToJpg => format!("{}_images.zip", base),
        Action::PdfToWord => format!("{}.docx", base),
        Action::PdfToPptx => format!("{}.pptx", base),
        Action::Split => format!("{}_split_files.zip", base),
        Action::Merge => {
            let stem: String = format!("merged_{}", base).chars().take(50).collect();
            format!("{}.pdf", stem)
        }
        Action::Convert => format!("{}_processed.pdf", base),
        other => format!("{}_{}.pdf", base, other),
    }
}

/// A session's private directory.
#[derive(Debug)]
pub struct SessionWorkspace {
    root: PathBuf,
    input: PathBuf,
    base: String,
}

impl SessionWorkspace {
    /// Creates the directory tree for a request carrying `filename`.
    ///
    /// Merge inputs are stored as `input.zip`; everything else keeps the
    /// client's extension when it looks like one.
    pub fn create(
        temp_root: &Path,
        filename: &str,
        action: Action,
        max_base_len: usize,
    ) -> io::Result<Self> {
        let (stem, ext) = split_filename(filename);
        let base = sanitize_base(stem, max_base_len);
        let input_name = if action.takes_archive_input() {
            "input.zip".to_string()
        } else if ext.is_empty() {
            "input".to_string()
        } else {
            format!("input.{}", ext)
        };

        let root = Self::create_root(temp_root, &base)?;
        let workspace = Self {
            input: root.join(input_name),
            root,
            base,
        };
        std::fs::create_dir(workspace.scratch_dir())?;
        debug!(dir = %workspace.root.display(), "workspace created");
        Ok(workspace)
    }

    fn create_root(temp_root: &Path, base: &str) -> io::Result<PathBuf> {
        std::fs::create_dir_all(temp_root)?;
        let pid = std::process::id();
        let mut last_err = None;
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
            let root = temp_root.join(format!("docrelay_{}_{}_{}", base, pid, seq));
            match std::fs::create_dir(&root) {
                Ok(()) => return Ok(root),
                // Left behind by an earlier process with the same pid.
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| io::ErrorKind::AlreadyExists.into()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the received payload is written.
    pub fn input_path(&self) -> &Path {
        &self.input
    }

    /// Where single-file results are written.
    pub fn output_path(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Where the packed archive of a multi-file result is written.
    pub fn archive_path(&self) -> PathBuf {
        self.root.join("output.zip")
    }

    /// Per-action intermediates: extracted merge inputs, split parts,
    /// rendered images.
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("scratch")
    }

    /// Sanitized base name of the client's file.
    pub fn base_name(&self) -> &str {
        &self.base
    }

    pub fn suggested_name(&self, action: Action) -> String {
        suggested_name(action, &self.base)
    }
}

impl Drop for SessionWorkspace {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => debug!(dir = %self.root.display(), "workspace removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.root.display(), error = %e, "failed to remove workspace"),
        }
    }
}
