//! High-level client API.

use crate::connection::{connect, ConnectionConfig};
use crate::error::ClientError;
use crate::session::{Delivery, Initiator, Upload};
use crate::sink::ResultSink;
use docrelay_protocol::archive;
use docrelay_protocol::{Action, OptionSet, ValidationError};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// One transformation to request.
#[derive(Debug, Clone)]
pub struct Request {
    pub action: Action,
    pub inputs: Vec<PathBuf>,
    pub options: OptionSet,
}

impl Request {
    /// A single-input request without options.
    pub fn new(action: Action, input: impl Into<PathBuf>) -> Self {
        Self {
            action,
            inputs: vec![input.into()],
            options: OptionSet::Empty,
        }
    }

    /// Merges `inputs`, in whatever order the server sorts them into.
    pub fn merge<I, P>(inputs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            action: Action::Merge,
            inputs: inputs.into_iter().map(Into::into).collect(),
            options: OptionSet::Empty,
        }
    }

    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }
}

/// A payload ready to stream. Holds the temporary merge archive alive.
#[derive(Debug)]
struct Staged {
    upload: Upload,
    _archive: Option<NamedTempFile>,
}

/// Stages `request` for sending. Everything checkable locally is checked
/// here, before any connection is made.
fn stage(request: &Request) -> Result<Staged, ClientError> {
    let fields = request.options.to_fields(request.action)?;

    if request.action.takes_archive_input() {
        let present: Vec<&PathBuf> = request
            .inputs
            .iter()
            .filter(|path| {
                let ok = path.is_file();
                if !ok {
                    warn!(path = %path.display(), "merge input not found, skipping");
                }
                ok
            })
            .collect();
        if present.len() < 2 {
            return Err(ValidationError::TooFewMergeInputs(present.len()).into());
        }

        let archive_file = tempfile::Builder::new()
            .prefix("docrelay_merge_")
            .suffix(".zip")
            .tempfile()?;
        let packed = archive::pack(&present, archive_file.path()).map_err(|e| {
            ClientError::Io(std::io::Error::other(e.to_string()))
        })?;
        if packed.len() < 2 {
            return Err(ValidationError::TooFewMergeInputs(packed.len()).into());
        }

        let size = std::fs::metadata(archive_file.path())?.len();
        info!(files = packed.len(), size, "packed merge inputs");
        return Ok(Staged {
            upload: Upload {
                action: request.action,
                filename: format!("merge_input_{}files.zip", packed.len()),
                path: archive_file.path().to_path_buf(),
                size,
                fields,
            },
            _archive: Some(archive_file),
        });
    }

    let input = request
        .inputs
        .first()
        .ok_or_else(|| ValidationError::MissingInput("no input file given".into()))?;
    let metadata = std::fs::metadata(input)
        .ok()
        .filter(|m| m.is_file())
        .ok_or_else(|| ValidationError::MissingInput(input.display().to_string()))?;
    let filename = file_name(input)
        .ok_or_else(|| ValidationError::MissingInput(input.display().to_string()))?;

    Ok(Staged {
        upload: Upload {
            action: request.action,
            filename,
            path: input.clone(),
            size: metadata.len(),
            fields,
        },
        _archive: None,
    })
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

/// High-level client for docrelay. Each request uses its own connection.
#[derive(Debug, Clone)]
pub struct Client {
    config: ConnectionConfig,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Sends `request` and hands the result to `sink`.
    pub async fn submit<K>(&self, request: &Request, sink: &mut K) -> Result<Delivery, ClientError>
    where
        K: ResultSink + ?Sized,
    {
        let staged = stage(request)?;
        let wire = connect(&self.config).await?;
        info!(
            action = %request.action,
            file = %staged.upload.filename,
            size = staged.upload.size,
            "submitting to {}",
            self.config.addr
        );
        Initiator::new(wire).run(&staged.upload, sink).await
    }
}
