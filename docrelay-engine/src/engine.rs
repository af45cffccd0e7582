//! The processing capability the server consumes.

use crate::error::ProcessingError;
use docrelay_protocol::{Action, OptionSet};
use std::path::{Path, PathBuf};

/// One transformation request, fully received and validated.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub action: Action,
    /// Input documents. Merge inputs arrive already sorted by name.
    pub inputs: Vec<PathBuf>,
    pub options: OptionSet,
    /// Where single-file results must be written.
    pub output: PathBuf,
    /// Private scratch directory; multi-file results are written here.
    pub work_dir: PathBuf,
    /// Sanitized base name of the client's file, for naming parts.
    pub base_name: String,
}

impl ProcessRequest {
    /// The first input, which is the only one for every action but merge.
    pub fn primary_input(&self) -> Result<&Path, ProcessingError> {
        self.inputs
            .first()
            .map(PathBuf::as_path)
            .ok_or(ProcessingError::NoInputs)
    }
}

/// What a successful engine call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutput {
    /// A single file at the requested output path.
    File(PathBuf),
    /// Several files that the server packs into one archive.
    Files(Vec<PathBuf>),
}

impl ProcessOutput {
    /// Checks that every produced file actually exists.
    pub fn verify(&self) -> Result<(), ProcessingError> {
        let paths: &[PathBuf] = match self {
            ProcessOutput::File(path) => std::slice::from_ref(path),
            ProcessOutput::Files(paths) if paths.is_empty() => {
                return Err(ProcessingError::Failed("no output files were created".into()))
            }
            ProcessOutput::Files(paths) => paths,
        };

        match paths.iter().find(|p| !p.is_file()) {
            Some(missing) => Err(ProcessingError::MissingOutput(missing.clone())),
            None => Ok(()),
        }
    }
}

/// Performs document transformations.
///
/// Calls are blocking; the server runs them off the async runtime and
/// bounds them with its operation timeout.
pub trait ProcessingEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn supports(&self, action: Action) -> bool;

    fn process(&self, request: &ProcessRequest) -> Result<ProcessOutput, ProcessingError>;
}

impl<E: ProcessingEngine + ?Sized> ProcessingEngine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn supports(&self, action: Action) -> bool {
        (**self).supports(action)
    }

    fn process(&self, request: &ProcessRequest) -> Result<ProcessOutput, ProcessingError> {
        (**self).process(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_single() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");

        let err = ProcessOutput::File(out.clone()).verify().unwrap_err();
        assert!(matches!(err, ProcessingError::MissingOutput(ref p) if *p == out));

        std::fs::write(&out, b"%PDF").unwrap();
        ProcessOutput::File(out).verify().unwrap();
    }

    #[test]
    fn test_verify_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, b"a").unwrap();

        assert!(ProcessOutput::Files(vec![]).verify().is_err());
        assert!(matches!(
            ProcessOutput::Files(vec![a.clone(), b.clone()]).verify(),
            Err(ProcessingError::MissingOutput(_))
        ));
        std::fs::write(&b, b"b").unwrap();
        ProcessOutput::Files(vec![a, b]).verify().unwrap();
    }

    #[test]
    fn test_primary_input() {
        let mut request = ProcessRequest {
            action: Action::Compress,
            inputs: vec![],
            options: OptionSet::Empty,
            output: PathBuf::from("out"),
            work_dir: PathBuf::from("scratch"),
            base_name: "doc".into(),
        };
        assert!(matches!(
            request.primary_input(),
            Err(ProcessingError::NoInputs)
        ));
        request.inputs.push(PathBuf::from("in.pdf"));
        assert_eq!(request.primary_input().unwrap(), Path::new("in.pdf"));
    }
}
