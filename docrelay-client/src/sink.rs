//! Where results are saved.

use std::path::{Path, PathBuf};

const FALLBACK_NAME: &str = "result.bin";

/// Decides where a result is written, once its name and size are known.
///
/// Returning `None` declines the result; the request then ends as
/// cancelled.
pub trait ResultSink: Send {
    fn destination(&mut self, suggested_name: &str, size: u64) -> Option<PathBuf>;
}

impl<F> ResultSink for F
where
    F: FnMut(&str, u64) -> Option<PathBuf> + Send,
{
    fn destination(&mut self, suggested_name: &str, size: u64) -> Option<PathBuf> {
        self(suggested_name, size)
    }
}

/// Saves to one fixed path, whatever the server suggests.
#[derive(Debug, Clone)]
pub struct SaveAs(pub PathBuf);

impl ResultSink for SaveAs {
    fn destination(&mut self, _suggested_name: &str, _size: u64) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// Saves into a directory under the server's suggested name.
#[derive(Debug, Clone)]
pub struct SaveInDir(pub PathBuf);

impl ResultSink for SaveInDir {
    fn destination(&mut self, suggested_name: &str, _size: u64) -> Option<PathBuf> {
        Some(self.0.join(local_file_name(suggested_name)))
    }
}

/// Declines every result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decline;

impl ResultSink for Decline {
    fn destination(&mut self, _suggested_name: &str, _size: u64) -> Option<PathBuf> {
        None
    }
}

/// Reduces a server-suggested name to a bare file name.
pub fn local_file_name(suggested: &str) -> String {
    let name = suggested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        FALLBACK_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Temporary path a result is received into before it is renamed.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_file_name() {
        assert_eq!(local_file_name("doc_compress.pdf"), "doc_compress.pdf");
        assert_eq!(local_file_name("../../etc/passwd"), "passwd");
        assert_eq!(local_file_name("C:\\temp\\x.zip"), "x.zip");
        assert_eq!(local_file_name(".."), "result.bin");
        assert_eq!(local_file_name("dir/"), "result.bin");
    }

    #[test]
    fn test_sinks() {
        let mut sink = SaveInDir(PathBuf::from("/out"));
        assert_eq!(
            sink.destination("a/b.pdf", 1),
            Some(PathBuf::from("/out/b.pdf"))
        );
        assert_eq!(Decline.destination("b.pdf", 1), None);
        assert_eq!(
            SaveAs(PathBuf::from("/x.pdf")).destination("b.pdf", 1),
            Some(PathBuf::from("/x.pdf"))
        );

        let mut asked = Vec::new();
        let mut closure = |name: &str, size: u64| -> Option<PathBuf> {
            asked.push((name.to_string(), size));
            None
        };
        assert_eq!(closure.destination("c.zip", 9), None);
        assert_eq!(asked, vec![("c.zip".to_string(), 9)]);
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/out/result.pdf")),
            PathBuf::from("/out/result.pdf.part")
        );
    }
}
