//! Merge inputs
//!
//! A [`Source`] is a label plus a deferred way of opening its stream. Ordered
//! merges open every source up front; unordered merges open each one inside
//! the worker that drains it, so a source that fails to open only affects
//! itself.

use std::fmt;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use crate::decompression::open_source_path;

type Opener = Box<dyn FnOnce() -> io::Result<Box<dyn BufRead + Send>> + Send>;

pub struct Source {
    label: String,
    path: Option<PathBuf>,
    opener: Opener,
}

impl Source {
    /// A source backed by a file; the label is the file name
    pub fn from_path(path: impl AsRef<Path>, compressed: bool) -> Self {
        let path = path.as_ref().to_path_buf();
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let open_path = path.clone();

        Self {
            label,
            path: Some(path),
            opener: Box::new(move || open_source_path(&open_path, compressed)),
        }
    }

    /// A source backed by an already-open reader
    pub fn from_reader<R: BufRead + Send + 'static>(label: impl Into<String>, reader: R) -> Self {
        Self {
            label: label.into(),
            path: None,
            opener: Box::new(move || Ok(Box::new(reader) as Box<dyn BufRead + Send>)),
        }
    }

    /// A source whose stream is produced by `open` when the merge needs it
    pub fn from_fn<F>(label: impl Into<String>, open: F) -> Self
    where
        F: FnOnce() -> io::Result<Box<dyn BufRead + Send>> + Send + 'static,
    {
        Self {
            label: label.into(),
            path: None,
            opener: Box::new(open),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Open the stream, consuming the source
    pub fn open(self) -> (String, io::Result<Box<dyn BufRead + Send>>) {
        let stream = (self.opener)();
        (self.label, stream)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("label", &self.label)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
