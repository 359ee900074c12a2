use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by a merge run
#[derive(Debug, Error)]
pub enum MergeError {
    /// The job was rejected before any work started
    #[error("invalid merge configuration: {0}")]
    Configuration(String),

    /// A source could not be opened, decompressed or read
    #[error("cannot read source '{label}': {cause}")]
    SourceAccess {
        label: String,
        #[source]
        cause: io::Error,
    },

    /// A time or filter strategy returned `Action::Stop`
    #[error("source '{label}' aborted: {cause}")]
    HandlerAbort { label: String, cause: anyhow::Error },

    /// The destination could not be created, written or flushed
    #[error("cannot write destination '{target}': {cause}")]
    Destination {
        target: String,
        #[source]
        cause: io::Error,
    },

    /// A source could not be removed after a successful merge
    #[error("merged, but cannot delete source '{}': {cause}", .path.display())]
    SourceRemoval {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    /// The run was cancelled before every source was drained
    #[error("merge cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, MergeError>;

impl MergeError {
    pub(crate) fn source_access(label: &str, cause: io::Error) -> Self {
        MergeError::SourceAccess {
            label: label.to_string(),
            cause,
        }
    }

    pub(crate) fn abort(label: &str, cause: anyhow::Error) -> Self {
        MergeError::HandlerAbort {
            label: label.to_string(),
            cause,
        }
    }

    pub(crate) fn destination(target: &str, cause: io::Error) -> Self {
        MergeError::Destination {
            target: target.to_string(),
            cause,
        }
    }

    /// The caller-supplied cause when a strategy stopped the run
    pub fn abort_cause(&self) -> Option<&anyhow::Error> {
        match self {
            MergeError::HandlerAbort { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Label of the source the error is attributed to, if any
    pub fn source_label(&self) -> Option<&str> {
        match self {
            MergeError::SourceAccess { label, .. } | MergeError::HandlerAbort { label, .. } => {
                Some(label)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_abort_keeps_caller_cause() {
        let err = MergeError::abort("app.log", anyhow!("test for stop"));
        assert_eq!(err.abort_cause().unwrap().to_string(), "test for stop");
        assert_eq!(err.source_label(), Some("app.log"));
        assert!(err.to_string().contains("test for stop"));
    }

    #[test]
    fn test_source_label_only_for_source_errors() {
        let per_source = MergeError::source_access("a", io::Error::other("boom"));
        assert_eq!(per_source.source_label(), Some("a"));
        let dest = MergeError::destination("out.log", io::Error::other("disk full"));
        assert_eq!(dest.source_label(), None);
        assert!(dest.abort_cause().is_none());
    }
}
