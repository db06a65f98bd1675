use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

/// Every failure a storage operation can report.
///
/// The `Display` text is the human-readable reason that the network layer
/// sends back as `ERROR: <reason>`.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("invalid file name `{0}`")]
    InvalidName(String),

    #[error("file {0} already exists")]
    DuplicateName(String),

    #[error("maximum file limit reached")]
    DirectoryFull,

    #[error("file {0} does not exist")]
    NotFound(String),

    #[error("not enough free blocks: need {required}, {available} available")]
    InsufficientSpace { required: usize, available: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Short machine-friendly name of the error kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "invalid_name",
            Self::DuplicateName(_) => "duplicate_name",
            Self::DirectoryFull => "directory_full",
            Self::NotFound(_) => "not_found",
            Self::InsufficientSpace { .. } => "insufficient_space",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::CorruptMetadata(_) => "corrupt_metadata",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_wire_reason() {
        assert_eq!(
            FsError::NotFound("a.txt".into()).to_string(),
            "file a.txt does not exist"
        );
        assert_eq!(
            FsError::InsufficientSpace {
                required: 64,
                available: 4
            }
            .to_string(),
            "not enough free blocks: need 64, 4 available"
        );
        assert_eq!(FsError::DirectoryFull.kind(), "directory_full");
    }

    #[test]
    fn test_io_error_converts() {
        let err: FsError = io::Error::new(io::ErrorKind::UnexpectedEof, "short read").into();
        assert!(matches!(err, FsError::Io(_)));
        assert_eq!(err.kind(), "io");
    }
}
