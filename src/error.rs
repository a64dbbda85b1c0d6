//! Error types for gdtf-extract.
//!
//! [`GdtfError`] is what [`extract`](crate::extract) returns. It always names
//! the archive it failed on, and [`GdtfError::kind`] reduces it to one of four
//! [`ErrorKind`]s for callers that only need to branch on the category.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`GdtfError`]
pub type Result<T> = std::result::Result<T, GdtfError>;

/// Coarse category of a [`GdtfError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The file is not a readable zip archive
    InvalidArchive,
    /// The archive has no `description.xml`
    MissingEntry,
    /// `description.xml` is not well-formed XML
    MalformedDocument,
    /// The operating system refused to open or read the file
    IoFailure,
}

/// Main error type for extraction
#[derive(Error, Debug)]
pub enum GdtfError {
    /// The zip structure is broken or uses features we cannot read
    #[error("{}: invalid archive", .path.display())]
    InvalidArchive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    /// The archive does not contain the requested entry
    #[error("{}: no entry named '{entry}' in archive", .path.display())]
    MissingEntry { path: PathBuf, entry: String },

    /// The entry could not be parsed as XML
    #[error("{}: malformed '{entry}'", .path.display())]
    MalformedDocument {
        path: PathBuf,
        entry: String,
        #[source]
        source: DocumentError,
    },

    /// Opening or reading the file failed
    #[error("{}: I/O error", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl GdtfError {
    /// The category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GdtfError::InvalidArchive { .. } => ErrorKind::InvalidArchive,
            GdtfError::MissingEntry { .. } => ErrorKind::MissingEntry,
            GdtfError::MalformedDocument { .. } => ErrorKind::MalformedDocument,
            GdtfError::Io { .. } => ErrorKind::IoFailure,
        }
    }

    /// Path of the archive the error refers to
    pub fn path(&self) -> &std::path::Path {
        match self {
            GdtfError::InvalidArchive { path, .. }
            | GdtfError::MissingEntry { path, .. }
            | GdtfError::MalformedDocument { path, .. }
            | GdtfError::Io { path, .. } => path.as_path(),
        }
    }

    /// Wrap a zip layer error, separating OS failures from format failures.
    pub(crate) fn from_zip(path: PathBuf, err: ZipError) -> Self {
        match err {
            ZipError::Io(source) => GdtfError::Io { path, source },
            source => GdtfError::InvalidArchive { path, source },
        }
    }
}

/// Errors raised while reading the zip container
#[derive(Error, Debug)]
pub enum ZipError {
    /// No End of Central Directory record was found
    #[error("not a valid ZIP file")]
    NotZip,

    /// A structure was found but its contents are inconsistent
    #[error("corrupt archive: {0}")]
    Corrupt(String),

    /// The entry uses a compression method other than STORED or DEFLATE
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// The entry is encrypted
    #[error("entry '{0}' is encrypted")]
    Encrypted(String),

    /// Decompressed data does not match the recorded checksum
    #[error("CRC-32 mismatch for '{name}': expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// The underlying reader failed
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for ZipError {
    /// `UnexpectedEof` means a structure points past the end of the archive
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ZipError::Corrupt("unexpected end of data".to_string())
        } else {
            ZipError::Io(err)
        }
    }
}

/// Position in a text document, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub row: u32,
    pub col: u32,
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// XML parse failure with the parser's position when it reports one
#[derive(Debug, Clone)]
pub struct DocumentError {
    /// Error message
    pub message: String,
    /// Where the parser stopped
    pub position: Option<TextPosition>,
}

impl DocumentError {
    /// Create a new document error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    /// Set the position the parser reported
    pub fn with_position(mut self, position: TextPosition) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} at {}", self.message, pos),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for DocumentError {}
