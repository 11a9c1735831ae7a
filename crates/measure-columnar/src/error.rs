use arrow_schema::ArrowError;
use parquet::errors::ParquetError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open input `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid input `{path}`: {reason}")]
    InvalidInput { path: PathBuf, reason: String },
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("failed to read input `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },
    #[error("chunk schema {found} does not match artifact schema {expected}")]
    SchemaMismatch { expected: String, found: String },
    #[error("failed to build chunk: {0}")]
    Arrow(#[from] ArrowError),
    #[error("failed to {action} artifact `{path}`: {source}")]
    Artifact {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to {action} artifact `{path}`: {source}")]
    Parquet {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: ParquetError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`]. Every kind aborts the current run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    MalformedRecord,
    SchemaMismatch,
    Resource,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Open { .. } | Error::InvalidInput { .. } | Error::InvalidOptions(_) => {
                ErrorKind::InvalidInput
            }
            Error::MalformedRecord { .. } => ErrorKind::MalformedRecord,
            Error::SchemaMismatch { .. } | Error::Arrow(_) => ErrorKind::SchemaMismatch,
            Error::Read { .. } | Error::Artifact { .. } | Error::Parquet { .. } => {
                ErrorKind::Resource
            }
        }
    }

    /// Physical input line of a malformed record (1-based).
    pub fn line(&self) -> Option<u64> {
        match self {
            Error::MalformedRecord { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub(crate) fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(line: u64, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::InvalidInput => "invalid-input",
            ErrorKind::MalformedRecord => "malformed-record",
            ErrorKind::SchemaMismatch => "schema-mismatch",
            ErrorKind::Resource => "resource",
        })
    }
}
