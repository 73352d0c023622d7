//! Error types for rubrica operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a run.
///
/// Field-level absence (a missing `head`, `anchor`, translation) is never an
/// error; those degrade to empty strings where they are read.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: XML parsing error at byte {position}: {source}", path.display())]
    Xml {
        path: PathBuf,
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("{}: malformed document: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("cannot include {href}: {message}")]
    Include { href: String, message: String },

    #[error("inclusion cycle through {}", .0.display())]
    IncludeCycle(PathBuf),

    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("no input documents")]
    NoDocuments,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
