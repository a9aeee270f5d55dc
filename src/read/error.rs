use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// An error that can occur while opening a GVDB file.
///
/// Once a file is open, lookups never fail: anomalies in the data degrade to
/// "not found" instead.
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// The data is too short, the signature is missing or unknown, or the
    /// format version is not recognized
    InvalidHeader(String),

    /// Generic I/O error. Path contains an optional filename if applicable
    Io(std::io::Error, Option<PathBuf>),
}

impl Error {
    pub(crate) fn from_io_with_filename(filename: &Path) -> impl FnOnce(std::io::Error) -> Error {
        let path = filename.to_path_buf();
        move |err| Error::Io(err, Some(path))
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidHeader(msg) => {
                write!(f, "Invalid GVDB header: {msg}")
            }
            Error::Io(err, path) => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error while reading file '{}': {}",
                        path.display(),
                        err
                    )
                } else {
                    write!(f, "I/O error: {err}")
                }
            }
        }
    }
}

/// The Result type for [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
