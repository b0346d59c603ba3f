use core::fmt::{self, Display};

#[derive(Debug)]
pub enum Error {
    /// The document could not be encoded as JSON.
    Encode,
    /// Writing or renaming the file failed.
    Io,
}

impl From<serde_json::Error> for Error {
    fn from(_: serde_json::Error) -> Self {
        Self::Encode
    }
}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        Self::Io
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Encode => "failed to encode the document as JSON",
            Self::Io => "failed to write the document to disk",
        })
    }
}

impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
