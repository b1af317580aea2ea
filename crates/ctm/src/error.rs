//! The error taxonomy shared by every operation in this crate.

use snafu::prelude::*;

/// Error conditions for encoding and decoding OpenCTM streams.
///
/// The split follows who has to act on the failure: `InvalidArgument`/`InvalidOperation` are
/// caller misuse and leave nothing dirty, `FileError` is the caller's stream acting up,
/// `InvalidMesh`/`BadFormat`/`UnsupportedFormatVersion` reject the data itself, and
/// `Lzma`/`Internal` report the compression subsystem and broken internal invariants.
/// After a failed decode the bound output arrays may have been partially written and hold
/// undefined contents until a later decode succeeds.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Thrown if an argument is out of its legal range or does not fit its target.
    #[snafu(display("Invalid argument!"))]
    InvalidArgument,
    /// Thrown if a call is made in a state that does not permit it.
    #[snafu(display("Operation is not valid in the current state!"))]
    InvalidOperation,
    /// Thrown if the mesh data violates an invariant (empty mesh, out-of-range index,
    /// non-finite value).
    #[snafu(display("Mesh data is invalid!"))]
    InvalidMesh,
    /// Thrown if the underlying stream fails or comes up short.
    #[snafu(display("Stream failure: {source}"))]
    FileError { source: std::io::Error },
    /// Thrown if the stream is not a well-formed OpenCTM container.
    #[snafu(display("Not a well-formed OpenCTM stream!"))]
    BadFormat,
    /// Thrown if LZMA compression or decompression fails.
    #[snafu(display("LZMA (de)compression failed!"))]
    Lzma,
    /// Thrown if an invariant the codec relies on did not hold. Always a bug.
    #[snafu(display("Internal error!"))]
    Internal,
    /// Thrown if the container declares a format version this crate does not speak.
    #[snafu(display("Unsupported format version {version}!"))]
    UnsupportedFormatVersion { version: u32 },
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<openctm_core::stream::Error> for Error {
    fn from(error: openctm_core::stream::Error) -> Self {
        match error {
            openctm_core::stream::Error::File { source } => Self::FileError { source },
            // Hostile lengths and bad UTF-8 are corrupt container data
            _ => Self::BadFormat,
        }
    }
}

impl From<openctm_core::array::Error> for Error {
    fn from(_: openctm_core::array::Error) -> Self {
        Self::InvalidArgument
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::FileError { source }
    }
}
