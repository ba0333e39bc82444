use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io::ErrorKind;

/// Failure reasons reported by an encoding or decoding session.
///
/// The variant set matches the stable reason names frontends are expected to
/// print; [`EcmError::as_str`] returns that identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcmError {
    /// The input file could not be opened.
    ErrorOpeningInputFile,
    /// The output file could not be opened or created.
    ErrorOpeningOutputFile,
    /// Unable to allocate the lookahead queue.
    OutOfMemory,
    /// An error occurred while reading the input stream.
    ErrorReadingInputFile,
    /// An error occurred while writing the output stream.
    ErrorWritingOutputFile,
    /// The input is not a valid ECM stream (bad magic or malformed record
    /// header).
    InvalidEcmFile,
    /// The checksum of the decoded output does not match the stream trailer.
    ErrorInChecksum,
    /// Encoding from standard input is not supported; the encoder needs a
    /// seekable source.
    StdinNotSupported,
}

impl EcmError {
    /// Stable identifier for this failure reason.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EcmError::ErrorOpeningInputFile => "ERROR_OPENING_INPUT_FILE",
            EcmError::ErrorOpeningOutputFile => "ERROR_OPENING_OUTPUT_FILE",
            EcmError::OutOfMemory => "OUT_OF_MEMORY",
            EcmError::ErrorReadingInputFile => "ERROR_READING_INPUT_FILE",
            EcmError::ErrorWritingOutputFile => "ERROR_WRITING_OUTPUT_FILE",
            EcmError::InvalidEcmFile => "INVALID_ECM_FILE",
            EcmError::ErrorInChecksum => "ERROR_IN_CHECKSUM",
            EcmError::StdinNotSupported => "STDIN_NOT_SUPPORTED",
        }
    }
}

impl Error for EcmError {}

impl Display for EcmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EcmError::ErrorOpeningInputFile => f.write_str("could not open input file"),
            EcmError::ErrorOpeningOutputFile => f.write_str("could not open output file"),
            EcmError::OutOfMemory => f.write_str("out of memory"),
            EcmError::ErrorReadingInputFile => f.write_str("error reading input file"),
            EcmError::ErrorWritingOutputFile => f.write_str("error writing output file"),
            EcmError::InvalidEcmFile => f.write_str("invalid ECM file"),
            EcmError::ErrorInChecksum => f.write_str("checksum mismatch in decoded output"),
            EcmError::StdinNotSupported => f.write_str("encoding from stdin is not supported"),
        }
    }
}

impl From<EcmError> for std::io::Error {
    fn from(e: EcmError) -> Self {
        std::io::Error::new(ErrorKind::Other, e)
    }
}

/// Result type for the ecm crate.
pub type Result<T> = std::result::Result<T, EcmError>;
