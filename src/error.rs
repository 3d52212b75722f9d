//! Our error types for PLI communication.

use thiserror::Error;

pub type Result<T, I> = std::result::Result<T, Error<I>>;

/// Custom error type for PL regulator communications.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    /// The byte stream itself failed.
    #[error("serial port error: {0:?}")]
    Serial(I),
    /// The wall-clock budget for one read or write ran out.
    #[error("timed out waiting for the serial port")]
    Timeout,
    /// The retry budget ran out before the whole frame was written.
    #[error("could not write complete command frame")]
    IncompleteWrite,
    /// The retry budget ran out before the whole response arrived.
    #[error("could not read complete response")]
    IncompleteRead,
    /// The PLI answered with an error code instead of data.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The configuration file could not be read or written.
    #[error("could not access configuration file '{path}': {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The configuration file does not hold exactly one configuration block.
    #[error("configuration file '{path}' holds {actual} bytes, expected {expected}")]
    ConfigFileSize {
        path: String,
        expected: usize,
        actual: usize,
    },
}

impl<I: embedded_io::Error> Error<I> {
    /// Classify this error for the invoking process.
    pub fn status(&self) -> Status {
        match self {
            Error::Serial(_) | Error::Timeout | Error::IncompleteWrite | Error::IncompleteRead => {
                Status::Communication
            }
            Error::Protocol(_) => Status::Command,
            Error::ConfigFile { .. } | Error::ConfigFileSize { .. } => Status::Local,
        }
    }

    /// True for failures reported by the device itself rather than by the
    /// host side of the link.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

/// Error codes the PLI can answer with in place of the success marker.
///
/// Unknown codes decode to [`ProtocolError::Failed`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// 0x81
    #[error("command failed: timeout error")]
    Timeout,
    /// 0x82
    #[error("command failed: checksum error in PLI receive data")]
    Checksum,
    /// 0x83
    #[error("command failed: command received by PLI is not recognised")]
    Unrecognised,
    /// 0x85
    #[error("command failed: processor did not receive a reply to request")]
    NoProcessorReply,
    /// 0x86
    #[error("command failed: error in reply from PL")]
    ReplyError,
    /// Any other first response byte.
    #[error("command failed")]
    Failed,
}

impl ProtocolError {
    /// Map a response code byte onto the closed error set.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x81 => ProtocolError::Timeout,
            0x82 => ProtocolError::Checksum,
            0x83 => ProtocolError::Unrecognised,
            0x85 => ProtocolError::NoProcessorReply,
            0x86 => ProtocolError::ReplyError,
            _ => ProtocolError::Failed,
        }
    }
}

/// Broad outcome classes surfaced to the invoking process.
///
/// The CLI collaborator maps these onto its own exit-code convention; the
/// library never deals in raw numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The command completed.
    Success,
    /// Transport failure: system I/O error, incomplete transfer or timeout.
    Communication,
    /// Local failure: configuration file missing, unreadable or short.
    Local,
    /// The link worked but the operation itself failed.
    Command,
}
