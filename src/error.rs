/// Error taxonomy for the controller client.
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::protocol::command::{CmdType, ErrorCode};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// TCP dial failed or timed out; nothing is left open.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Phase 1 or 2 of the handshake failed; the transport has been torn down.
    #[error("handshake failed during {phase} negotiation: {reason}")]
    Handshake {
        phase: HandshakePhase,
        reason: HandshakeFailure,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The device answered with an error-answer frame.
    #[error("device reported {0}")]
    Device(ErrorCode),

    #[error("file transfer failed at {phase} phase: {code}")]
    FileTransfer { phase: TransferPhase, code: ErrorCode },

    /// An SDK command came back with a non-success result string.
    #[error("{method} rejected by device: {result}")]
    Rejected { method: String, result: String },

    #[error("invalid XML: {0}")]
    Xml(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("operation timed out")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("not connected")]
    NotConnected,
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Transport-level failures after which the connection must be re-established.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Timeout | Error::Closed)
    }

    pub(crate) fn xml(err: impl fmt::Display) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Malformed or out-of-sequence frames. The connection itself stays usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid frame length {0}")]
    InvalidLength(u16),

    #[error("{cmd} frame of {len} bytes is shorter than its {min}-byte layout")]
    ShortFrame { cmd: CmdType, len: usize, min: usize },

    #[error("fragment at offset {offset} with {len} bytes overruns declared total {total}")]
    OffsetOutOfRange {
        offset: usize,
        len: usize,
        total: usize,
    },

    #[error("unexpected {0} frame")]
    UnexpectedCommand(CmdType),

    #[error("frame of {0} bytes exceeds the 16-bit length field")]
    FrameTooLarge(usize),

    #[error("payload of {0} bytes exceeds the supported size")]
    PayloadTooLarge(u64),

    #[error("resume offset {offset} exceeds file size {size}")]
    ResumeOutOfRange { offset: u32, size: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Version,
    SdkVersion,
}

impl fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakePhase::Version => f.write_str("transport version"),
            HandshakePhase::SdkVersion => f.write_str("SDK version"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HandshakeFailure {
    #[error("device answered with {0}")]
    Device(ErrorCode),

    #[error("unexpected {0} answer")]
    Unexpected(CmdType),

    #[error(transparent)]
    Cause(Box<Error>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Start,
    End,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Start => f.write_str("start"),
            TransferPhase::End => f.write_str("end"),
        }
    }
}
