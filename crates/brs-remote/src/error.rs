//! Error type shared by the three simulator clients.
//!
//! The variants keep enough detail (status codes, body snippets, the failing
//! address) for a caller to tell "the service is not running" apart from
//! "the service answered with an error" and print a useful hint.

use std::path::PathBuf;
use std::time::Duration;

use brs_core::DigestError;
use thiserror::Error;

/// Errors returned by the ECP, installer and console clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The deadline of an HTTP exchange or console connect attempt passed.
    #[error("{operation} timed out after {}s", timeout.as_secs())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// The service answered with a status outside `200..300`.
    #[error("{operation} failed with status {status}")]
    Status {
        operation: String,
        status: u16,
        /// Start of the response body, for diagnostics.
        body: String,
    },

    /// The installer's Digest challenge was missing or malformed.
    #[error("digest authentication failed: {0}")]
    Protocol(#[from] DigestError),

    /// Neither the PNG nor the JPG screenshot could be fetched.
    #[error("screenshot retrieval failed with status {status}")]
    Retrieval { status: u16 },

    /// A console command was issued without a live connection.
    #[error("console not connected")]
    NotConnected,

    /// The HTTP request never produced a response (refused, reset, DNS...).
    #[error("could not reach {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The console TCP connection could not be opened.
    #[error("failed to connect to console at {addr}: {source}")]
    ConsoleConnect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing a command to the console socket failed.
    #[error("console write failed: {0}")]
    ConsoleWrite(#[source] std::io::Error),

    /// The channel package could not be read from disk.
    #[error("failed to read package {path}: {source}")]
    Package {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A base URL or request part could not be built.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ClientError {
    /// `true` when the service could not be reached at all, as opposed to
    /// answering with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::ConsoleConnect { .. } | Self::Timeout { .. }
        )
    }

    /// The HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::Retrieval { status } => Some(*status),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
