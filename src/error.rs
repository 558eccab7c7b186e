// File: error.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// Per-sample and configuration errors.
///
/// Only `Config` is fatal to a run. The other variants are absorbed into
/// the failing sample's verdict and never abort sibling samples.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Invalid request line: {0}")]
    MalformedSpec(String),

    #[error("No Host header found and no target specified{0}")]
    Resolution(String),

    #[error("{0}")]
    Config(String),
}

impl ProbeError {
    pub fn config(message: impl Into<String>) -> Self {
        ProbeError::Config(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ProbeError::Config(_))
    }
}

/// Exhaustive failure taxonomy for a single delivery attempt.
///
/// `Reset` means the peer forcibly dropped the connection (an active WAF
/// drop), `Timeout` a connect or read deadline, `Other` everything else
/// (DNS, refused, TLS failure). All three are retried uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Reset,
    Other,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn timeout(message: impl Into<String>) -> Self {
        TransportError {
            kind: TransportErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn reset(message: impl Into<String>) -> Self {
        TransportError {
            kind: TransportErrorKind::Reset,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        TransportError {
            kind: TransportErrorKind::Other,
            message: message.into(),
        }
    }
}

/// Maps an I/O error from any transport phase onto the retry taxonomy.
pub fn classify_io_error(err: &std::io::Error, phase: &str) -> TransportError {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            TransportError::reset(format!("{phase}: connection reset by peer"))
        }
        ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            TransportError::timeout(format!("{phase}: timed out"))
        }
        _ => TransportError::other(format!("{phase}: {err}")),
    }
}
