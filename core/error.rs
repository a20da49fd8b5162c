// Error taxonomy for the relay
use crate::types::ClosureKind;
use std::io;
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Listener could not reserve the address (in use, permission denied).
    #[error("failed to bind {endpoint}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// Listener closed or transport reset while waiting for the peer.
    #[error("failed to accept peer on {endpoint}")]
    Accept {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {endpoint}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// Fewer bytes than requested went out; the remainder is retried.
    #[error("partial write: {written} of {total} bytes")]
    PartialWrite { written: usize, total: usize },

    #[error("failed to start {name} relay thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("operation not valid while session is {0}")]
    InvalidState(crate::types::SessionState),
}

impl RelayError {
    /// Errors that end the process instead of a session. Everything else is
    /// handled inside a relay and turned into a termination signal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::Bind { .. }
                | RelayError::Accept { .. }
                | RelayError::Connect { .. }
                | RelayError::Spawn { .. }
                | RelayError::Config(_)
                | RelayError::InvalidState(_)
        )
    }
}

// Received chunk is not valid UTF-8
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid UTF-8 after {valid_up_to} of {len} bytes")]
pub struct DecodeError {
    pub valid_up_to: usize,
    pub len: usize,
    /// True when the chunk ends in the middle of a multi-byte character,
    /// i.e. the rest probably arrives in the next chunk.
    pub truncated: bool,
}

impl DecodeError {
    pub fn from_utf8(err: Utf8Error, len: usize) -> Self {
        DecodeError {
            valid_up_to: err.valid_up_to(),
            len,
            truncated: err.error_len().is_none(),
        }
    }
}

/// Decide how loudly a transport error should be reported.
///
/// Once shutdown has been requested every error is the forced close doing
/// its job. Otherwise resets, aborts and broken pipes are the ordinary ways a
/// peer disappears.
pub fn classify_closure(err: &io::Error, shutdown_requested: bool) -> ClosureKind {
    if shutdown_requested {
        return ClosureKind::Expected;
    }
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => ClosureKind::Expected,
        _ => ClosureKind::Unexpected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resets_are_expected_closures() {
        let err = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(classify_closure(&err, false), ClosureKind::Expected);
        let err = io::Error::from(io::ErrorKind::BrokenPipe);
        assert_eq!(classify_closure(&err, false), ClosureKind::Expected);
    }

    #[test]
    fn other_errors_are_unexpected_unless_shutting_down() {
        let err = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(classify_closure(&err, false), ClosureKind::Unexpected);
        assert_eq!(classify_closure(&err, true), ClosureKind::Expected);
    }

    #[test]
    fn fatal_errors() {
        let bind = RelayError::Bind {
            endpoint: "127.0.0.1:25565".into(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(bind.is_fatal());
        assert!(bind.to_string().contains("127.0.0.1:25565"));

        let partial = RelayError::PartialWrite { written: 3, total: 5 };
        assert!(!partial.is_fatal());
        assert_eq!(partial.to_string(), "partial write: 3 of 5 bytes");
    }

    #[test]
    fn cause_is_chained_not_repeated() {
        use std::error::Error as _;

        let connect = RelayError::Connect {
            endpoint: "127.0.0.1:25565".into(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(connect.to_string(), "failed to connect to 127.0.0.1:25565");
        assert_eq!(connect.source().map(|s| s.to_string()), Some("refused".to_string()));

        let accept = RelayError::Accept {
            endpoint: "unix:/tmp/relay.sock".into(),
            source: io::Error::new(io::ErrorKind::Other, "listener gone"),
        };
        assert!(!accept.to_string().contains("listener gone"));
    }

    #[test]
    fn truncated_decode_error() {
        // First two bytes of a three-byte character
        let bytes = vec![b'a', 0xE2, 0x82];
        let err = std::str::from_utf8(&bytes).unwrap_err();
        let decode = DecodeError::from_utf8(err, bytes.len());
        assert_eq!(decode.valid_up_to, 1);
        assert!(decode.truncated);

        let bytes = vec![b'a', 0xFF, b'b'];
        let err = std::str::from_utf8(&bytes).unwrap_err();
        let decode = DecodeError::from_utf8(err, bytes.len());
        assert!(!decode.truncated);
    }
}
