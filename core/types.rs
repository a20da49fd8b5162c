// Core types shared by the transport, relay and coordinator crates
use std::fmt;
use std::io;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 25565;

/// Size of a single receive call. Chunks carry no framing beyond this bound.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Input line that ends the session from the local side.
pub const DEFAULT_SENTINEL: &str = "break";

// Where the listener binds; fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: &str, port: u16) -> Self {
        Endpoint {
            host: host.to_string(),
            port,
        }
    }

    /// `host:port` form accepted by `ToSocketAddrs`. IPv6 literals get brackets.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}

// Lifecycle of the single relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Listening = 1,
    Connected = 2,
    ShuttingDown = 3,
    Closed = 4,
}

impl SessionState {
    /// Legal edges of the state machine. Failures on bind or accept jump
    /// straight to `Closed`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Listening)
                | (Idle, Closed)
                | (Listening, Connected)
                | (Listening, Closed)
                | (Connected, ShuttingDown)
                | (ShuttingDown, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Listening => write!(f, "listening"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::ShuttingDown => write!(f, "shutting-down"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

// Which relay activity produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

/// Whether a transport failure is the normal way a connection goes away
/// (peer reset, local close) or something worth a louder report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureKind {
    Expected,
    Unexpected,
}

// Why a relay activity stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationCause {
    /// Zero-length receive: the peer shut down its write side.
    PeerClosed,
    /// The sentinel line was sent and the local side chose to stop.
    LocalSentinel,
    /// Local input reached end-of-input.
    InputClosed,
    /// The coordinator began shutting down before this relay saw anything.
    Cancelled,
    Transport {
        kind: io::ErrorKind,
        closure: ClosureKind,
    },
    InputFailed(String),
    Panicked,
}

impl TerminationCause {
    /// Shutdown the local operator asked for.
    pub fn is_local(&self) -> bool {
        matches!(self, TerminationCause::LocalSentinel | TerminationCause::InputClosed)
    }

    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            TerminationCause::Transport {
                closure: ClosureKind::Unexpected,
                ..
            } | TerminationCause::InputFailed(_)
                | TerminationCause::Panicked
        )
    }
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TerminationCause::PeerClosed => write!(f, "peer closed the connection"),
            TerminationCause::LocalSentinel => write!(f, "local sentinel"),
            TerminationCause::InputClosed => write!(f, "local input closed"),
            TerminationCause::Cancelled => write!(f, "cancelled by coordinator"),
            TerminationCause::Transport { kind, closure } => match closure {
                ClosureKind::Expected => write!(f, "connection closed ({})", kind),
                ClosureKind::Unexpected => write!(f, "transport error ({})", kind),
            },
            TerminationCause::InputFailed(msg) => write!(f, "input error: {}", msg),
            TerminationCause::Panicked => write!(f, "relay panicked"),
        }
    }
}

// Final record of one relay activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayExit {
    pub direction: Direction,
    pub cause: TerminationCause,
    pub bytes: u64,
}

impl RelayExit {
    pub fn new(direction: Direction, cause: TerminationCause, bytes: u64) -> Self {
        RelayExit {
            direction,
            cause,
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_formats_ipv4_and_ipv6() {
        assert_eq!(Endpoint::default().address(), "127.0.0.1:25565");
        assert_eq!(Endpoint::new("::1", 9000).address(), "[::1]:9000");
        assert_eq!(Endpoint::new("[::1]", 9000).address(), "[::1]:9000");
    }

    #[test]
    fn state_machine_edges() {
        use SessionState::*;
        assert!(Idle.can_transition_to(Listening));
        assert!(Listening.can_transition_to(Connected));
        assert!(Connected.can_transition_to(ShuttingDown));
        assert!(ShuttingDown.can_transition_to(Closed));

        assert!(!Idle.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(Closed));
        assert!(!Closed.can_transition_to(Listening));
        assert!(Closed.is_terminal());
    }

    #[test]
    fn local_and_unexpected_causes() {
        assert!(TerminationCause::LocalSentinel.is_local());
        assert!(!TerminationCause::PeerClosed.is_local());
        assert!(!TerminationCause::PeerClosed.is_unexpected());

        let reset = TerminationCause::Transport {
            kind: io::ErrorKind::ConnectionReset,
            closure: ClosureKind::Expected,
        };
        assert!(!reset.is_unexpected());

        let odd = TerminationCause::Transport {
            kind: io::ErrorKind::InvalidData,
            closure: ClosureKind::Unexpected,
        };
        assert!(odd.is_unexpected());
    }
}
