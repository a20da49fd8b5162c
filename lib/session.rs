// Session coordinator: owns the stream handle, runs both relays, forces shutdown
use crate::config::RelayConfig;
use crate::inbound::InboundRelay;
use crate::input::{spawn_pump, InputSource};
use crate::outbound::OutboundRelay;
use crate::signal::{session_signal, SessionSignal, SignalController};
use crate::sink::OutputSink;
use relay_core::{Direction, RelayError, RelayExit, SessionState, TerminationCause};
use relay_transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Current state plus every state visited, in order.
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: SessionState,
    history: Vec<SessionState>,
}

impl StateTracker {
    pub fn new(initial: SessionState) -> Self {
        StateTracker {
            current: initial,
            history: vec![initial],
        }
    }

    pub fn current(&self) -> SessionState {
        self.current
    }

    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn advance(&mut self, next: SessionState) -> Result<(), RelayError> {
        if !self.current.can_transition_to(next) {
            return Err(RelayError::InvalidState(self.current));
        }
        debug!(from = %self.current, to = %next, "session state");
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}

// What happened to a finished session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub peer: String,
    /// The first termination signal; it started the shutdown.
    pub initiator: RelayExit,
    pub inbound: RelayExit,
    pub outbound: RelayExit,
    pub states: Vec<SessionState>,
}

impl SessionReport {
    pub fn final_state(&self) -> SessionState {
        self.states.last().copied().unwrap_or(SessionState::Closed)
    }

    /// Both relays ended on their own terms (no panic).
    pub fn is_clean(&self) -> bool {
        self.inbound.cause != TerminationCause::Panicked
            && self.outbound.cause != TerminationCause::Panicked
    }

    pub fn ended_locally(&self) -> bool {
        self.initiator.cause.is_local()
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_clean() {
            0
        } else {
            1
        }
    }

    /// One user-facing line about how the session ended. Local shutdown,
    /// a peer hanging up and a lost connection are reported differently.
    pub fn log_outcome(&self) {
        let cause = &self.initiator.cause;
        if self.ended_locally() {
            info!(cause = %cause, "session ended locally");
        } else if cause.is_unexpected() {
            warn!(peer = %self.peer, cause = %cause, "connection lost");
        } else {
            info!(peer = %self.peer, cause = %cause, "peer disconnected");
        }
    }
}

pub struct Session {
    peer: String,
    closer: Box<dyn Transport>,
    controller: SignalController,
    inbound: Option<JoinHandle<RelayExit>>,
    outbound: Option<JoinHandle<RelayExit>>,
    tracker: StateTracker,
    closed: AtomicBool,
}

impl Session {
    /// Take ownership of a connected stream handle and start both relays.
    pub fn start<T, S>(
        transport: T,
        input: Box<dyn InputSource>,
        sink: S,
        config: &RelayConfig,
    ) -> Result<Self, RelayError>
    where
        T: Transport + 'static,
        S: OutputSink + 'static,
    {
        config.validate()?;

        let peer = transport.peer();
        let reader = transport.try_clone().map_err(RelayError::Transport)?;
        let writer = transport.try_clone().map_err(RelayError::Transport)?;
        let closer: Box<dyn Transport> = Box::new(transport);

        let lines = spawn_pump(input).map_err(|source| RelayError::Spawn {
            name: "input",
            source,
        })?;

        let (signal, controller) = session_signal();
        let chunk_size = config.chunk_size;
        let inbound = spawn_relay(Direction::Inbound, &signal, move |signal| {
            InboundRelay::new(reader, sink, chunk_size, signal).run()
        });
        let inbound = match inbound {
            Ok(handle) => handle,
            Err(e) => {
                let _ = closer.shutdown();
                return Err(e);
            }
        };

        let sentinel = config.sentinel.clone();
        let outbound = spawn_relay(Direction::Outbound, &signal, move |signal| {
            OutboundRelay::new(writer, lines, &sentinel, signal).run()
        });
        let outbound = match outbound {
            Ok(handle) => handle,
            Err(e) => {
                // The inbound relay sees the close and exits on its own
                controller.trip();
                let _ = closer.shutdown();
                return Err(e);
            }
        };

        info!(peer = %peer, "relays started");

        Ok(Session {
            peer,
            closer,
            controller,
            inbound: Some(inbound),
            outbound: Some(outbound),
            tracker: StateTracker::new(SessionState::Connected),
            closed: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> SessionState {
        self.tracker.current()
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Mark the session as shutting down and close the stream handle so any
    /// relay blocked on it returns. Only the first call touches the handle.
    pub fn close(&self) {
        self.controller.trip();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.closer.shutdown() {
            debug!(peer = %self.peer, error = %e, "stream handle close reported an error");
        }
    }

    /// Block until the first relay ends, force the other one out, join both.
    pub fn wait(mut self) -> SessionReport {
        let initiator = self.controller.wait_first();
        self.enter(SessionState::ShuttingDown);
        debug!(
            direction = %initiator.direction,
            cause = %initiator.cause,
            "termination signal received"
        );
        self.close();

        let inbound = join_relay(self.inbound.take(), Direction::Inbound);
        let outbound = join_relay(self.outbound.take(), Direction::Outbound);
        self.enter(SessionState::Closed);
        info!(
            peer = %self.peer,
            received = inbound.bytes,
            sent = outbound.bytes,
            "session closed"
        );

        SessionReport {
            peer: self.peer.clone(),
            initiator,
            inbound,
            outbound,
            states: self.tracker.history().to_vec(),
        }
    }

    fn enter(&mut self, next: SessionState) {
        if let Err(e) = self.tracker.advance(next) {
            debug!(error = %e, to = %next, "ignoring state transition");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Relay threads of a session dropped without `wait` are left to exit
        // on the closed handle
        self.close();
    }
}

fn spawn_relay<F>(
    direction: Direction,
    signal: &SessionSignal,
    body: F,
) -> Result<JoinHandle<RelayExit>, RelayError>
where
    F: FnOnce(SessionSignal) -> RelayExit + Send + 'static,
{
    let name = match direction {
        Direction::Inbound => "inbound",
        Direction::Outbound => "outbound",
    };
    let signal = signal.clone();
    thread::Builder::new()
        .name(format!("relay-{}", name))
        .spawn(move || {
            let reporter = signal.reporter(direction);
            let exit = body(signal);
            reporter.report(exit)
        })
        .map_err(|source| RelayError::Spawn { name, source })
}

fn join_relay(handle: Option<JoinHandle<RelayExit>>, direction: Direction) -> RelayExit {
    match handle.map(JoinHandle::join) {
        Some(Ok(exit)) => exit,
        _ => RelayExit::new(direction, TerminationCause::Panicked, 0),
    }
}
