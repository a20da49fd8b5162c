// Outbound relay: forward local input lines to the peer until the sentinel
use crate::input::InputEvent;
use crate::signal::SessionSignal;
use crossbeam::channel::{select, Receiver};
use relay_core::{
    classify_closure, encode_line, is_sentinel, ClosureKind, Direction, RelayExit, TerminationCause,
};
use relay_transport::Transport;
use std::io;
use tracing::{debug, info, warn};

pub struct OutboundRelay<T> {
    transport: T,
    lines: Receiver<InputEvent>,
    sentinel: String,
    signal: SessionSignal,
}

impl<T: Transport> OutboundRelay<T> {
    pub fn new(transport: T, lines: Receiver<InputEvent>, sentinel: &str, signal: SessionSignal) -> Self {
        OutboundRelay {
            transport,
            lines,
            sentinel: sentinel.to_string(),
            signal,
        }
    }

    pub fn run(mut self) -> RelayExit {
        let mut bytes: u64 = 0;

        let cause = loop {
            let event = select! {
                recv(self.lines) -> event => event.unwrap_or(InputEvent::End),
                recv(self.signal.cancelled()) -> _ => break TerminationCause::Cancelled,
            };

            let line = match event {
                InputEvent::Line(line) => line,
                InputEvent::End => {
                    info!("local input closed");
                    break TerminationCause::InputClosed;
                }
                InputEvent::Failed(e) => {
                    warn!(error = %e, "failed to read local input");
                    break TerminationCause::InputFailed(e.to_string());
                }
            };

            if self.signal.is_shutting_down() {
                break TerminationCause::Cancelled;
            }

            if let Err(e) = self.send_line(&line) {
                let closure = classify_closure(&e, self.signal.is_shutting_down());
                match closure {
                    ClosureKind::Expected => debug!(error = %e, "outbound stream closed"),
                    ClosureKind::Unexpected => warn!(error = %e, "outbound stream failed"),
                }
                break TerminationCause::Transport {
                    kind: e.kind(),
                    closure,
                };
            }
            bytes += line.len() as u64;

            if is_sentinel(&line, &self.sentinel) {
                info!(sentinel = %self.sentinel, "sentinel sent, closing session");
                break TerminationCause::LocalSentinel;
            }
        };

        debug!(direction = %Direction::Outbound, bytes, cause = %cause, "relay finished");
        RelayExit::new(Direction::Outbound, cause, bytes)
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.transport.send_all(encode_line(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{spawn_pump, ChannelInput, ScriptedInput};
    use crate::signal::session_signal;
    use relay_transport::{bounded_pipe, pipe, MemoryTransport};
    use std::io::ErrorKind;
    use std::thread;
    use std::time::Duration;

    fn drain(peer: &mut MemoryTransport) -> Vec<u8> {
        let mut got = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            match peer.receive(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => got.extend_from_slice(&buf[..n]),
            }
        }
        got
    }

    #[test]
    fn sentinel_is_sent_then_relay_stops() {
        let (local, mut peer) = pipe();
        let (signal, _controller) = session_signal();
        let lines = spawn_pump(Box::new(ScriptedInput::new(["hi", "break", "never"]))).unwrap();

        let exit = OutboundRelay::new(local, lines, "break", signal).run();
        assert_eq!(exit.cause, TerminationCause::LocalSentinel);
        assert_eq!(exit.bytes, 7);

        peer.shutdown().unwrap();
        assert_eq!(drain(&mut peer), b"hibreak");
    }

    #[test]
    fn end_of_input_stops_relay() {
        let (local, _peer) = pipe();
        let (signal, _controller) = session_signal();
        let lines = spawn_pump(Box::new(ScriptedInput::new(["only"]))).unwrap();

        let exit = OutboundRelay::new(local, lines, "break", signal).run();
        assert_eq!(exit.cause, TerminationCause::InputClosed);
        assert_eq!(exit.bytes, 4);
    }

    #[test]
    fn partial_writes_are_completed() {
        let (local, mut peer) = pipe();
        let local = local.with_write_limit(3);
        let (signal, _controller) = session_signal();
        let lines = spawn_pump(Box::new(ScriptedInput::new(["a longer line", "break"]))).unwrap();

        let exit = OutboundRelay::new(local, lines, "break", signal).run();
        assert_eq!(exit.cause, TerminationCause::LocalSentinel);

        peer.shutdown().unwrap();
        assert_eq!(drain(&mut peer), b"a longer linebreak");
    }

    #[test]
    fn send_error_terminates_relay() {
        let (local, peer) = pipe();
        peer.shutdown().unwrap();
        let (signal, _controller) = session_signal();
        let lines = spawn_pump(Box::new(ScriptedInput::new(["hi"]))).unwrap();

        let exit = OutboundRelay::new(local, lines, "break", signal).run();
        assert_eq!(
            exit.cause,
            TerminationCause::Transport {
                kind: ErrorKind::BrokenPipe,
                closure: ClosureKind::Expected,
            }
        );
        assert_eq!(exit.bytes, 0);
    }

    #[test]
    fn close_while_blocked_in_send_errors_out() {
        // Nobody reads the peer end, so the first send blocks
        let (local, _peer) = bounded_pipe(0);
        let closer = local.try_clone().unwrap();
        let (signal, _controller) = session_signal();
        let lines = spawn_pump(Box::new(ScriptedInput::new(["stuck"]))).unwrap();

        let relay = thread::spawn(move || OutboundRelay::new(local, lines, "break", signal).run());
        thread::sleep(Duration::from_millis(50));
        closer.shutdown().unwrap();

        let exit = relay.join().unwrap();
        assert!(matches!(
            exit.cause,
            TerminationCause::Transport { kind: ErrorKind::BrokenPipe, .. }
        ));
    }

    #[test]
    fn cancellation_while_waiting_for_input() {
        let (local, _peer) = pipe();
        let (signal, controller) = session_signal();
        let (_keep_open, rx) = crossbeam::channel::unbounded::<String>();
        let lines = spawn_pump(Box::new(ChannelInput::new(rx))).unwrap();

        let relay = thread::spawn(move || OutboundRelay::new(local, lines, "break", signal).run());
        thread::sleep(Duration::from_millis(50));
        controller.trip();

        let exit = relay.join().unwrap();
        assert_eq!(exit.cause, TerminationCause::Cancelled);
    }
}
