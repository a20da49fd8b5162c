// Inbound relay: drain the stream handle and surface each chunk as text
use crate::signal::SessionSignal;
use crate::sink::OutputSink;
use relay_core::{
    classify_closure, decode_chunk, decode_chunk_lossy, ClosureKind, Direction, RelayError,
    RelayExit, TerminationCause,
};
use relay_transport::Transport;
use std::io::ErrorKind;
use tracing::{debug, info, warn};

pub struct InboundRelay<T, S> {
    transport: T,
    sink: S,
    chunk_size: usize,
    signal: SessionSignal,
}

impl<T: Transport, S: OutputSink> InboundRelay<T, S> {
    pub fn new(transport: T, sink: S, chunk_size: usize, signal: SessionSignal) -> Self {
        InboundRelay {
            transport,
            sink,
            chunk_size: chunk_size.max(1),
            signal,
        }
    }

    /// Receive until the stream ends or fails. Never panics on I/O.
    pub fn run(mut self) -> RelayExit {
        let peer = self.transport.peer();
        let mut buf = vec![0u8; self.chunk_size];
        let mut bytes: u64 = 0;

        let cause = loop {
            match self.transport.receive(&mut buf) {
                Ok(0) => {
                    if self.signal.is_shutting_down() {
                        break TerminationCause::Cancelled;
                    }
                    info!(peer = %peer, "peer closed the connection");
                    break TerminationCause::PeerClosed;
                }
                Ok(n) => {
                    bytes += n as u64;
                    let chunk = &buf[..n];
                    let shown = match decode_chunk(chunk) {
                        Ok(text) => self.sink.display(text),
                        Err(e) => {
                            let truncated = e.truncated;
                            warn!(
                                error = %RelayError::from(e),
                                truncated,
                                "received chunk is not valid UTF-8, showing it lossily"
                            );
                            self.sink.display(&decode_chunk_lossy(chunk))
                        }
                    };
                    if let Err(e) = shown {
                        warn!(error = %e, "failed to display received text");
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    let closure = classify_closure(&e, self.signal.is_shutting_down());
                    match closure {
                        ClosureKind::Expected => {
                            debug!(peer = %peer, error = %e, "inbound stream closed")
                        }
                        ClosureKind::Unexpected => {
                            warn!(peer = %peer, error = %e, "inbound stream failed")
                        }
                    }
                    break TerminationCause::Transport {
                        kind: e.kind(),
                        closure,
                    };
                }
            }
        };

        debug!(direction = %Direction::Inbound, bytes, cause = %cause, "relay finished");
        RelayExit::new(Direction::Inbound, cause, bytes)
    }
}
