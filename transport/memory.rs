// In-process transport: a pair of connected ends backed by crossbeam channels.
// Used to drive sessions without sockets, including forced-close scenarios.
use crate::traits::Transport;
use crossbeam::channel::{bounded, select, unbounded, Receiver, Sender, TryRecvError};
use std::io::{Error, ErrorKind, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// Connection-wide close state shared by both ends and all their clones
struct PipeState {
    closed: AtomicBool,
    // Dropping the sender disconnects `close_rx`, waking every blocked select
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
}

impl PipeState {
    fn new() -> Arc<Self> {
        let (close_tx, close_rx) = bounded(0);
        Arc::new(PipeState {
            closed: AtomicBool::new(false),
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut guard = match self.close_tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct MemoryTransport {
    name: String,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    // Bytes of a chunk larger than the caller's buffer
    pending: Vec<u8>,
    write_limit: Option<usize>,
    state: Arc<PipeState>,
}

/// Connected pair with unbounded buffering in each direction.
pub fn pipe() -> (MemoryTransport, MemoryTransport) {
    let (a_tx, b_rx) = unbounded();
    let (b_tx, a_rx) = unbounded();
    MemoryTransport::pair(a_tx, a_rx, b_tx, b_rx)
}

/// Connected pair where each direction holds at most `capacity` chunks.
/// With `capacity == 0` every send blocks until the other end receives it.
pub fn bounded_pipe(capacity: usize) -> (MemoryTransport, MemoryTransport) {
    let (a_tx, b_rx) = bounded(capacity);
    let (b_tx, a_rx) = bounded(capacity);
    MemoryTransport::pair(a_tx, a_rx, b_tx, b_rx)
}

impl MemoryTransport {
    fn pair(
        a_tx: Sender<Vec<u8>>,
        a_rx: Receiver<Vec<u8>>,
        b_tx: Sender<Vec<u8>>,
        b_rx: Receiver<Vec<u8>>,
    ) -> (Self, Self) {
        let state = PipeState::new();
        let a = MemoryTransport {
            name: "memory:a".to_string(),
            tx: a_tx,
            rx: a_rx,
            pending: Vec::new(),
            write_limit: None,
            state: Arc::clone(&state),
        };
        let b = MemoryTransport {
            name: "memory:b".to_string(),
            tx: b_tx,
            rx: b_rx,
            pending: Vec::new(),
            write_limit: None,
            state,
        };
        (a, b)
    }

    /// Accept at most `limit` bytes per `send`, forcing callers through
    /// their partial-write path.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit.max(1));
        self
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    fn take_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        n
    }

    fn deliver(&mut self, chunk: Vec<u8>, buf: &mut [u8]) -> usize {
        self.pending = chunk;
        self.take_pending(buf)
    }
}

fn broken_pipe() -> Error {
    Error::new(ErrorKind::BrokenPipe, "memory transport closed")
}

impl Transport for MemoryTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        if self.state.is_closed() {
            return Err(broken_pipe());
        }
        if data.is_empty() {
            return Ok(0);
        }
        let n = self.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        let chunk = data[..n].to_vec();
        select! {
            send(self.tx, chunk) -> res => match res {
                Ok(()) => Ok(n),
                Err(_) => Err(broken_pipe()),
            },
            recv(self.state.close_rx) -> _ => Err(broken_pipe()),
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.pending.is_empty() {
            return Ok(self.take_pending(buf));
        }
        if self.state.is_closed() {
            // Data already in flight stays readable, then end-of-stream
            return match self.rx.try_recv() {
                Ok(chunk) => Ok(self.deliver(chunk, buf)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(0),
            };
        }
        let rx = self.rx.clone();
        let close_rx = self.state.close_rx.clone();
        select! {
            recv(rx) -> msg => match msg {
                Ok(chunk) => Ok(self.deliver(chunk, buf)),
                Err(_) => Ok(0),
            },
            recv(close_rx) -> _ => match rx.try_recv() {
                Ok(chunk) => Ok(self.deliver(chunk, buf)),
                Err(_) => Ok(0),
            },
        }
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(MemoryTransport {
            name: self.name.clone(),
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            pending: Vec::new(),
            write_limit: self.write_limit,
            state: Arc::clone(&self.state),
        }))
    }

    fn shutdown(&self) -> Result<()> {
        self.state.close();
        Ok(())
    }

    fn peer(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn chunks_flow_both_ways() {
        let (mut a, mut b) = pipe();
        a.send_all(b"hello").unwrap();
        b.send_all(b"hi").unwrap();

        let mut buf = [0u8; 16];
        let n = b.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        let n = a.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hi");
    }

    #[test]
    fn oversized_chunk_is_split_across_receives() {
        let (mut a, mut b) = pipe();
        a.send_all(b"abcdef").unwrap();

        let mut buf = [0u8; 4];
        let n = b.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abcd");
        let n = b.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ef");
    }

    #[test]
    fn close_unblocks_pending_receive() {
        let (a, mut b) = pipe();
        let reader = thread::spawn(move || {
            let mut buf = [0u8; 8];
            let start = Instant::now();
            (b.receive(&mut buf), start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        a.shutdown().unwrap();

        let (result, waited) = reader.join().unwrap();
        assert_eq!(result.unwrap(), 0);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn close_unblocks_pending_send() {
        // Rendezvous channel and nobody reading: send blocks
        let (mut a, b) = bounded_pipe(0);
        let closer = a.try_clone().unwrap();
        let writer = thread::spawn(move || a.send(b"stuck"));

        thread::sleep(Duration::from_millis(50));
        closer.shutdown().unwrap();

        let err = writer.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
        drop(b);
    }

    #[test]
    fn data_in_flight_survives_close() {
        let (mut a, mut b) = pipe();
        a.send_all(b"last words").unwrap();
        a.shutdown().unwrap();

        let mut buf = [0u8; 32];
        let n = b.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"last words");
        assert_eq!(b.receive(&mut buf).unwrap(), 0);
        assert_eq!(b.send(b"x").unwrap_err().kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn shutdown_twice_is_harmless() {
        let (a, b) = pipe();
        a.shutdown().unwrap();
        a.shutdown().unwrap();
        b.shutdown().unwrap();
        assert!(a.is_closed() && b.is_closed());
    }

    #[test]
    fn write_limit_forces_partial_writes() {
        let (a, mut b) = pipe();
        let mut a = a.with_write_limit(2);
        assert_eq!(a.send(b"hello").unwrap(), 2);
        a.send_all(b"llo").unwrap();

        let mut got = Vec::new();
        let mut buf = [0u8; 8];
        while got.len() < 5 {
            let n = b.receive(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, b"hello");
    }
}
