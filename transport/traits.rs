// Transport abstraction - a stream handle that can be split across relay threads
use std::io::{Error, ErrorKind, Result};

pub trait Transport: Send {
    /// One blocking write. May write fewer bytes than given.
    fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// One blocking read. `Ok(0)` means the stream has ended.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Another handle onto the same connection, so one thread can read
    /// while another writes and a third closes.
    fn try_clone(&self) -> Result<Box<dyn Transport>>;

    /// Close both directions. Any handle blocked in `receive` or `send`
    /// returns promptly. Calling it again is a no-op.
    fn shutdown(&self) -> Result<()>;

    /// Human readable peer address for logs.
    fn peer(&self) -> String;

    /// Write the whole buffer, retrying partial writes.
    fn send_all(&mut self, data: &[u8]) -> Result<()> {
        let total = data.len();
        let mut written = 0;
        while written < total {
            match self.send(&data[written..]) {
                Ok(0) => {
                    return Err(Error::new(
                        ErrorKind::WriteZero,
                        "transport accepted no bytes",
                    ))
                }
                Ok(n) => {
                    written += n;
                    if written < total {
                        tracing::trace!(written, total, "partial write, retrying remainder");
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        (**self).send(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).receive(buf)
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        (**self).try_clone()
    }

    fn shutdown(&self) -> Result<()> {
        (**self).shutdown()
    }

    fn peer(&self) -> String {
        (**self).peer()
    }
}

pub trait TransportListener: Send {
    type Connection: Transport + 'static;

    fn bind(&mut self) -> Result<()>;
    fn accept(&mut self) -> Result<Self::Connection>;

    /// Release the OS resource. Safe to call more than once.
    fn close(&mut self);

    /// Bound address (or the configured one before `bind`).
    fn local_description(&self) -> String;
}
