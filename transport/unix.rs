// Unix socket transport implementation for local relays
use crate::traits::{Transport, TransportListener};
use nix::sys::socket::{setsockopt, sockopt};
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::net::Shutdown;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

const SEND_BUFFER_SIZE: usize = 65536;

pub struct UnixSocketTransport {
    socket_path: String,
    stream: UnixStream,
}

impl UnixSocketTransport {
    pub fn connect(socket_path: &str) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)?;
        Self::from_stream(stream, socket_path)
    }

    fn from_stream(stream: UnixStream, socket_path: &str) -> Result<Self> {
        let transport = UnixSocketTransport {
            socket_path: socket_path.to_string(),
            stream,
        };
        if let Err(e) = transport.set_send_buffer_size(SEND_BUFFER_SIZE) {
            tracing::debug!(error = %e, "could not resize unix socket send buffer");
        }
        Ok(transport)
    }

    /// Set socket send buffer size (SO_SNDBUF)
    pub fn set_send_buffer_size(&self, size: usize) -> Result<()> {
        setsockopt(&self.stream, sockopt::SndBuf, &size)
            .map_err(|e| Error::new(ErrorKind::Other, e))
    }
}

impl Transport for UnixSocketTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.stream.write(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf)
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(UnixSocketTransport {
            socket_path: self.socket_path.clone(),
            stream: self.stream.try_clone()?,
        }))
    }

    fn shutdown(&self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn peer(&self) -> String {
        format!("unix:{}", self.socket_path)
    }
}

pub struct UnixSocketListener {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
}

impl UnixSocketListener {
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        UnixSocketListener {
            socket_path: socket_path.as_ref().to_path_buf(),
            listener: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl TransportListener for UnixSocketListener {
    type Connection = UnixSocketTransport;

    fn bind(&mut self) -> Result<()> {
        remove_stale_socket(&self.socket_path)?;
        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::debug!(path = %self.socket_path.display(), "unix listener bound");
        self.listener = Some(listener);
        Ok(())
    }

    fn accept(&mut self) -> Result<UnixSocketTransport> {
        match self.listener {
            Some(ref listener) => {
                let (stream, _) = listener.accept()?;
                UnixSocketTransport::from_stream(stream, &self.socket_path.to_string_lossy())
            }
            None => Err(Error::new(ErrorKind::NotConnected, "Not bound")),
        }
    }

    fn close(&mut self) {
        if self.listener.take().is_some() {
            let _ = std::fs::remove_file(&self.socket_path);
            tracing::debug!(path = %self.socket_path.display(), "unix listener released");
        }
    }

    fn local_description(&self) -> String {
        format!("unix:{}", self.socket_path.display())
    }
}

// Only a leftover socket may be replaced; any other file at the path is kept
fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => std::fs::remove_file(path),
        Ok(_) => Err(Error::new(
            ErrorKind::AlreadyExists,
            format!("{} exists and is not a socket", path.display()),
        )),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        self.close();
    }
}
