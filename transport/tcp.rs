// TCP transport implementation
use crate::traits::{Transport, TransportListener};
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

pub struct TcpTransport {
    peer: String,
    stream: TcpStream,
}

impl TcpTransport {
    /// Dial a listening relay.
    pub fn connect(address: &str) -> Result<Self> {
        let stream = TcpStream::connect(address)?;
        Self::from_stream(stream)
    }

    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        // Lines are small and interactive
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        Ok(TcpTransport { peer, stream })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.stream.local_addr()
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.stream.write(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf)
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(TcpTransport {
            peer: self.peer.clone(),
            stream: self.stream.try_clone()?,
        }))
    }

    fn shutdown(&self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // Already shut down, or the peer reset first
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

// Listener that hands out exactly one TcpTransport per accept
pub struct TcpRelayListener {
    address: String,
    listener: Option<TcpListener>,
}

impl TcpRelayListener {
    pub fn new(address: &str) -> Self {
        TcpRelayListener {
            address: address.to_string(),
            listener: None,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        match self.listener {
            Some(ref listener) => listener.local_addr(),
            None => Err(Error::new(ErrorKind::NotConnected, "Not bound")),
        }
    }
}

impl TransportListener for TcpRelayListener {
    type Connection = TcpTransport;

    fn bind(&mut self) -> Result<()> {
        let listener = TcpListener::bind(&self.address)?;
        tracing::debug!(address = %self.address, "tcp listener bound");
        self.listener = Some(listener);
        Ok(())
    }

    fn accept(&mut self) -> Result<TcpTransport> {
        match self.listener {
            Some(ref listener) => {
                let (stream, addr) = listener.accept()?;
                tracing::debug!(peer = %addr, "tcp peer accepted");
                TcpTransport::from_stream(stream)
            }
            None => Err(Error::new(ErrorKind::NotConnected, "Not bound")),
        }
    }

    fn close(&mut self) {
        if self.listener.take().is_some() {
            tracing::debug!(address = %self.address, "tcp listener released");
        }
    }

    fn local_description(&self) -> String {
        self.local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.address.clone())
    }
}
