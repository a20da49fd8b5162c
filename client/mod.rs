// client: dialing side of the relay, for peers that connect to a listening relay
use duplex_relay::{
    Endpoint, InputSource, OutputSink, RelayConfig, RelayError, Session, SessionReport,
    TcpTransport, Transport,
};

pub struct RelayClient {
    transport: Box<dyn Transport>,
}

impl RelayClient {
    /// Dial a relay listening on TCP. Fails fast, no retry.
    pub fn connect(endpoint: &Endpoint) -> Result<Self, RelayError> {
        let address = endpoint.address();
        let transport = TcpTransport::connect(&address).map_err(|source| RelayError::Connect {
            endpoint: address.clone(),
            source,
        })?;
        tracing::info!(peer = %address, "connected");
        Ok(RelayClient {
            transport: Box::new(transport),
        })
    }

    #[cfg(unix)]
    pub fn connect_unix(socket_path: &str) -> Result<Self, RelayError> {
        let transport = duplex_relay::UnixSocketTransport::connect(socket_path).map_err(|source| {
            RelayError::Connect {
                endpoint: format!("unix:{}", socket_path),
                source,
            }
        })?;
        tracing::info!(peer = %socket_path, "connected");
        Ok(RelayClient {
            transport: Box::new(transport),
        })
    }

    pub fn peer(&self) -> String {
        self.transport.peer()
    }

    /// Start both relays on the connection.
    pub fn start(
        self,
        input: Box<dyn InputSource>,
        sink: impl OutputSink + 'static,
        config: &RelayConfig,
    ) -> Result<Session, RelayError> {
        Session::start(self.transport, input, sink, config)
    }

    /// Run the session to completion.
    pub fn run(
        self,
        input: Box<dyn InputSource>,
        sink: impl OutputSink + 'static,
        config: &RelayConfig,
    ) -> Result<SessionReport, RelayError> {
        Ok(self.start(input, sink, config)?.wait())
    }
}
