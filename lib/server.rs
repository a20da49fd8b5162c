// Listening side: bind, accept exactly one peer, run its session, release
use crate::config::RelayConfig;
use crate::input::InputSource;
use crate::session::{Session, SessionReport, StateTracker};
use crate::sink::OutputSink;
use relay_core::{RelayError, SessionState};
use relay_transport::TransportListener;
use tracing::info;

pub struct RelayServer<L: TransportListener> {
    listener: L,
    config: RelayConfig,
    tracker: StateTracker,
}

impl<L: TransportListener> RelayServer<L> {
    pub fn new(listener: L, config: RelayConfig) -> Self {
        RelayServer {
            listener,
            config,
            tracker: StateTracker::new(SessionState::Idle),
        }
    }

    pub fn state(&self) -> SessionState {
        self.tracker.current()
    }

    pub fn states(&self) -> &[SessionState] {
        self.tracker.history()
    }

    pub fn local_description(&self) -> String {
        self.listener.local_description()
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Idle -> Listening. No retry: a busy address fails immediately.
    pub fn bind(&mut self) -> Result<(), RelayError> {
        if self.state() != SessionState::Idle {
            return Err(RelayError::InvalidState(self.state()));
        }
        if let Err(source) = self.listener.bind() {
            let endpoint = self.listener.local_description();
            self.release();
            return Err(RelayError::Bind { endpoint, source });
        }
        self.tracker.advance(SessionState::Listening)?;
        info!(address = %self.listener.local_description(), "listening for a peer");
        Ok(())
    }

    /// Listening -> Connected. Blocks until one peer connects, then starts
    /// both relays on it.
    pub fn accept(
        &mut self,
        input: Box<dyn InputSource>,
        sink: impl OutputSink + 'static,
    ) -> Result<Session, RelayError> {
        if self.state() != SessionState::Listening {
            return Err(RelayError::InvalidState(self.state()));
        }
        let connection = match self.listener.accept() {
            Ok(connection) => connection,
            Err(source) => {
                let endpoint = self.listener.local_description();
                self.release();
                return Err(RelayError::Accept { endpoint, source });
            }
        };

        let session = match Session::start(connection, input, sink, &self.config) {
            Ok(session) => session,
            Err(e) => {
                self.release();
                return Err(e);
            }
        };
        info!(peer = %session.peer(), "peer connected");
        self.tracker.advance(SessionState::Connected)?;
        Ok(session)
    }

    /// Run one complete session and release the listener.
    pub fn serve_once(
        mut self,
        input: Box<dyn InputSource>,
        sink: impl OutputSink + 'static,
    ) -> Result<SessionReport, RelayError> {
        self.bind()?;
        let session = self.accept(input, sink)?;
        let report = session.wait();
        self.finish();
        Ok(report)
    }

    /// Connected -> ShuttingDown -> Closed once the session has been joined.
    pub fn finish(&mut self) {
        if self.state() == SessionState::Connected {
            let _ = self.tracker.advance(SessionState::ShuttingDown);
        }
        self.release();
    }

    fn release(&mut self) {
        self.listener.close();
        if !self.state().is_terminal() {
            let _ = self.tracker.advance(SessionState::Closed);
        }
    }
}

impl<L: TransportListener> Drop for RelayServer<L> {
    fn drop(&mut self) {
        self.listener.close();
    }
}
