// duplex-relay: accept-once, two-threaded text relay over a stream transport
//
// One relay thread drains the connection to an output sink, the other
// forwards local input lines to the peer. The session coordinator owns the
// connection, waits for whichever relay stops first, closes the handle so
// the other one unblocks, then joins both.

// Re-export core types and transport abstractions
pub use relay_core::*;
pub use relay_transport::*;

pub mod config;
pub mod inbound;
pub mod input;
pub mod outbound;
pub mod server;
pub mod session;
pub mod signal;
pub mod sink;

pub use config::RelayConfig;
pub use inbound::InboundRelay;
pub use input::{spawn_pump, stdin, ChannelInput, InputEvent, InputSource, ReaderInput, ScriptedInput};
pub use outbound::OutboundRelay;
pub use server::RelayServer;
pub use session::{Session, SessionReport, StateTracker};
pub use signal::{session_signal, SessionSignal, SignalController};
pub use sink::{CollectingSink, ConsoleSink, OutputSink};
