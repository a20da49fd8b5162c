// Core module: session types, error taxonomy and wire codec (NO I/O dependencies)
pub mod types;
pub mod protocol;
pub mod error;

pub use types::*;
pub use protocol::*;
pub use error::*;
