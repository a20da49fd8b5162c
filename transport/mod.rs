// Transport module: Abstract stream handles and listeners
pub mod traits;
pub mod tcp;
#[cfg(unix)]
pub mod unix;
pub mod memory;

pub use traits::*;
pub use tcp::*;
#[cfg(unix)]
pub use unix::*;
pub use memory::*;
