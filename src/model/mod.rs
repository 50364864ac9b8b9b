//! Records served by the backends. Plain serde types; behavior lives in the
//! backend modules.

pub mod host;
pub mod network;
pub mod storage;
pub mod vm;

pub use host::*;
pub use network::*;
pub use storage::*;
pub use vm::*;
