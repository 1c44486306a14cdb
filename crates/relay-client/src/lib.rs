//! Client side of the streaming completion relay.
//!
//! [`read_incremental`] consumes any byte stream the way a browser reader
//! would, reporting cumulative text after every chunk. [`RelayClient`] wires
//! it to the relay's HTTP route.

pub mod client;
pub mod errors;
/// Incremental UTF-8 reading of the downstream body.
pub mod reader;

pub use client::{ClientConfig, DEFAULT_RELAY_URL, RelayClient};
pub use errors::ClientError;
pub use reader::{ClientAccumulator, read_incremental};
