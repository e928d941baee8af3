//! Library surface for the mixing protocol core. `main.rs` wires these
//! modules into a running node; tests and other binaries depend on this
//! crate directly.

pub mod address;
pub mod client;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod denom;
pub mod entry;
pub mod error;
pub mod network;
pub mod network_type;
pub mod queue;
pub mod scheduler;
pub mod session;
pub mod shutdown;
pub mod signer;
pub mod types;
pub mod wallet;
