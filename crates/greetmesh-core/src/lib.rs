//! greetmesh-core — shared identity, wire format, and configuration types.
//! All other greetmesh crates depend on this one.

pub mod config;
pub mod identity;
pub mod wire;

pub use config::{ConfigError, MeshConfig};
pub use identity::{IdentityError, PeerIdentity};
pub use wire::{GreetingReply, GreetingRequest, WireError};
