//! greetmesh-services — directory adapters, peer registry, greeting
//! transport, and the reconciliation loop that ties them together.

pub mod consul;
pub mod directory;
pub mod node;
pub mod reconciler;
pub mod registry;
pub mod transport;

pub use consul::ConsulDirectory;
pub use directory::{Directory, DirectoryError, MemoryDirectory};
pub use node::{Node, NodeError};
pub use reconciler::{CycleOutcome, CycleReport, MeshReconciler};
pub use registry::{PeerEntry, PeerRegistry};
pub use transport::{GreetingServer, GreetingSession, GreetingTransport, TcpTransport, TransportError};
