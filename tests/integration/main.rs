//! greetmesh integration test harness.
//!
//! Nodes in these tests are real: each binds a greeting server on an
//! ephemeral loopback port and talks TCP to its peers. The directory is
//! either the in-process `MemoryDirectory` or a mock of the Consul KV HTTP
//! API served locally.
//!
//!   cargo test --test integration
//!
//! Reconciliation cycles are driven by hand through `reconcile_once` so
//! every test is deterministic about how many cycles have run.

mod mesh;

use std::time::Duration;

use anyhow::Result;
use tokio::sync::broadcast;

use greetmesh_core::{MeshConfig, PeerIdentity};
use greetmesh_services::{
    Directory, GreetingServer, MeshReconciler, Node, TcpTransport,
};

// ── Harness ───────────────────────────────────────────────────────────────────

pub fn test_config() -> MeshConfig {
    let mut config = MeshConfig::default();
    config.reconcile.interval_ms = 20;
    config.transport.connect_timeout_ms = 500;
    config.transport.greet_timeout_ms = 500;
    config
}

pub fn transport() -> TcpTransport {
    TcpTransport::from_config(&test_config().transport)
}

/// A live node: greeting server running, record registered, reconciler
/// ready to be stepped.
pub struct TestNode<D: Directory> {
    pub reconciler: MeshReconciler<D, TcpTransport>,
    shutdown: broadcast::Sender<()>,
}

impl<D: Directory> TestNode<D> {
    pub fn name(&self) -> &str {
        self.reconciler.identity().name()
    }

    pub fn address(&self) -> &str {
        self.reconciler.identity().address()
    }

    pub fn peers(&self) -> Vec<String> {
        self.reconciler.registry().names()
    }

    pub async fn cycle(&mut self) {
        self.reconciler.reconcile_once().await;
    }
}

impl<D: Directory> Drop for TestNode<D> {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

/// Bind a greeting server on an ephemeral port, register, and return the
/// node with its reconciler not yet run.
pub async fn start_node<D: Directory>(name: &str, directory: D) -> Result<TestNode<D>> {
    let server = GreetingServer::bind("127.0.0.1:0").await?;
    let identity = PeerIdentity::new(name, server.local_addr().to_string())?;
    let node = Node::new(identity, directory, transport(), test_config());

    let (shutdown, _) = broadcast::channel(1);
    tokio::spawn(server.serve(node.greeting_handler(), shutdown.subscribe()));
    node.register().await?;

    Ok(TestNode {
        reconciler: node.into_reconciler(),
        shutdown,
    })
}

/// A loopback address nothing is listening on (yet).
pub async fn vacant_addr() -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.to_string())
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
