//! Node — owns the identity and wires directory, transport and reconciler
//! together.
//!
//! Startup order: bind the greeting listener, register with the directory,
//! then run the greeting server and the reconciler side by side until
//! shutdown. A failure in either of the first two steps is fatal.

use tokio::sync::broadcast;

use greetmesh_core::{GreetingReply, MeshConfig, PeerIdentity};

use crate::directory::{Directory, DirectoryError};
use crate::reconciler::MeshReconciler;
use crate::transport::{GreetingServer, GreetingTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("cannot start greeting server: {0}")]
    Listen(#[source] TransportError),
    #[error("cannot register {name} with the directory: {source}")]
    Register {
        name: String,
        #[source]
        source: DirectoryError,
    },
}

pub struct Node<D, T> {
    identity: PeerIdentity,
    directory: D,
    transport: T,
    config: MeshConfig,
}

impl<D: Directory, T: GreetingTransport> Node<D, T> {
    pub fn new(identity: PeerIdentity, directory: D, transport: T, config: MeshConfig) -> Self {
        Self {
            identity,
            directory,
            transport,
            config,
        }
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    /// Inbound greeting handler. Stateless: it only reports our own name
    /// and never touches the peer registry.
    pub fn greeting_handler(&self) -> impl Fn(&str) -> GreetingReply + Send + Sync + 'static {
        let name = self.identity.name().to_string();
        move |from: &str| {
            tracing::info!(from = %from, "greeted by peer");
            GreetingReply::from_responder(&name)
        }
    }

    /// Publish our own record in the directory.
    pub async fn register(&self) -> Result<(), NodeError> {
        let name = self.identity.name();
        let namespace = &self.config.directory.namespace;
        if !name.starts_with(namespace.as_str()) {
            tracing::warn!(
                name,
                namespace = %namespace,
                "name is outside the listed namespace; other nodes will not discover us"
            );
        }

        // Same-name records are overwritten, not refused. Flag it at least.
        match self.directory.list(name).await {
            Ok(records) => {
                if let Some(existing) = records
                    .iter()
                    .find(|r| r.name() == name && r.address() != self.identity.address())
                {
                    tracing::warn!(
                        name,
                        existing_addr = %existing.address(),
                        our_addr = %self.identity.address(),
                        "another node already registered this name; overwriting its record"
                    );
                }
            }
            Err(e) => {
                tracing::debug!(name, error = %e, "could not check for a name collision");
            }
        }

        self.directory
            .register(&self.identity)
            .await
            .map_err(|source| NodeError::Register {
                name: name.to_string(),
                source,
            })?;
        tracing::info!(name, addr = %self.identity.address(), "registered with directory");
        Ok(())
    }

    pub fn into_reconciler(self) -> MeshReconciler<D, T> {
        MeshReconciler::new(self.identity, self.directory, self.transport, &self.config)
    }

    /// Bind, register, then serve and reconcile until `shutdown` fires.
    pub async fn run(self, shutdown: &broadcast::Sender<()>) -> Result<(), NodeError> {
        let server = GreetingServer::bind(self.identity.address())
            .await
            .map_err(NodeError::Listen)?;
        self.register().await?;

        let handler = self.greeting_handler();
        let server_rx = shutdown.subscribe();
        let reconciler_rx = shutdown.subscribe();

        tokio::join!(
            server.serve(handler, server_rx),
            self.into_reconciler().run(reconciler_rx),
        );
        Ok(())
    }
}
