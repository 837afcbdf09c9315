//! Mesh reconciler — the discovery loop.
//!
//! Every cycle lists the directory, drops our own record and every peer
//! already in the registry, then connects to and greets what is left, one
//! peer at a time in directory order. A peer lands in the registry only
//! after a successful greeting; any failure leaves it absent, so the next
//! cycle retries it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use greetmesh_core::{MeshConfig, PeerIdentity};

use crate::directory::Directory;
use crate::registry::{PeerEntry, PeerRegistry};
use crate::transport::{GreetingTransport, TransportError};

/// Counts from one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records returned by the directory, including our own.
    pub listed: usize,
    /// Peers that needed a greeting this cycle.
    pub unseen: usize,
    pub greeted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Listing failed; nothing else was attempted.
    DirectoryUnavailable,
    Completed(CycleReport),
}

pub struct MeshReconciler<D, T: GreetingTransport> {
    identity: PeerIdentity,
    namespace: String,
    interval: Duration,
    regreet_on_address_change: bool,
    directory: D,
    transport: T,
    registry: PeerRegistry<T::Handle>,
    /// Last advertised address we warned about, per known peer.
    drift_reported: HashMap<String, String>,
    cycles: u64,
}

impl<D: Directory, T: GreetingTransport> MeshReconciler<D, T> {
    pub fn new(identity: PeerIdentity, directory: D, transport: T, config: &MeshConfig) -> Self {
        Self {
            identity,
            namespace: config.directory.namespace.clone(),
            interval: config.reconcile.interval(),
            regreet_on_address_change: config.reconcile.regreet_on_address_change,
            directory,
            transport,
            registry: PeerRegistry::new(),
            drift_reported: HashMap::new(),
            cycles: 0,
        }
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn registry(&self) -> &PeerRegistry<T::Handle> {
        &self.registry
    }

    /// Completed or attempted cycles so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Cycle forever with a fixed delay between cycles, until shutdown.
    ///
    /// Hands the reconciler back so callers can inspect the final registry.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Self {
        tracing::info!(
            name = %self.identity.name(),
            namespace = %self.namespace,
            interval_ms = self.interval.as_millis() as u64,
            "mesh reconciler starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = self.reconcile_once() => {}
            }
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!(peers = self.registry.len(), "mesh reconciler shutting down");
        self
    }

    /// One Polling → Diffing → Connecting pass.
    pub async fn reconcile_once(&mut self) -> CycleOutcome {
        self.cycles += 1;
        let cycle = self.cycles;

        let listing = match self.directory.list(&self.namespace).await {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(cycle, error = %e, "directory listing failed, retrying next cycle");
                return CycleOutcome::DirectoryUnavailable;
            }
        };

        let listed = listing.len();
        let unseen = self.diff(listing);
        let mut report = CycleReport {
            listed,
            unseen: unseen.len(),
            ..CycleReport::default()
        };

        for peer in unseen {
            tracing::info!(cycle, peer = %peer.name(), addr = %peer.address(), "new neighbor");
            match self.establish(&peer).await {
                Ok(entry) => {
                    tracing::info!(
                        peer = %peer.name(),
                        greeting = %entry.greeting,
                        "greeting from the other node"
                    );
                    if let Some(old) = self.registry.put(peer.name(), entry) {
                        tracing::info!(
                            peer = %peer.name(),
                            old_addr = %old.address,
                            new_addr = %peer.address(),
                            "replaced session after address change"
                        );
                    }
                    self.drift_reported.remove(peer.name());
                    report.greeted += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        cycle,
                        peer = %peer.name(),
                        error = %e,
                        "could not greet peer, retrying next cycle"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            cycle,
            count = self.registry.len(),
            peers = ?self.registry.names(),
            "registry snapshot"
        );
        CycleOutcome::Completed(report)
    }

    /// Keep only the peers that still need a greeting, in listing order.
    fn diff(&mut self, listing: Vec<PeerIdentity>) -> Vec<PeerIdentity> {
        let mut unseen = Vec::new();

        for peer in listing {
            if peer.name() == self.identity.name() {
                continue;
            }
            let Some(known) = self.registry.get(peer.name()) else {
                unseen.push(peer);
                continue;
            };
            if known.address == peer.address() {
                continue;
            }

            if self.regreet_on_address_change {
                unseen.push(peer);
                continue;
            }
            let already_reported = self
                .drift_reported
                .get(peer.name())
                .is_some_and(|addr| addr == peer.address());
            if !already_reported {
                tracing::warn!(
                    peer = %peer.name(),
                    greeted_addr = %known.address,
                    advertised_addr = %peer.address(),
                    "known peer advertises a new address; keeping existing session"
                );
                self.drift_reported
                    .insert(peer.name().to_string(), peer.address().to_string());
            }
        }

        unseen
    }

    /// Connect and greet. The handle is dropped, and so released, on failure.
    async fn establish(&self, peer: &PeerIdentity) -> Result<PeerEntry<T::Handle>, TransportError> {
        let mut handle = self.transport.connect(peer.address()).await?;
        let reply = self
            .transport
            .greet(&mut handle, self.identity.name())
            .await?;

        Ok(PeerEntry {
            handle,
            address: peer.address().to_string(),
            greeting: reply.message,
            greeted_at: Instant::now(),
        })
    }
}
