use greetmesh_core::PeerIdentity;
use greetmesh_services::{CycleOutcome, Directory, MemoryDirectory};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Mesh formation
// ══════════════════════════════════════════════════════════════════════════════

/// A, B and C register in that order, then every node runs two cycles.
/// Each ends up knowing exactly the other two.
#[tokio::test]
async fn test_three_nodes_form_full_mesh() {
    let dir = MemoryDirectory::new();
    let mut a = start_node("NodeA", dir.clone()).await.unwrap();
    let mut b = start_node("NodeB", dir.clone()).await.unwrap();
    let mut c = start_node("NodeC", dir.clone()).await.unwrap();

    for _ in 0..2 {
        a.cycle().await;
        b.cycle().await;
        c.cycle().await;
    }

    assert_eq!(a.peers(), ["NodeB", "NodeC"]);
    assert_eq!(b.peers(), ["NodeA", "NodeC"]);
    assert_eq!(c.peers(), ["NodeA", "NodeB"]);
}

/// Nodes join one at a time, each cycling once right after joining.
/// Early joiners only learn about later ones on their second cycle.
#[tokio::test]
async fn test_staggered_join_converges_on_second_cycle() {
    let dir = MemoryDirectory::new();

    let mut a = start_node("NodeA", dir.clone()).await.unwrap();
    a.cycle().await;
    let mut b = start_node("NodeB", dir.clone()).await.unwrap();
    b.cycle().await;
    let mut c = start_node("NodeC", dir.clone()).await.unwrap();
    c.cycle().await;

    assert!(a.peers().is_empty());
    assert_eq!(b.peers(), ["NodeA"]);
    assert_eq!(c.peers(), ["NodeA", "NodeB"]);

    a.cycle().await;
    b.cycle().await;
    c.cycle().await;

    assert_eq!(a.peers(), ["NodeB", "NodeC"]);
    assert_eq!(b.peers(), ["NodeA", "NodeC"]);
    assert_eq!(c.peers(), ["NodeA", "NodeB"]);
}

/// Replies carry the responder's name in the fixed template.
#[tokio::test]
async fn test_greeting_names_the_responder() {
    let dir = MemoryDirectory::new();
    let mut a = start_node("NodeA", dir.clone()).await.unwrap();
    let _b = start_node("NodeB", dir.clone()).await.unwrap();
    let _c = start_node("NodeC", dir.clone()).await.unwrap();

    a.cycle().await;

    let registry = a.reconciler.registry();
    assert_eq!(registry.get("NodeB").unwrap().greeting, "Hello from NodeB");
    assert_eq!(registry.get("NodeC").unwrap().greeting, "Hello from NodeC");
}

/// The responder does not learn about the requester from the greeting.
#[tokio::test]
async fn test_greeting_is_one_directional() {
    let dir = MemoryDirectory::new();
    let mut a = start_node("NodeA", dir.clone()).await.unwrap();
    let b = start_node("NodeB", dir.clone()).await.unwrap();

    a.cycle().await;

    assert_eq!(a.peers(), ["NodeB"]);
    assert!(b.peers().is_empty());
}

/// A stable mesh stops changing once converged.
#[tokio::test]
async fn test_converged_mesh_stays_constant() {
    let dir = MemoryDirectory::new();
    let mut nodes = Vec::new();
    for name in ["NodeA", "NodeB", "NodeC", "NodeD"] {
        nodes.push(start_node(name, dir.clone()).await.unwrap());
    }

    for _ in 0..4 {
        for node in nodes.iter_mut() {
            node.cycle().await;
        }
        for node in &nodes {
            assert_eq!(node.peers().len(), 3, "{} did not converge", node.name());
        }
    }

    let outcome = nodes[0].reconciler.reconcile_once().await;
    match outcome {
        CycleOutcome::Completed(report) => {
            assert_eq!(report.listed, 4);
            assert_eq!(report.unseen, 0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

/// Records outside the namespace are never contacted.
#[tokio::test]
async fn test_records_outside_namespace_are_ignored() {
    let dir = MemoryDirectory::new();
    let mut a = start_node("NodeA", dir.clone()).await.unwrap();
    let outsider = start_node("Gateway", dir.clone()).await.unwrap();

    a.cycle().await;

    assert!(a.peers().is_empty());
    assert_eq!(
        dir.get("Gateway").await.as_deref(),
        Some(outsider.address())
    );
}

/// Registering the same identity twice leaves one record.
#[tokio::test]
async fn test_self_registration_is_idempotent() {
    let dir = MemoryDirectory::new();
    let a = start_node("NodeA", dir.clone()).await.unwrap();

    let me = PeerIdentity::new(a.name(), a.address()).unwrap();
    dir.register(&me).await.unwrap();

    let listing = dir.list("Node").await.unwrap();
    assert_eq!(listing, vec![me]);
}
