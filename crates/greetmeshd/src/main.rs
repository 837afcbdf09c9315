//! greetmeshd — greetmesh peer daemon.
//!
//! Usage: greetmeshd <node name> <listening addr> <directory addr>

use anyhow::{Context, Result};

use greetmesh_core::{MeshConfig, PeerIdentity};
use greetmesh_services::{ConsulDirectory, Node, TcpTransport};

const USAGE: &str = "Arguments required: <node name> <listening addr> <directory addr>";

struct Args {
    name: String,
    listen: String,
    directory: String,
}

impl Args {
    /// Three positional arguments, program name already skipped; anything
    /// beyond them is ignored.
    fn parse(mut args: impl Iterator<Item = String>) -> Option<Self> {
        Some(Self {
            name: args.next()?,
            listen: args.next()?,
            directory: args.next()?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let Some(args) = Args::parse(std::env::args().skip(1)) else {
        println!("{USAGE}");
        std::process::exit(1);
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = MeshConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        MeshConfig::default()
    });

    let identity =
        PeerIdentity::new(args.name, args.listen).context("invalid node identity")?;
    tracing::info!(
        name = %identity.name(),
        addr = %identity.address(),
        directory = %args.directory,
        "greetmeshd starting"
    );

    let directory = ConsulDirectory::new(&args.directory, config.directory.request_timeout())
        .context("failed to set up directory client")?;
    let transport = TcpTransport::from_config(&config.transport);
    let node = Node::new(identity, directory, transport, config);

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    if let Err(e) = node.run(&shutdown_tx).await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }

    tracing::info!("shut down");
    Ok(())
}
