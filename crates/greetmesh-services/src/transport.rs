//! Greeting transport — one request/reply exchange over TCP.
//!
//! Client side: `connect` opens a session, `greet` sends our name and waits
//! for the peer's greeting. Server side: `GreetingServer` accepts sessions
//! and answers every request with whatever the injected handler returns.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use greetmesh_core::config::TransportConfig;
use greetmesh_core::wire::{read_frame, write_frame};
use greetmesh_core::{GreetingReply, GreetingRequest, WireError};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{op} with {addr} timed out after {after:?}")]
    Timeout {
        op: &'static str,
        addr: String,
        after: Duration,
    },
    #[error("greeting exchange with {addr} failed: {source}")]
    Exchange {
        addr: String,
        #[source]
        source: WireError,
    },
}

/// Client half of the greeting RPC.
///
/// The caller owns every handle `connect` returns. Dropping a handle
/// releases it; it can never be used again afterwards.
pub trait GreetingTransport: Send + Sync {
    type Handle: Send + 'static;

    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Handle, TransportError>> + Send;

    /// Send one request carrying `self_name`. No internal retry.
    fn greet(
        &self,
        handle: &mut Self::Handle,
        self_name: &str,
    ) -> impl Future<Output = Result<GreetingReply, TransportError>> + Send;
}

// ── TCP client ────────────────────────────────────────────────────────────────

/// An open greeting session with one peer.
#[derive(Debug)]
pub struct GreetingSession {
    stream: TcpStream,
    address: String,
}

impl GreetingSession {
    /// The address this session was opened to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Shut the write half down cleanly and release the session.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(addr = %self.address, error = %e, "session shutdown failed");
        }
    }
}

#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
    greet_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration, greet_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            greet_timeout,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.connect_timeout(), config.greet_timeout())
    }
}

impl GreetingTransport for TcpTransport {
    type Handle = GreetingSession;

    async fn connect(&self, address: &str) -> Result<GreetingSession, TransportError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| TransportError::Timeout {
                op: "connect",
                addr: address.to_string(),
                after: self.connect_timeout,
            })?
            .map_err(|source| TransportError::Connect {
                addr: address.to_string(),
                source,
            })?;
        let _ = stream.set_nodelay(true);

        Ok(GreetingSession {
            stream,
            address: address.to_string(),
        })
    }

    async fn greet(
        &self,
        handle: &mut GreetingSession,
        self_name: &str,
    ) -> Result<GreetingReply, TransportError> {
        let addr = handle.address.clone();
        let request = GreetingRequest {
            name: self_name.to_string(),
        };
        let stream = &mut handle.stream;
        let exchange = async move {
            write_frame(&mut *stream, &request).await?;
            read_frame::<_, GreetingReply>(&mut *stream)
                .await?
                .ok_or(WireError::Closed)
        };

        let result = tokio::time::timeout(self.greet_timeout, exchange).await;
        match result {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(source)) => Err(TransportError::Exchange { addr, source }),
            Err(_) => Err(TransportError::Timeout {
                op: "greet",
                addr,
                after: self.greet_timeout,
            }),
        }
    }
}

// ── TCP server ────────────────────────────────────────────────────────────────

/// Answers greeting requests on a bound listener.
pub struct GreetingServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl GreetingServer {
    /// Bind the listen address. Failure here is fatal for a node.
    pub async fn bind(address: &str) -> Result<Self, TransportError> {
        let bind_err = |source| TransportError::Bind {
            addr: address.to_string(),
            source,
        };
        let listener = TcpListener::bind(address).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept sessions until shutdown, answering each request with
    /// `handler(requester_name)`.
    pub async fn serve<F>(self, handler: F, mut shutdown: broadcast::Receiver<()>)
    where
        F: Fn(&str) -> GreetingReply + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        tracing::info!(addr = %self.local_addr, "greeting server listening");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("greeting server shutting down");
                    return;
                }

                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(a) => a,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    tracing::debug!(peer = %peer, "inbound session");
                    tokio::spawn(serve_session(stream, peer, handler.clone()));
                }
            }
        }
    }
}

async fn serve_session<F>(mut stream: TcpStream, peer: SocketAddr, handler: Arc<F>)
where
    F: Fn(&str) -> GreetingReply + Send + Sync + 'static,
{
    loop {
        let request = match read_frame::<_, GreetingRequest>(&mut stream).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                tracing::trace!(peer = %peer, "session closed by peer");
                return;
            }
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "dropping session on bad frame");
                return;
            }
        };

        let reply = handler(&request.name);
        if let Err(e) = write_frame(&mut stream, &reply).await {
            tracing::debug!(peer = %peer, error = %e, "failed to write greeting reply");
            return;
        }
    }
}
