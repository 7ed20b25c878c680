//! TCP listener
//!
//! Accepts connections and spawns one task per connection, each running its
//! own [`ConnectionWorker`]. Connections share only the account allow-list
//! and the [`ServerContext`].

use crate::config::{Account, ServerConfig};
use crate::context::ServerContext;
use crate::error::ServerError;
use crate::worker::{ConnectionId, ConnectionWorker};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Bound server, ready to accept
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    accounts: Arc<[Account]>,
    context: ServerContext,
    payload_timeout: Option<Duration>,
}

impl Server {
    /// Validate `config` and bind its listen address
    ///
    /// # Errors
    /// - `ServerError::Config` if the configuration is invalid
    /// - `ServerError::Bind` if the address cannot be bound
    pub async fn bind(config: &ServerConfig, context: ServerContext) -> Result<Self, ServerError> {
        config.validate()?;
        let addr = config.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.listen.clone(),
                source,
            })?;

        Ok(Self {
            listener,
            accounts: config.accounts.clone().into(),
            context,
            payload_timeout: config.payload_timeout(),
        })
    }

    /// Address actually bound (useful with port 0)
    ///
    /// # Errors
    /// Returns the socket's IO error
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared state handed to every connection
    #[must_use]
    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    /// Accept connections forever
    pub async fn serve(self) {
        self.serve_until(std::future::pending()).await;
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Connections already running are left to finish on their own.
    pub async fn serve_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("listener shutting down");
                    return;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_worker(stream, peer),
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
            }
        }
    }

    fn spawn_worker(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let id = ConnectionId::new();
        tracing::debug!(connection = %id, %peer, "accepted connection");

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(connection = %id, error = %e, "cannot disable nagle");
        }

        let worker = ConnectionWorker::new(stream, Arc::clone(&self.accounts), self.context.clone())
            .with_id(id)
            .with_payload_timeout(self.payload_timeout);
        tokio::spawn(worker.run());
    }
}
