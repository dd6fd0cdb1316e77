//! Lycan server: the glue that wires the engine to WebSocket clients.
//!
//! # Architecture
//!
//! ```text
//! WebSocketListener ──accept──▶ handle_connection (one task per client)
//!                                     │
//!                                     ▼
//!                               RoomManager (shared, cheap to clone)
//!                                     │
//!                                     ▼
//!                               RecordStore ──change feed──▶ subscribed clients
//! ```
//!
//! The server holds no room state of its own. Every connection task talks
//! to the same [`RoomManager`], and deadline drivers live inside its
//! scheduler.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lycan_protocol::{Codec, JsonCodec};
use lycan_room::{EngineConfig, RoomManager};
use lycan_store::{MemoryStore, RecordStore};
use tokio::task::JoinHandle;

use crate::LycanError;
use crate::TransportError;
use crate::handler::handle_connection;
use crate::transport::WebSocketListener;

/// Connections that send nothing for this long are closed.
const DEFAULT_CONNECTION_IDLE: Duration = Duration::from_secs(300);

/// State shared by every connection task.
pub(crate) struct ServerState<S: RecordStore, C: Codec> {
    pub(crate) rooms: RoomManager<S>,
    pub(crate) codec: C,
    pub(crate) connection_idle: Duration,
}

/// Builder for a [`LycanServer`].
///
/// ```rust,no_run
/// use lycan::prelude::*;
///
/// # async fn run() -> Result<(), LycanError> {
/// let server = LycanServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build_in_memory()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct LycanServerBuilder {
    bind_addr: String,
    engine: EngineConfig,
    connection_idle: Duration,
}

impl LycanServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            engine: EngineConfig::default(),
            connection_idle: DEFAULT_CONNECTION_IDLE,
        }
    }

    /// Address to listen on. Port 0 picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Limits, durations, and housekeeping intervals of the engine.
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    pub fn connection_idle_timeout(mut self, timeout: Duration) -> Self {
        self.connection_idle = timeout;
        self
    }

    /// Binds the listener and restores deadline drivers for rooms already
    /// in play in `store`.
    pub async fn build<S: RecordStore>(
        self,
        store: Arc<S>,
    ) -> Result<LycanServer<S, JsonCodec>, LycanError> {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;
        let rooms = RoomManager::new(store, self.engine);
        let resumed = rooms.resume().await?;
        if resumed > 0 {
            tracing::info!(resumed, "resumed phase drivers");
        }

        Ok(LycanServer {
            listener,
            state: Arc::new(ServerState {
                rooms,
                codec: JsonCodec,
                connection_idle: self.connection_idle,
            }),
        })
    }

    /// [`Self::build`] over a fresh [`MemoryStore`].
    pub async fn build_in_memory(self) -> Result<LycanServer<MemoryStore, JsonCodec>, LycanError> {
        self.build(Arc::new(MemoryStore::new())).await
    }
}

impl Default for LycanServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound server, ready to [`run`](Self::run).
pub struct LycanServer<S: RecordStore, C: Codec> {
    listener: WebSocketListener,
    state: Arc<ServerState<S, C>>,
}

impl<S: RecordStore, C: Codec> LycanServer<S, C> {
    /// The actual bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr()
    }

    /// The engine behind this server, for in-process callers.
    pub fn rooms(&self) -> &RoomManager<S> {
        &self.state.rooms
    }

    /// Accepts connections until the task is dropped. Also runs the idle
    /// room reaper for as long as it runs.
    pub async fn run(self) -> Result<(), LycanError> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "lycan server running");
        let _reaper = AbortOnDrop(self.state.rooms.spawn_reaper());

        loop {
            let conn = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let conn_id = conn.id();
                if let Err(e) = handle_connection(conn, state).await {
                    tracing::debug!(%conn_id, error = %e, "connection ended with error");
                }
            });
        }
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
