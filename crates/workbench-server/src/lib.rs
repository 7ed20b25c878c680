//! Workbench Server - remote model upload and algorithm execution
//!
//! A line-oriented TCP protocol for feeding the shared workspace from a
//! remote client and running algorithms on it:
//!
//! ```text
//! client                                   server
//! login:<user>:<pass>\n           -->      (silent; retried freely on failure)
//! Model:<n>\n + n gzip bytes      -->
//!                                 <--      Success:0 | Error:0
//! Algorithm:<n>\n + n gzip bytes  -->
//!                                 <--      (Model:<m>\n + m gzip bytes)* | Error:0
//! ```
//!
//! # Layers
//! - [`codec`]: gzip-compressed XML payloads
//! - [`session`]: per-connection state machine, no IO
//! - [`executor`]: runs algorithms under per-model locks
//! - [`worker`]: drives one connection
//! - [`listener`]: accepts connections, one task each
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use workbench_core::{AlgorithmRegistry, ModelRegistry, OpaqueModel, Workspace};
//! use workbench_server::{Account, Server, ServerConfig, ServerContext};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::new().with_account(Account::new("alice", "secret"));
//! let context = ServerContext::new(
//!     Arc::new(Workspace::new()),
//!     ModelRegistry::new("model").with_fallback(OpaqueModel::deserializer()),
//!     AlgorithmRegistry::new("algorithm"),
//! );
//! Server::bind(&config, context).await?.serve().await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod listener;
pub mod protocol;
pub mod session;
pub mod telemetry;
pub mod worker;

pub use codec::{decode, encode, encode_model, EncodedPayload};
pub use config::{Account, ServerConfig};
pub use context::ServerContext;
pub use error::{
    ConfigError, ConnectionError, DecodeError, EncodeError, ExecutionError, RequestError,
    ServerError, StateMachineError,
};
pub use executor::JobExecutor;
pub use listener::Server;
pub use protocol::PayloadKind;
pub use session::{Session, SessionEvent, SessionPhase, SessionState};
pub use worker::{ConnectionId, ConnectionWorker, WorkerOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
