//! Query conversation relay
//!
//! A WebSocket relay built with tokio-tungstenite. Clients authenticate
//! into a conversation ("query"), send text messages, and every message is
//! written to a store before it is broadcast to the other participants.
//!
//! # Features
//! - WebSocket connection handling
//! - `auth` into any number of conversations per connection
//! - Store-then-broadcast chat messages, never echoed to the sender
//! - Best-effort delivery with a per-send timeout
//! - Registry cleanup on disconnect
//!
//! # Architecture
//! - `Registry` is a mutex-guarded map shared by all connection tasks
//! - `Router` snapshots peers from the registry and sends outside the lock
//! - `ConversationLocks` keeps store-then-route ordered within a conversation
//! - Each connection has a `Session` driven by the `handler` read loop, and
//!   a writer task draining its outbound queue
//! - `MessageStore` is the persistence port (`SqliteStore`, `MemoryStore`)
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use query_relay::{serve, MemoryStore, Relay, RelaySettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8765").await.unwrap();
//!     let relay = Relay::new(Arc::new(MemoryStore::new()), RelaySettings::default());
//!     serve(listener, Arc::new(relay)).await;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod message;
pub mod ordering;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use config::Config;
pub use connection::Connection;
pub use error::{AppError, SendError, StoreError};
pub use handler::handle_connection;
pub use message::{ClientMessage, ServerMessage};
pub use ordering::ConversationLocks;
pub use registry::Registry;
pub use router::{RouteReport, Router};
pub use server::{serve, Relay, RelaySettings};
pub use session::{Session, SessionState};
pub use store::{MemoryStore, MessageRecord, MessageStore, SqliteStore};
pub use types::{ConnectionId, ConversationId, Identifier, ParticipantId, ParticipantRole};
