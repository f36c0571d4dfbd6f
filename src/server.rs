//! Relay server
//!
//! `Relay` is the state shared by every connection task: the registry, the
//! router built on it, and the message store. `serve` runs the accept loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::handler::handle_connection;
use crate::ordering::ConversationLocks;
use crate::registry::Registry;
use crate::router::Router;
use crate::store::MessageStore;

/// Default time a single outbound send may wait on a full queue
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of each connection's outbound queue
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

/// Tunables for connection handling
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub send_timeout: Duration,
    pub outbound_buffer: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

/// Shared relay state
pub struct Relay {
    registry: Arc<Registry>,
    router: Router,
    ordering: ConversationLocks,
    store: Arc<dyn MessageStore>,
    settings: RelaySettings,
}

impl Relay {
    /// Create a relay with an empty registry
    pub fn new(store: Arc<dyn MessageStore>, settings: RelaySettings) -> Self {
        let registry = Arc::new(Registry::new());
        let router = Router::new(registry.clone(), settings.send_timeout);
        Self {
            registry,
            router,
            ordering: ConversationLocks::new(),
            store,
            settings,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Locks that keep store-then-route ordered per conversation
    pub fn ordering(&self) -> &ConversationLocks {
        &self.ordering
    }

    pub fn store(&self) -> &dyn MessageStore {
        self.store.as_ref()
    }

    pub fn settings(&self) -> RelaySettings {
        self.settings
    }
}

/// Accept connections forever, one task per connection
pub async fn serve(listener: TcpListener, relay: Arc<Relay>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let relay = relay.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, relay).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
