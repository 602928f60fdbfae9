//! `RealmServer` builder and server loop.
//!
//! This is the entry point for running a Realmforge world server. It ties
//! together all the layers: transport → protocol → session → world, plus
//! the handlers and the services they share.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use realmforge_session::{Authenticator, Broadcaster, SessionConfig};
use realmforge_transport::{
    Connection, LineTransport, Transport, TransportError, WebSocketTransport,
};
use realmforge_world::{GameData, World};
use tokio::task::JoinSet;

use crate::config::ServerConfig;
use crate::connection::handle_connection;
use crate::context::GameContext;
use crate::directory::{ChannelDirectory, LocalOnlyDirectory};
use crate::dispatch::Dispatcher;
use crate::handlers;
use crate::language::Language;
use crate::store::{CharacterStore, InMemoryCharacterStore};
use crate::RealmError;

/// How long connections get to log their characters out on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<A: Authenticator> {
    pub(crate) ctx: Arc<GameContext>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) auth: A,
    pub(crate) session: SessionConfig,
}

/// Builder for configuring and starting a Realmforge server.
///
/// # Example
///
/// ```rust,ignore
/// let server = RealmServerBuilder::new(GameData::load("game_data.json")?)
///     .config(config)
///     .store(Arc::new(my_store))
///     .build_line(my_auth)
///     .await?;
/// server.run().await
/// ```
pub struct RealmServerBuilder {
    data: GameData,
    config: ServerConfig,
    store: Option<Arc<dyn CharacterStore>>,
    directory: Arc<dyn ChannelDirectory>,
    language: Language,
}

impl RealmServerBuilder {
    pub fn new(data: GameData) -> Self {
        Self {
            data,
            config: ServerConfig::default(),
            store: None,
            directory: Arc::new(LocalOnlyDirectory),
            language: Language::default(),
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Defaults to an empty [`InMemoryCharacterStore`].
    pub fn store(mut self, store: Arc<dyn CharacterStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`LocalOnlyDirectory`].
    pub fn directory(mut self, directory: Arc<dyn ChannelDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Starts the world and wires the handlers around an already bound
    /// transport. Must be called inside a Tokio runtime.
    pub fn build_with<T, A>(self, transport: T, auth: A) -> Result<RealmServer<T, A>, RealmError>
    where
        T: Transport<Error = TransportError>,
        T::Connection: Connection<Error = TransportError>,
        A: Authenticator,
    {
        let broadcaster = Arc::new(Broadcaster::new());
        let world = World::start(self.data, self.config.world.clone(), Arc::clone(&broadcaster))?;
        let ctx = Arc::new(GameContext {
            broadcaster,
            world: Arc::new(world),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryCharacterStore::new())),
            directory: self.directory,
            language: Arc::new(self.language),
            channel_id: self.config.channel_id,
        });
        let dispatcher = Arc::new(handlers::game_dispatcher()?);
        tracing::debug!(handlers = dispatcher.handler_count(), "dispatcher ready");

        let state = Arc::new(ServerState {
            ctx,
            dispatcher,
            auth,
            session: self.config.session,
        });
        Ok(RealmServer { transport, state })
    }

    /// Binds a raw TCP line transport to the configured address.
    pub async fn build_line<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<RealmServer<LineTransport, A>, RealmError> {
        let transport = LineTransport::bind(&self.config.bind).await?;
        self.build_with(transport, auth)
    }

    /// Binds a WebSocket transport to the configured address.
    pub async fn build_websocket<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<RealmServer<WebSocketTransport, A>, RealmError> {
        let transport = WebSocketTransport::bind(&self.config.bind).await?;
        self.build_with(transport, auth)
    }
}

/// A Realmforge world server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RealmServer<T: Transport, A: Authenticator> {
    transport: T,
    state: Arc<ServerState<A>>,
}

impl<T, A> RealmServer<T, A>
where
    T: Transport<Error = TransportError>,
    T::Connection: Connection<Error = TransportError>,
    A: Authenticator,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, RealmError> {
        Ok(self.transport.local_addr()?)
    }

    /// The services handlers run against. Useful to seed state or inspect
    /// it from outside.
    pub fn context(&self) -> &Arc<GameContext> {
        &self.state.ctx
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), RealmError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then kicks every
    /// player so their characters are saved, and stops the world.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), RealmError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Realmforge server running");
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
            while connections.try_join_next().is_some() {}
        }

        tracing::info!(connections = connections.len(), "shutting down");
        for session in self.state.ctx.broadcaster.find_all(|_| true) {
            session.kick("server shutting down");
        }
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(remaining = connections.len(), "connections still open after grace period");
            connections.abort_all();
        }
        self.state.ctx.world.shutdown();
        Ok(())
    }
}
