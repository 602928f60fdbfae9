//! Routing of inbound lines to handlers.
//!
//! A [`Dispatcher`] pairs the client [`PacketRegistry`] with one handler per
//! packet type. It is assembled once at startup with
//! [`DispatcherBuilder::bind`]; binding a second handler to the same packet
//! type is a fatal startup error, while a packet type nobody handles only
//! earns a warning and its lines are dropped.
//!
//! At runtime each line goes through the same steps:
//!
//! ```text
//!   keyword ──→ descriptor ──→ decode ──→ handler? ──→ requirement ──→ handler(ctx, session, packet)
//!     │ unknown               │ error      │ none        │ unmet
//!     └──────── logged and dropped, the connection stays open ────────┘
//! ```
//!
//! Handlers run synchronously on the session's [`SessionQueue`], so two
//! lines of one session never run at the same time while different
//! sessions run in parallel.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use realmforge_protocol::{
    AnyPacket, Packet, PacketRegistry, RegistryError, Requirement, keyword_of,
};
use realmforge_session::Session;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::GameContext;

type BoxedHandler = Box<dyn Fn(&GameContext, &Arc<Session>, AnyPacket) + Send + Sync>;

struct Binding {
    type_name: &'static str,
    handler: BoxedHandler,
}

/// What happened to one inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// The packet decoded but no handler is bound to its type.
    Unhandled,
    UnknownKeyword,
    DecodeFailed,
    PreconditionFailed(Requirement),
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct DispatcherBuilder {
    registry: PacketRegistry,
    handlers: HashMap<TypeId, Binding>,
}

impl DispatcherBuilder {
    pub fn new(registry: PacketRegistry) -> Self {
        Self {
            registry,
            handlers: HashMap::new(),
        }
    }

    /// Binds `handler` to packet type `P`.
    ///
    /// # Errors
    /// - [`RegistryError::UnregisteredPacket`] if the registry doesn't know `P`
    /// - [`RegistryError::DuplicateHandler`] if `P` already has a handler
    pub fn bind<P, F>(mut self, handler: F) -> Result<Self, RegistryError>
    where
        P: Packet,
        F: Fn(&GameContext, &Arc<Session>, P) + Send + Sync + 'static,
    {
        let type_id = TypeId::of::<P>();
        let type_name = std::any::type_name::<P>();
        if self.registry.find_type(type_id).is_none() {
            return Err(RegistryError::UnregisteredPacket(type_name));
        }
        if self.handlers.contains_key(&type_id) {
            return Err(RegistryError::DuplicateHandler(type_name));
        }

        let boxed: BoxedHandler = Box::new(
            move |ctx: &GameContext, session: &Arc<Session>, packet: AnyPacket| {
                match packet.downcast::<P>() {
                    Ok(packet) => handler(ctx, session, *packet),
                    Err(_) => {
                        tracing::error!(packet = type_name, "decoded packet has the wrong type")
                    }
                }
            },
        );
        self.handlers.insert(
            type_id,
            Binding {
                type_name,
                handler: boxed,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> Dispatcher {
        for entry in self.registry.iter() {
            if !self.handlers.contains_key(&entry.type_id) {
                tracing::warn!(
                    keyword = entry.descriptor.keyword(),
                    packet = entry.type_name,
                    "packet type has no handler, its lines will be dropped"
                );
            }
        }
        tracing::debug!(handlers = self.handlers.len(), "dispatcher built");
        Dispatcher {
            registry: self.registry,
            handlers: self.handlers,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    registry: PacketRegistry,
    handlers: HashMap<TypeId, Binding>,
}

impl Dispatcher {
    pub fn builder(registry: PacketRegistry) -> DispatcherBuilder {
        DispatcherBuilder::new(registry)
    }

    pub fn registry(&self) -> &PacketRegistry {
        &self.registry
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Routes one line. Never fails: anything that can't be handled is
    /// logged and reported in the outcome.
    pub fn dispatch(&self, ctx: &GameContext, session: &Arc<Session>, line: &str) -> DispatchOutcome {
        let session_id = session.id();
        let keyword = keyword_of(line);
        let Some(entry) = self.registry.get(keyword) else {
            tracing::debug!(%session_id, keyword, "unknown keyword, line dropped");
            return DispatchOutcome::UnknownKeyword;
        };

        let packet = match entry.decode(line) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(%session_id, raw_line = line, error = %e, "undecodable line dropped");
                return DispatchOutcome::DecodeFailed;
            }
        };

        let Some(binding) = self.handlers.get(&entry.type_id) else {
            tracing::trace!(%session_id, keyword, "no handler bound");
            return DispatchOutcome::Unhandled;
        };

        let requirement = entry.descriptor.requirement();
        if !is_met(requirement, session) {
            tracing::debug!(%session_id, keyword, ?requirement, "precondition not met, line dropped");
            return DispatchOutcome::PreconditionFailed(requirement);
        }

        tracing::trace!(%session_id, packet = binding.type_name, "dispatching");
        let _turn = session.turn();
        (binding.handler)(ctx, session, packet);
        DispatchOutcome::Handled
    }
}

fn is_met(requirement: Requirement, session: &Session) -> bool {
    match requirement {
        Requirement::None => true,
        Requirement::Authenticated => session.is_authenticated(),
        Requirement::InGame => session.is_in_game(),
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("packets", &self.registry.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SessionQueue
// ---------------------------------------------------------------------------

/// The single consumer that dispatches one session's lines in arrival order.
///
/// Lines still queued when the session closes are discarded; the line
/// being handled at that moment runs to completion.
pub struct SessionQueue {
    tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl SessionQueue {
    pub fn spawn(
        dispatcher: Arc<Dispatcher>,
        ctx: Arc<GameContext>,
        session: Arc<Session>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let task = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if session.is_closed() {
                    break;
                }
                dispatcher.dispatch(&ctx, &session, &line);
            }
        });
        Self { tx, task }
    }

    /// Queues a line. Returns `false` once the worker has stopped.
    pub fn push(&self, line: String) -> bool {
        self.tx.send(line).is_ok()
    }

    /// Stops accepting lines and waits for the worker to finish.
    pub async fn finish(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "session worker failed");
        }
    }
}
