//! The server's record of one connected client.
//!
//! A [`Session`] is created when a connection is accepted and lives until
//! the connection closes or the session is kicked. It owns:
//! - the outbound queue (drained by the connection's writer task),
//! - the account, attached once by the `auth` handshake,
//! - the character, attached once by `select`,
//! - a typed state bag for per-session protocol state such as an open shop.
//!
//! Sessions are shared as `Arc<Session>`. Every method takes `&self`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard};
use realmforge_protocol::{Packet, encode};
use serde::Deserialize;
use tokio::sync::{Notify, mpsc};

use crate::{Account, Character, RegionType, SessionError};

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next free id.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Connection-level timeouts and the protocol version clients must speak.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds a new connection has to complete the `auth` handshake.
    pub handshake_timeout_secs: u64,

    /// Seconds without any inbound line before the connection is dropped.
    /// Zero disables the idle timeout.
    pub idle_timeout_secs: u64,

    /// The only `auth` version the server accepts.
    pub protocol_version: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 10,
            idle_timeout_secs: 300,
            protocol_version: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

type StateBag = HashMap<TypeId, Box<dyn Any + Send>>;

/// One connected client.
pub struct Session {
    id: SessionId,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    account: OnceLock<Account>,
    character: OnceLock<Arc<Character>>,
    closed: AtomicBool,
    close_signal: Notify,
    state: Mutex<StateBag>,
    turn: Mutex<()>,
}

impl Session {
    /// Creates a session and the receiving end of its outbound queue.
    ///
    /// The receiver belongs to whoever writes to the transport. It yields
    /// lines in exactly the order [`send`](Self::send) accepted them and
    /// ends once the session is closed.
    pub fn new(id: SessionId) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            id,
            outbound: Mutex::new(Some(tx)),
            account: OnceLock::new(),
            character: OnceLock::new(),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
            state: Mutex::new(HashMap::new()),
            turn: Mutex::new(()),
        };
        (session, rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Held while one of this session's lines is being handled. Work done
    /// on the session from elsewhere takes it to wait for that line.
    ///
    /// Not reentrant: a handler must not take its own session's turn.
    pub fn turn(&self) -> MutexGuard<'_, ()> {
        self.turn.lock()
    }

    // -- Outbound ----------------------------------------------------------

    /// Encodes and queues a packet.
    ///
    /// Never fails from the caller's point of view: an unencodable packet
    /// or a closed session is logged and the packet dropped.
    pub fn send<P: Packet>(&self, packet: &P) {
        match encode(packet) {
            Ok(line) => self.send_line(line),
            Err(e) => tracing::error!(
                session_id = %self.id,
                keyword = P::descriptor().keyword(),
                error = %e,
                "refusing to send unencodable packet"
            ),
        }
    }

    /// Queues an already encoded line.
    pub fn send_line(&self, line: String) {
        let outbound = self.outbound.lock();
        let delivered = outbound.as_ref().is_some_and(|tx| tx.send(line).is_ok());
        if !delivered {
            tracing::trace!(session_id = %self.id, "dropping line for closed session");
        }
    }

    // -- Lifecycle ---------------------------------------------------------

    /// Closes the session. The outbound queue ends once drained and
    /// everyone waiting in [`closed`](Self::closed) wakes up.
    ///
    /// Returns `false` if the session was already closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.outbound.lock().take();
        self.close_signal.notify_waiters();
        true
    }

    /// Closes the session on the server's initiative.
    pub fn kick(&self, reason: &str) {
        if self.close() {
            tracing::info!(session_id = %self.id, reason, "session kicked");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the session is closed.
    pub async fn closed(&self) {
        let notified = self.close_signal.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    // -- Identity ----------------------------------------------------------

    /// Attaches the authenticated account. Happens once per session.
    pub fn attach_account(&self, account: Account) -> Result<(), SessionError> {
        self.account
            .set(account)
            .map_err(|_| SessionError::AlreadyAuthenticated(self.id))
    }

    /// Attaches the character played on this session. Happens once per
    /// session and only for a character of the attached account.
    pub fn attach_character(&self, character: Arc<Character>) -> Result<(), SessionError> {
        match self.account.get() {
            Some(account) if account.id == character.account_id => {}
            _ => return Err(SessionError::ForeignCharacter(character.visual_id)),
        }
        self.character
            .set(character)
            .map_err(|_| SessionError::CharacterAlreadyAttached(self.id))
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.get()
    }

    pub fn character(&self) -> Option<&Arc<Character>> {
        self.character.get()
    }

    pub fn is_authenticated(&self) -> bool {
        self.account.get().is_some()
    }

    pub fn is_in_game(&self) -> bool {
        self.character.get().is_some()
    }

    /// The account's region, English before authentication.
    pub fn region(&self) -> RegionType {
        self.account.get().map(|a| a.region).unwrap_or_default()
    }

    // -- State bag ---------------------------------------------------------

    /// Runs `f` on the session's `T`, creating it with `T::default()` first
    /// if the session has none.
    ///
    /// `f` runs under the bag's lock and must not touch the bag again.
    pub fn with_state<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Default + Send + 'static,
    {
        let key = TypeId::of::<T>();
        let mut bag = self.state.lock();
        let mut value: Box<T> = bag
            .remove(&key)
            .and_then(|boxed| boxed.downcast().ok())
            .unwrap_or_default();
        let result = f(&mut value);
        bag.insert(key, value);
        result
    }

    /// Removes and returns the session's `T`.
    pub fn take_state<T: Send + 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn has_state<T: Send + 'static>(&self) -> bool {
        self.state.lock().contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("account", &self.account.get().map(|a| a.id))
            .field("character", &self.character.get().map(|c| c.visual_id))
            .field("closed", &self.is_closed())
            .finish()
    }
}
