//! Per-connection handler: handshake, inbound loop and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Create the session and start the writer that drains its queue
//!   2. Receive `auth` → validate version, authenticate the token
//!   3. Loop: receive lines → queue them for the session's dispatch worker
//!   4. Close the session, let the worker finish, log the character out

use std::sync::Arc;
use std::time::Duration;

use realmforge_protocol::client::AuthPacket;
use realmforge_protocol::decode;
use realmforge_session::{Authenticator, Session, SessionConfig, SessionId};
use realmforge_transport::{Connection, TransportError};
use tokio::sync::mpsc;

use crate::RealmError;
use crate::dispatch::SessionQueue;
use crate::handlers;
use crate::language::LanguageKey;
use crate::server::ServerState;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, A>(
    conn: C,
    state: Arc<ServerState<A>>,
) -> Result<(), RealmError>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let (session, outbound) = Session::new(SessionId::next());
    let session = Arc::new(session);
    tracing::debug!(%conn_id, session_id = %session.id(), "handling new connection");

    let writer = tokio::spawn(write_loop(Arc::clone(&conn), outbound));

    let result = run_session(conn.as_ref(), &session, &state).await;

    // The writer drains what is still queued, then closes the connection.
    session.close();
    if let Err(e) = writer.await {
        tracing::error!(%conn_id, error = %e, "writer task failed");
    }
    result
}

async fn write_loop<C>(conn: Arc<C>, mut outbound: mpsc::UnboundedReceiver<String>)
where
    C: Connection<Error = TransportError>,
{
    while let Some(line) = outbound.recv().await {
        if let Err(e) = conn.send(&line).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, dropping the rest");
            break;
        }
    }
    if let Err(e) = conn.close().await {
        tracing::trace!(conn_id = %conn.id(), error = %e, "close failed");
    }
}

async fn run_session<C, A>(
    conn: &C,
    session: &Arc<Session>,
    state: &ServerState<A>,
) -> Result<(), RealmError>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
{
    perform_handshake(conn, session, state).await?;

    let queue = SessionQueue::spawn(
        Arc::clone(&state.dispatcher),
        Arc::clone(&state.ctx),
        Arc::clone(session),
    );
    let result = read_loop(conn, session, &queue, &state.session).await;

    session.close();
    queue.finish().await;
    handlers::logout(&state.ctx, session);
    tracing::info!(session_id = %session.id(), "session ended");
    result
}

/// Receives `auth`, checks the version and attaches the account.
///
/// A rejected client gets a notice before its connection is closed.
async fn perform_handshake<C, A>(
    conn: &C,
    session: &Session,
    state: &ServerState<A>,
) -> Result<(), RealmError>
where
    C: Connection<Error = TransportError>,
    A: Authenticator,
{
    let timeout = Duration::from_secs(state.session.handshake_timeout_secs);
    let line = match tokio::time::timeout(timeout, conn.recv()).await {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => {
            return Err(RealmError::Handshake("connection closed before auth".into()));
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(RealmError::Handshake("auth timed out".into())),
    };

    let auth: AuthPacket = decode(&line)?;
    let ctx = &state.ctx;
    let expected = state.session.protocol_version;
    if auth.version != expected {
        ctx.notify(session, LanguageKey::VersionMismatch, &[expected.to_string().as_str()]);
        return Err(RealmError::Handshake(format!(
            "version mismatch: expected {expected}, got {}",
            auth.version
        )));
    }

    let account = match state.auth.authenticate(&auth.token).await {
        Ok(account) => account,
        Err(e) => {
            ctx.notify(session, LanguageKey::AuthenticationFailed, &[]);
            return Err(e.into());
        }
    };
    let (account_id, name) = (account.id, account.name.clone());
    session.attach_account(account)?;
    ctx.inform(session, LanguageKey::Welcome, &[name.as_str()]);
    tracing::info!(session_id = %session.id(), %account_id, "account authenticated");
    Ok(())
}

/// Queues inbound lines until the peer leaves, goes idle or the session is
/// closed from our side.
async fn read_loop<C>(
    conn: &C,
    session: &Session,
    queue: &SessionQueue,
    config: &SessionConfig,
) -> Result<(), RealmError>
where
    C: Connection<Error = TransportError>,
{
    let session_id = session.id();
    let idle = (config.idle_timeout_secs > 0).then(|| Duration::from_secs(config.idle_timeout_secs));

    loop {
        let received = tokio::select! {
            _ = session.closed() => {
                tracing::debug!(%session_id, "session closed by the server");
                return Ok(());
            }
            received = recv_within(conn, idle) => received,
        };
        match received {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if !queue.push(line) {
                    return Ok(());
                }
            }
            Ok(None) => {
                tracing::info!(%session_id, "connection closed");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%session_id, error = %e, "recv error");
                return Err(e.into());
            }
        }
    }
}

/// One `recv`, bounded by the idle timeout. Going idle reads as a close.
async fn recv_within<C>(conn: &C, idle: Option<Duration>) -> Result<Option<String>, TransportError>
where
    C: Connection<Error = TransportError>,
{
    let Some(limit) = idle else {
        return conn.recv().await;
    };
    match tokio::time::timeout(limit, conn.recv()).await {
        Ok(received) => received,
        Err(_) => {
            tracing::info!(conn_id = %conn.id(), "connection idle, closing");
            Ok(None)
        }
    }
}
