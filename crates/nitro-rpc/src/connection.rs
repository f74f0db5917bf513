//! One websocket connection's lifecycle: frames are read and dispatched
//! inline, dispatch results and relayed push events both flow out through the
//! same writer half. Mirrors chronx-p2p's `P2pNetwork::run()` select loop —
//! the swarm's gossip channels are replaced here by a websocket split and the
//! notifier's per-wallet push queue.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};
use uuid::Uuid;

use nitro_core::{Request, Response};
use nitro_ledger::RpcHistoryRecord;

use crate::dispatch::RpcRouter;
use crate::state::AppState;

/// Identifies one live connection for [`crate::notifier::Notifier`] and for
/// the rpc-history/audit trail.
pub struct Connection {
    pub id: Uuid,
}

impl Connection {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives `stream` to completion. Returns once the peer closes the socket,
/// the cancellation signal fires, or a write stalls past
/// `state.config.write_timeout_secs`. Always unregisters the connection from
/// `state.notifier` before returning, so a caller never needs its own
/// cleanup path.
pub async fn serve<S>(
    connection: Connection,
    stream: WebSocketStream<S>,
    state: Arc<AppState>,
    router: Arc<RpcRouter>,
    mut cancel: tokio::sync::watch::Receiver<bool>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let connection_id = connection.id;
    let (mut sink, mut source) = stream.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    state.notifier.register(connection_id, outbound_tx);

    let write_timeout = Duration::from_secs(state.config.write_timeout_secs);
    let mut user_id: Option<Address> = None;

    debug!(%connection_id, "connection opened");

    loop {
        tokio::select! {
            biased;

            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    debug!(%connection_id, "closing on shutdown signal");
                    let _ = tokio::time::timeout(write_timeout, sink.send(Message::Close(None))).await;
                    break;
                }
            }

            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Binary(bytes))) => {
                        handle_inbound(&state, &router, &mut user_id, connection_id, &bytes, &mut sink, write_timeout).await;
                    }
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound(&state, &router, &mut user_id, connection_id, text.as_bytes(), &mut sink, write_timeout).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if tokio::time::timeout(write_timeout, sink.send(Message::Pong(payload))).await.is_err() {
                            warn!(%connection_id, "write timed out responding to ping");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%connection_id, "peer closed connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%connection_id, error = %e, "websocket read error");
                        break;
                    }
                }
            }

            pushed = outbound_rx.recv() => {
                let Some(bytes) = pushed else { break };
                if tokio::time::timeout(write_timeout, sink.send(Message::Binary(bytes))).await.is_err() {
                    warn!(%connection_id, "write timed out delivering push event");
                    break;
                }
            }
        }
    }

    state.notifier.unregister(connection_id);
    debug!(%connection_id, "connection closed");
}

/// Decodes, dispatches, and writes back one client frame. The dispatch call
/// itself is synchronous — sled has no async API — so this only ever awaits
/// on the write half.
async fn handle_inbound<W>(
    state: &Arc<AppState>,
    router: &Arc<RpcRouter>,
    user_id: &mut Option<Address>,
    connection_id: Uuid,
    bytes: &[u8],
    sink: &mut W,
    write_timeout: Duration,
) where
    W: Sink<Message> + Unpin,
{
    let now = chrono::Utc::now();
    let now_secs = now.timestamp();
    let now_ms = now.timestamp_millis() as u64;

    let request = match Request::decode(bytes) {
        Ok(r) => r,
        Err(e) => {
            let response = Response::error(0, now_ms, format!("malformed request: {e}"));
            let _ = send(sink, &response, write_timeout).await;
            return;
        }
    };

    let method = request.0.payload.method.clone();
    let request_id = request.0.payload.request_id;
    let request_hash = request.0.payload.hash().ok();

    let response = router.dispatch(state, &request, connection_id, user_id, now_secs, now_ms);

    if let (Some(wallet), Some(req_hash)) = (*user_id, request_hash) {
        if let Ok(response_hash) = response.0.payload.hash() {
            let record = RpcHistoryRecord {
                id: state.db.next_rpc_history_id().unwrap_or(request_id),
                user_id: wallet,
                method: method.clone(),
                request_hash: req_hash.to_string(),
                response_hash: response_hash.to_string(),
                timestamp: now_ms,
            };
            if let Err(e) = state.db.record_rpc_history(&record) {
                warn!(%connection_id, error = %e, "failed to record rpc history");
            }
        }
    }

    if send(sink, &response, write_timeout).await.is_err() {
        warn!(%connection_id, method = %method, "write timed out delivering response");
    }
}

async fn send<W>(sink: &mut W, response: &Response, write_timeout: Duration) -> Result<(), ()>
where
    W: Sink<Message> + Unpin,
{
    let Ok(bytes) = response.encode() else { return Err(()) };
    match tokio::time::timeout(write_timeout, sink.send(Message::Binary(bytes))).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        let a = Connection::new();
        let b = Connection::new();
        assert_ne!(a.id, b.id);
    }
}
