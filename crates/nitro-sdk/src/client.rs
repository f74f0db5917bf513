//! A thin client over the duplex websocket wire protocol: signs and sends
//! requests, matches responses back to callers by `request_id`, and forwards
//! everything else (`request_id = 0`) to an [`EventLoop`]. This workspace's
//! analogue of `chronx-wallet`'s `WalletRpcClient`, traded from request/reply
//! HTTP for a persistent duplex stream since the wire protocol here is a
//! websocket, not JSON-RPC 2.0 over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use nitro_core::{Envelope, Params, Payload, Request, Response};
use nitro_crypto::Signer;

use crate::error::{SdkError, SdkResult};
use crate::event_loop::EventLoop;

pub struct NitroClient {
    outbound: mpsc::UnboundedSender<Message>,
    pending: Arc<DashMap<u64, oneshot::Sender<Response>>>,
    next_id: AtomicU64,
    signer: Arc<dyn Signer + Send + Sync>,
}

impl NitroClient {
    /// Connects to `url`, spawning the reader and writer tasks that drive
    /// the connection for its lifetime. Returns the client handle plus the
    /// [`EventLoop`] that server-pushed frames are routed through.
    pub async fn connect(url: &str, signer: Arc<dyn Signer + Send + Sync>) -> SdkResult<(Self, EventLoop)> {
        let (stream, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, mut source) = stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let pending: Arc<DashMap<u64, oneshot::Sender<Response>>> = Arc::new(DashMap::new());
        let event_loop = EventLoop::new();

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        let pending_reader = pending.clone();
        let event_loop_reader = event_loop.clone();
        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let Ok(message) = frame else { break };
                let bytes = match message {
                    Message::Binary(b) => b,
                    Message::Text(t) => t.into_bytes(),
                    Message::Close(_) => break,
                    _ => continue,
                };
                let Ok(response) = Response::decode(&bytes) else { continue };
                let request_id = response.0.payload.request_id;
                if request_id != 0 {
                    if let Some((_, tx)) = pending_reader.remove(&request_id) {
                        let _ = tx.send(response);
                        continue;
                    }
                }
                event_loop_reader.dispatch(response);
            }
            pending_reader.clear();
        });

        Ok((Self { outbound: outbound_tx, pending, next_id: AtomicU64::new(1), signer }, event_loop))
    }

    /// Signs and sends one request, awaiting its matching response. An error
    /// response surfaces as [`SdkError::RequestFailed`] carrying the
    /// server's message.
    pub async fn call(&self, method: impl Into<String>, params: impl Serialize) -> SdkResult<Response> {
        let method = method.into();
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now_ms = chrono::Utc::now().timestamp_millis() as u64;

        let params = Params::new(params)?;
        let payload = Payload::new(request_id, method, params, now_ms);
        let hash = payload.hash()?;
        let signature = self.signer.sign_hash(hash);
        let envelope = Envelope::new(payload).with_signature(signature.to_hex());
        let bytes = Request(envelope).encode()?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);
        if self.outbound.send(Message::Binary(bytes)).is_err() {
            self.pending.remove(&request_id);
            return Err(SdkError::Closed);
        }

        let response = rx.await.map_err(|_| SdkError::Closed)?;
        if response.0.is_error() {
            let message = response.0.error_message().unwrap_or_else(|| "request failed".to_string());
            return Err(SdkError::RequestFailed(message));
        }
        Ok(response)
    }

    pub fn address(&self) -> alloy_primitives::Address {
        self.signer.address()
    }
}
