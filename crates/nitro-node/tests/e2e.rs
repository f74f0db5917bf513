//! End-to-end tests against a real `nitro-node` router bound to an
//! ephemeral port: a raw websocket client signs and sends wire frames by
//! hand, the same way `nitro-sdk`'s client would, but without its
//! single-signature `call()` shortcut — `auth_verify`'s challenge step
//! needs an EIP-712 digest, not a payload hash, so these tests build
//! envelopes directly.

use std::net::SocketAddr;
use std::sync::Arc;

use alloy_primitives::Address;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use nitro_auth::{BearerIssuer, ChallengeCache, SessionKeyCache};
use nitro_core::{AccountRef, Asset, AssetSymbol, Envelope, Params, Payload, Request, Response};
use nitro_crypto::{hash_policy, LocalSigner, Policy, PolicyAllowance, Signer};
use nitro_ledger::{Ledger, LedgerDb, StagedMutation};
use nitro_rpc::{build_router, serve, AppState, Connection, RpcConfig};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

struct TestNode {
    addr: SocketAddr,
    ledger: Arc<Ledger>,
    // Kept alive for the duration of the test; dropping it would signal
    // every connection's cancellation watch to fire.
    _shutdown: watch::Sender<bool>,
}

async fn start_node() -> TestNode {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(LedgerDb::open(dir.path()).unwrap());
    db.put_asset(&Asset {
        symbol: AssetSymbol::new("usdc"),
        chain_id: 1,
        token_address: Address::ZERO,
        decimals: 6,
    })
    .unwrap();

    let ledger = Arc::new(Ledger::new(db.clone()));
    let session_keys = SessionKeyCache::new();
    let challenges = Arc::new(ChallengeCache::new(120));
    let bearer = BearerIssuer::new(b"test-secret", 3600);
    let signer = LocalSigner::generate();
    let state = Arc::new(AppState::new(
        ledger.clone(),
        db.clone(),
        session_keys,
        challenges,
        bearer,
        signer,
        RpcConfig::default(),
    ));
    let router = Arc::new(build_router());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        loop {
            let mut cancel = shutdown_rx.clone();
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        return;
                    }
                }
                accepted = listener.accept() => {
                    let Ok((tcp, _)) = accepted else { continue };
                    let state = state.clone();
                    let router = router.clone();
                    let cancel = shutdown_rx.clone();
                    tokio::spawn(async move {
                        if let Ok(ws) = tokio_tungstenite::accept_async(tcp).await {
                            serve(Connection::new(), ws, state, router, cancel).await;
                        }
                    });
                }
            }
        }
    });

    TestNode { addr, ledger, _shutdown: shutdown_tx }
}

async fn connect(node: &TestNode) -> Client {
    let url = format!("ws://{}", node.addr);
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

fn signed_request(request_id: u64, method: &str, params: Value, signers: &[&LocalSigner]) -> Request {
    let payload = Payload::new(request_id, method, Params::new(params).unwrap(), now_ms());
    let hash = payload.hash().unwrap();
    let mut envelope = Envelope::new(payload);
    for signer in signers {
        envelope = envelope.with_signature(signer.sign_hash(hash).to_hex());
    }
    Request(envelope)
}

async fn roundtrip(ws: &mut Client, request: Request) -> Response {
    let bytes = request.encode().unwrap();
    ws.send(Message::Binary(bytes)).await.unwrap();
    loop {
        let frame = ws.next().await.unwrap().unwrap();
        let bytes = match frame {
            Message::Binary(b) => b,
            Message::Text(t) => t.into_bytes(),
            _ => continue,
        };
        return Response::decode(&bytes).unwrap();
    }
}

fn param(response: &Response, key: &str) -> Option<Value> {
    response.0.payload.params.0.get(key).cloned()
}

/// Runs a full `auth_request` → `auth_challenge` → `auth_verify` handshake
/// for `wallet`, returning the bearer JWT and binding the connection's
/// identity to `wallet`'s address.
async fn authenticate(ws: &mut Client, wallet: &LocalSigner, request_id: u64) -> String {
    let expires_at = chrono::Utc::now().timestamp() + 3600;
    let session_key = LocalSigner::generate();

    let auth_request_params = json!({
        "address": wallet.address().to_string(),
        "session_key": session_key.address().to_string(),
        "application": "clearnode",
        "scope": "clearnode.full",
        "expires_at": expires_at,
        "allowances": [],
    });
    let response = roundtrip(ws, signed_request(request_id, "auth_request", auth_request_params, &[wallet])).await;
    assert!(!response.0.is_error(), "auth_request failed: {:?}", response.0.error_message());
    let challenge = param(&response, "challenge").unwrap().as_str().unwrap().to_string();
    assert_eq!(challenge.len(), 36, "challenge should be a UUIDv4 string");

    let policy = Policy {
        challenge: challenge.clone(),
        scope: "clearnode.full".into(),
        wallet: wallet.address(),
        session_key: session_key.address(),
        expires_at,
        allowances: Vec::<PolicyAllowance>::new(),
    };
    let digest = hash_policy(&policy);
    let policy_sig = wallet.sign_hash(digest);

    let verify_payload = Payload::new(request_id + 1, "auth_verify", Params::new(json!({ "challenge": challenge })).unwrap(), now_ms());
    let verify_envelope = Envelope::new(verify_payload).with_signature(policy_sig.to_hex());
    let response = roundtrip(ws, Request(verify_envelope)).await;
    assert!(!response.0.is_error(), "auth_verify failed: {:?}", response.0.error_message());
    assert_eq!(param(&response, "success").unwrap(), json!(true));
    param(&response, "jwt").unwrap().as_str().unwrap().to_string()
}

fn fund(ledger: &Ledger, wallet: Address, asset: &AssetSymbol, amount: nitro_core::Amount) {
    let external = AccountRef::Wallet(Address::ZERO);
    let mut staged = StagedMutation::new();
    staged.push_entry(ledger.build_entry(external, asset.clone(), Address::ZERO, -amount, None, 0).unwrap());
    staged.push_entry(ledger.build_entry(AccountRef::Wallet(wallet), asset.clone(), wallet, amount, None, 0).unwrap());
    ledger.commit(staged).unwrap();
}

#[tokio::test]
async fn auth_then_ping_round_trip() {
    let node = start_node().await;
    let mut ws = connect(&node).await;
    let wallet = LocalSigner::generate();

    let jwt = authenticate(&mut ws, &wallet, 1).await;
    assert!(!jwt.is_empty());

    let response = roundtrip(&mut ws, signed_request(3, "ping", json!({}), &[])).await;
    assert!(!response.0.is_error());
    assert_eq!(response.0.payload.method, "pong");
}

#[tokio::test]
async fn create_app_session_rejects_insufficient_funds() {
    let node = start_node().await;
    let usdc = AssetSymbol::new("usdc");
    let a = LocalSigner::generate();
    let b = LocalSigner::generate();
    fund(&node.ledger, a.address(), &usdc, nitro_core::Amount::from(100));
    fund(&node.ledger, b.address(), &usdc, nitro_core::Amount::from(100));

    // create_app_session sits behind `require_auth`; the connection's own
    // identity doesn't need to be one of the session participants, since
    // participant authorization is resolved independently from the
    // request's own signature set.
    let mut ws = connect(&node).await;
    let caller = LocalSigner::generate();
    authenticate(&mut ws, &caller, 1).await;

    let params = json!({
        "application": "TestApp",
        "protocol_version": "NitroRPC/0.4",
        "participants": [a.address().to_string(), b.address().to_string()],
        "weights": [1, 1],
        "quorum": 2,
        "nonce": 1,
        "challenge": "test-challenge",
        "allocations": [
            { "participant": a.address().to_string(), "asset_symbol": "usdc", "amount": "100" },
            { "participant": b.address().to_string(), "asset_symbol": "usdc", "amount": "200" },
        ],
    });
    let response = roundtrip(&mut ws, signed_request(3, "create_app_session", params, &[&a, &b])).await;

    assert!(response.0.is_error());
    let message = response.0.error_message().unwrap();
    assert!(message.contains("insufficient funds"), "unexpected error: {message}");
    assert!(message.contains("usdc"), "unexpected error: {message}");
}
