//! nitro-node — the ClearNode binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the ledger database
//!   2. Seed the asset registry if the DB is fresh
//!   3. Load the session-key cache from storage
//!   4. Build the shared `AppState` and method router
//!   5. Accept websocket connections and hand each to `nitro_rpc::connection::serve`

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use nitro_auth::{spawn_challenge_sweeper, BearerIssuer, ChallengeCache, SessionKeyCache};
use nitro_core::Asset;
use nitro_crypto::LocalSigner;
use nitro_ledger::{Ledger, LedgerDb};
use nitro_rpc::{build_router, serve, AppState, Connection};

use config::{expand_tilde, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,nitro=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("ClearNode starting");

    // ── Ledger database ──────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db = Arc::new(LedgerDb::open(&data_dir).context("opening ledger database")?);

    // ── Asset registry ───────────────────────────────────────────────────────
    if db.list_assets().context("listing assets")?.is_empty() {
        let assets = load_assets(args.assets_file.as_deref())?;
        if assets.is_empty() {
            warn!("no assets registered and no --assets-file given — get_assets will return an empty set");
        }
        for asset in &assets {
            db.put_asset(asset).context("seeding asset registry")?;
        }
    }

    // ── Session-key cache ────────────────────────────────────────────────────
    let existing_keys = db.list_all_session_keys().context("loading session keys")?;
    let session_keys = SessionKeyCache::load(existing_keys);

    // ── Auth primitives ──────────────────────────────────────────────────────
    let challenges = Arc::new(ChallengeCache::new(args.challenge_ttl_secs));
    spawn_challenge_sweeper(challenges.clone(), args.challenge_ttl_secs);

    let jwt_secret = args.jwt_secret.clone().unwrap_or_else(|| {
        warn!("no --jwt-secret given — generating an ephemeral one; bearer tokens will not validate across restarts");
        hex::encode(rand::random::<[u8; 32]>())
    });
    let bearer = BearerIssuer::new(jwt_secret.as_bytes(), args.jwt_ttl_secs);

    let signer = match &args.signer_key {
        Some(hex_key) => {
            let bytes = hex::decode(hex_key.trim_start_matches("0x")).context("decoding --signer-key")?;
            let array: [u8; 32] = bytes.try_into().map_err(|_| anyhow::anyhow!("--signer-key must be 32 bytes"))?;
            LocalSigner::from_bytes(&array).context("loading node signing key")?
        }
        None => {
            warn!("no --signer-key given — generating an ephemeral node identity");
            LocalSigner::generate()
        }
    };
    info!(address = %{ use nitro_crypto::Signer; signer.address() }, "node identity");

    // ── Ledger & shared state ────────────────────────────────────────────────
    let ledger = Arc::new(Ledger::new(Arc::clone(&db)));
    let state = Arc::new(AppState::new(ledger, Arc::clone(&db), session_keys, challenges, bearer, signer, args.rpc_config()));
    let router = Arc::new(build_router());

    // ── Websocket listener ───────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    run_server(args.rpc_addr, state, router, shutdown_rx).await
}

async fn run_server(
    rpc_addr: SocketAddr,
    state: Arc<AppState>,
    router: Arc<nitro_rpc::RpcRouter>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(rpc_addr)
        .await
        .with_context(|| format!("binding websocket listener on {rpc_addr}"))?;
    info!(%rpc_addr, "node ready");

    loop {
        let mut cancel = shutdown_rx.clone();
        tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    info!("stopping accept loop");
                    return Ok(());
                }
            }
            accepted = listener.accept() => {
                let (tcp_stream, peer_addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };
                let state = state.clone();
                let router = router.clone();
                let cancel = shutdown_rx.clone();
                tokio::spawn(async move {
                    match tokio_tungstenite::accept_async(tcp_stream).await {
                        Ok(ws_stream) => {
                            info!(%peer_addr, "connection accepted");
                            serve(Connection::new(), ws_stream, state, router, cancel).await;
                        }
                        Err(e) => warn!(%peer_addr, error = %e, "websocket handshake failed"),
                    }
                });
            }
        }
    }
}

fn load_assets(path: Option<&std::path::Path>) -> anyhow::Result<Vec<Asset>> {
    let Some(path) = path else { return Ok(Vec::new()) };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading assets file {}", path.display()))?;
    serde_json::from_str(&json).context("parsing assets file JSON")
}
