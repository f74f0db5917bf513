//! The terminal handler for every method in the catalogue. Each is a plain
//! `fn(&mut Context)`: translate params, do the work against `ctx.state`,
//! call `ctx.succeed`/`ctx.fail`. None of these call `ctx.next()` — they are
//! always the last link in their chain.

use std::str::FromStr;

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::Deserialize;
use serde_json::{json, Value};

use nitro_auth::AuthError;
use nitro_core::constants::{events, methods};
use nitro_core::{
    parse_address, Allocation, Allowance, Amount, AssetSymbol, Envelope, Intent, Params, Payload,
    Response, SessionKey, TimestampMs,
};
use nitro_crypto::{hash_policy, recover, Policy, PolicyAllowance, Signature, Signer};
use nitro_ledger::{
    Channel, ChannelStatus, CloseAppSessionRequest, CreateAppSessionRequest, SubmitAppStateRequest,
};

use crate::context::Context;
use crate::state::AppState;

fn succeed_json(ctx: &mut Context, method: &'static str, value: Value) {
    match Params::new(value) {
        Ok(params) => ctx.succeed(method, params),
        Err(e) => ctx.fail(&e, "failed to encode response"),
    }
}

/// Broadcasts a signed, request-id-0 server-initiated frame to every
/// connection subscribed to `wallets`. Best-effort: a frame that can't be
/// built or signed is dropped rather than failing the request that
/// triggered it.
fn push_event(state: &AppState, wallets: &[Address], method: &'static str, value: Value, now_ms: TimestampMs) {
    let Ok(params) = Params::new(value) else { return };
    let payload = Payload::new(0, method, params, now_ms);
    let Ok(hash) = payload.hash() else { return };
    let sig = state.signer.sign_hash(hash);
    let envelope = Envelope::new(payload).with_signature(sig.to_hex());
    state.notifier.notify_wallets(wallets, &Response(envelope));
}

fn decimal_to_u256(amount: Amount) -> U256 {
    let normalized = amount.round_dp(0);
    let rendered = normalized.to_string();
    let integer_part = rendered.split('.').next().unwrap_or("0");
    U256::from_str(integer_part).unwrap_or(U256::ZERO)
}

// ── Public, stateless ────────────────────────────────────────────────────────

pub fn ping(ctx: &mut Context) {
    ctx.succeed(methods::PONG, Params::empty());
}

pub fn get_config(ctx: &mut Context) {
    let cfg = ctx.state.config.clone();
    let value = json!({
        "write_timeout_secs": cfg.write_timeout_secs,
        "write_buffer_size": cfg.write_buffer_size,
        "process_buffer_size": cfg.process_buffer_size,
        "challenge_ttl_secs": cfg.challenge_ttl_secs,
        "timestamp_skew_secs": cfg.timestamp_skew_secs,
        "jwt_ttl_secs": cfg.jwt_ttl_secs,
    });
    succeed_json(ctx, methods::GET_CONFIG, value);
}

pub fn get_assets(ctx: &mut Context) {
    let result = ctx.state.db.list_assets();
    match result {
        Ok(assets) => succeed_json(ctx, methods::GET_ASSETS, json!({ "assets": assets })),
        Err(e) => ctx.fail(&e, "failed to list assets"),
    }
}

#[derive(Deserialize)]
struct GetChannelsParams {
    wallet: Address,
}

pub fn get_channels(ctx: &mut Context) {
    let params: GetChannelsParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed get_channels request"),
    };
    let result = ctx.state.db.list_channels_for_wallet(params.wallet);
    match result {
        Ok(channels) => succeed_json(ctx, methods::GET_CHANNELS, json!({ "channels": channels })),
        Err(e) => ctx.fail(&e, "failed to list channels"),
    }
}

#[derive(Deserialize)]
struct SessionIdParams {
    session_id: B256,
}

pub fn get_app_definition(ctx: &mut Context) {
    let params: SessionIdParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed get_app_definition request"),
    };
    let result = ctx.state.db.get_app_session(&params.session_id);
    match result {
        Ok(Some(session)) => succeed_json(
            ctx,
            methods::GET_APP_DEFINITION,
            json!({
                "session_id": session.session_id.to_string(),
                "application": session.application,
                "protocol_version": session.protocol_version.as_str(),
                "participants": session.participant_wallets,
                "weights": session.weights,
                "quorum": session.quorum,
                "challenge": session.challenge,
                "nonce": session.nonce,
            }),
        ),
        Ok(None) => ctx.fail_message("app session not found"),
        Err(e) => ctx.fail(&e, "failed to load app session"),
    }
}

#[derive(Deserialize, Default)]
struct GetAppSessionsParams {
    participant: Option<Address>,
}

pub fn get_app_sessions(ctx: &mut Context) {
    let params: GetAppSessionsParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed get_app_sessions request"),
    };
    let result = ctx.state.db.list_app_sessions();
    match result {
        Ok(sessions) => {
            let filtered: Vec<_> = match params.participant {
                // "participant is a member of the list" — independent of how the
                // record happens to be stored, this is a plain membership test.
                Some(wallet) => sessions.into_iter().filter(|s| s.is_participant(&wallet)).collect(),
                None => sessions,
            };
            succeed_json(ctx, methods::GET_APP_SESSIONS, json!({ "app_sessions": filtered }));
        }
        Err(e) => ctx.fail(&e, "failed to list app sessions"),
    }
}

#[derive(Deserialize)]
struct GetLedgerEntriesParams {
    wallet: Option<Address>,
    session_id: Option<B256>,
    asset_symbol: String,
}

pub fn get_ledger_entries(ctx: &mut Context) {
    let params: GetLedgerEntriesParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed get_ledger_entries request"),
    };
    let account = match (params.wallet, params.session_id) {
        (Some(w), None) => nitro_core::AccountRef::Wallet(w),
        (None, Some(sid)) => nitro_core::AccountRef::AppSession(sid),
        _ => return ctx.fail_message("exactly one of wallet or session_id is required"),
    };
    let asset = AssetSymbol::new(params.asset_symbol);
    let result = ctx.state.db.entries_for_account_asset(&account, &asset);
    match result {
        Ok(entries) => succeed_json(ctx, methods::GET_LEDGER_ENTRIES, json!({ "entries": entries })),
        Err(e) => ctx.fail(&e, "failed to list ledger entries"),
    }
}

#[derive(Deserialize, Default)]
struct GetLedgerTransactionsParams {
    page_size: Option<usize>,
}

pub fn get_ledger_transactions(ctx: &mut Context) {
    let params: GetLedgerTransactionsParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed get_ledger_transactions request"),
    };
    let page_size = params.page_size.unwrap_or(ctx.state.config.rpc_history_page_size);
    let result = ctx.state.db.list_transactions();
    match result {
        Ok(mut transactions) => {
            transactions.truncate(page_size);
            succeed_json(ctx, methods::GET_LEDGER_TRANSACTIONS, json!({ "transactions": transactions }));
        }
        Err(e) => ctx.fail(&e, "failed to list ledger transactions"),
    }
}

// ── Auth ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AuthRequestParams {
    address: Address,
    session_key: Address,
    application: String,
    scope: String,
    expires_at: i64,
    #[serde(default)]
    allowances: Vec<Allowance>,
}

pub fn auth_request(ctx: &mut Context) {
    let params: AuthRequestParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed auth_request"),
    };
    let hash = match ctx.request_hash() {
        Ok(h) => h,
        Err(e) => return ctx.fail(&e, "malformed payload"),
    };
    let Some(sig) = ctx.signatures().first().and_then(|s| Signature::from_hex(s).ok()) else {
        return ctx.fail(&AuthError::InvalidSignature, "invalid signature");
    };
    let Ok(signer) = recover(hash, &sig) else {
        return ctx.fail(&AuthError::InvalidSignature, "invalid signature");
    };
    if signer != params.address {
        return ctx.fail(&AuthError::InvalidSignature, "invalid signature");
    }

    let known = ctx.state.db.list_assets();
    let known_assets = match known {
        Ok(assets) => assets.into_iter().map(|a| a.symbol).collect::<Vec<_>>(),
        Err(e) => return ctx.fail(&e, "failed to load assets"),
    };

    let issued = ctx.state.challenges.issue(
        params.address,
        params.session_key,
        params.application,
        params.scope,
        params.expires_at,
        params.allowances,
        &known_assets,
        ctx.now,
    );
    match issued {
        Ok(challenge) => succeed_json(ctx, methods::AUTH_CHALLENGE, json!({ "challenge": challenge })),
        Err(e) => ctx.fail(&e, "auth_request failed"),
    }
}

#[derive(Deserialize, Default)]
struct AuthVerifyParams {
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    jwt: Option<String>,
}

pub fn auth_verify(ctx: &mut Context) {
    let params: AuthVerifyParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed auth_verify"),
    };
    if let Some(token) = params.jwt {
        return auth_verify_bearer(ctx, &token);
    }
    let Some(challenge) = params.challenge else {
        return ctx.fail(&AuthError::ChallengeNotFound, "challenge or jwt is required");
    };
    auth_verify_challenge(ctx, &challenge);
}

fn auth_verify_bearer(ctx: &mut Context, token: &str) {
    let claims = match ctx.state.bearer.verify(token, ctx.now) {
        Ok(c) => c,
        Err(e) => return ctx.fail(&e, "invalid or expired bearer token"),
    };
    let wallet = match parse_address(&claims.wallet) {
        Ok(a) => a,
        Err(e) => return ctx.fail(&e, "invalid wallet in token"),
    };
    ctx.user_id = Some(wallet);
    ctx.state.notifier.bind_wallet(ctx.connection_id, wallet);
    succeed_json(ctx, methods::AUTH_VERIFY, json!({ "wallet": wallet.to_string(), "success": true }));
}

fn auth_verify_challenge(ctx: &mut Context, challenge: &str) {
    let pending = match ctx.state.challenges.take(challenge, ctx.now) {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "challenge invalid or expired"),
    };
    let Some(sig) = ctx.signatures().first().and_then(|s| Signature::from_hex(s).ok()) else {
        return ctx.fail(&AuthError::InvalidSignature, "invalid signature");
    };

    let policy = Policy {
        challenge: challenge.to_string(),
        scope: pending.scope.clone(),
        wallet: pending.address,
        session_key: pending.session_key,
        expires_at: pending.expires_at,
        allowances: pending
            .allowances
            .iter()
            .map(|a| PolicyAllowance { asset_symbol: a.asset_symbol.to_string(), max_amount: decimal_to_u256(a.max_amount) })
            .collect(),
    };
    let digest = hash_policy(&policy);
    let Ok(signer) = recover(digest, &sig) else {
        return ctx.fail(&AuthError::InvalidSignature, "invalid signature");
    };
    if signer != pending.address {
        return ctx.fail(&AuthError::InvalidSignature, "invalid signature");
    }

    let record = SessionKey {
        id: uuid::Uuid::new_v4().to_string(),
        wallet: pending.address,
        key_address: pending.session_key,
        application: pending.application.clone(),
        scope: pending.scope.clone(),
        allowances: pending.allowances.clone(),
        expires_at: pending.expires_at,
        created_at: ctx.now,
    };
    if let Err(e) = ctx.state.db.put_session_key(&record) {
        return ctx.fail(&e, "failed to persist session key");
    }
    ctx.state.session_keys.insert(record.clone());

    let jwt = ctx.state.bearer.issue(
        pending.address,
        pending.session_key,
        pending.scope,
        pending.allowances,
        pending.expires_at,
        ctx.now,
    );
    let token = match jwt {
        Ok(t) => t,
        Err(e) => return ctx.fail(&e, "failed to issue bearer token"),
    };

    ctx.user_id = Some(pending.address);
    ctx.state.notifier.bind_wallet(ctx.connection_id, pending.address);
    succeed_json(ctx, methods::AUTH_VERIFY, json!({ "wallet": pending.address.to_string(), "jwt": token, "success": true }));
}

// ── Private: identity & session keys ─────────────────────────────────────────

pub fn get_user_tag(ctx: &mut Context) {
    let Some(wallet) = ctx.user_id else {
        return ctx.fail(&AuthError::Unauthenticated, "");
    };
    let digest = keccak256(wallet.as_slice());
    let tag = format!("anon-{}", hex::encode(&digest[..4]));
    succeed_json(ctx, methods::GET_USER_TAG, json!({ "tag": tag }));
}

pub fn get_session_keys(ctx: &mut Context) {
    let Some(wallet) = ctx.user_id else {
        return ctx.fail(&AuthError::Unauthenticated, "");
    };
    let keys = ctx.state.session_keys.keys_for_wallet(wallet);
    succeed_json(ctx, methods::GET_SESSION_KEYS, json!({ "session_keys": keys }));
}

#[derive(Deserialize)]
struct RevokeSessionKeyParams {
    key_address: Address,
}

pub fn revoke_session_key(ctx: &mut Context) {
    let Some(actor) = ctx.user_id else {
        return ctx.fail(&AuthError::Unauthenticated, "");
    };
    let params: RevokeSessionKeyParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed revoke_session_key request"),
    };
    let Some(target) = ctx.state.session_keys.get(&params.key_address) else {
        return ctx.fail(&AuthError::KeyNotFound, "");
    };
    let actor_record = ctx.state.session_keys.keys_for_wallet(actor).into_iter().find(|k| k.is_root());
    if !nitro_auth::can_revoke(actor, actor_record.as_ref(), &target) {
        return ctx.fail(&AuthError::PermissionDenied, "");
    }

    let mut updated = target;
    updated.expires_at = ctx.now;
    if let Err(e) = ctx.state.db.put_session_key(&updated) {
        return ctx.fail(&e, "failed to persist revocation");
    }
    if let Err(e) = ctx.state.session_keys.revoke(&params.key_address, ctx.now) {
        return ctx.fail(&e, "failed to revoke session key");
    }
    succeed_json(ctx, methods::REVOKE_SESSION_KEY, json!({ "revoked": params.key_address.to_string() }));
}

pub fn cleanup_session_key_cache(ctx: &mut Context) {
    ctx.state.session_keys.clear();
    ctx.succeed(methods::CLEANUP_SESSION_KEY_CACHE, Params::empty());
}

// ── Private: ledger reads ────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct GetRpcHistoryParams {
    page_size: Option<usize>,
}

pub fn get_rpc_history(ctx: &mut Context) {
    let Some(wallet) = ctx.user_id else {
        return ctx.fail(&AuthError::Unauthenticated, "");
    };
    let params: GetRpcHistoryParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed get_rpc_history request"),
    };
    let page_size = params.page_size.unwrap_or(ctx.state.config.rpc_history_page_size);
    let result = ctx.state.db.list_rpc_history(wallet, page_size);
    match result {
        Ok(records) => succeed_json(ctx, methods::GET_RPC_HISTORY, json!({ "history": records })),
        Err(e) => ctx.fail(&e, "failed to list rpc history"),
    }
}

#[derive(Deserialize, Default)]
struct GetLedgerBalancesParams {
    session_id: Option<B256>,
}

pub fn get_ledger_balances(ctx: &mut Context) {
    let Some(wallet) = ctx.user_id else {
        return ctx.fail(&AuthError::Unauthenticated, "");
    };
    let params: GetLedgerBalancesParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed get_ledger_balances request"),
    };
    let account = match params.session_id {
        Some(sid) => nitro_core::AccountRef::AppSession(sid),
        None => nitro_core::AccountRef::Wallet(wallet),
    };
    let result = ctx.state.ledger.balances(&account);
    match result {
        Ok(balances) => {
            let rendered: Vec<Value> = balances
                .into_iter()
                .map(|(asset, amount)| json!({ "asset_symbol": asset.to_string(), "amount": amount }))
                .collect();
            succeed_json(ctx, methods::GET_LEDGER_BALANCES, json!({ "balances": rendered }));
        }
        Err(e) => ctx.fail(&e, "failed to compute balances"),
    }
}

// ── Private: money movement ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct TransferParams {
    to: Address,
    asset_symbol: String,
    amount: Amount,
}

pub fn transfer(ctx: &mut Context) {
    let params: TransferParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed transfer request"),
    };
    let hash = match ctx.request_hash() {
        Ok(h) => h,
        Err(e) => return ctx.fail(&e, "malformed payload"),
    };
    let resolutions = match nitro_auth::resolve_signers(ctx.signatures(), hash, &ctx.state.session_keys, ctx.now) {
        Ok(r) => r,
        Err(e) => return ctx.fail(&e, "invalid signature"),
    };
    let Some(resolution) = resolutions.first() else {
        return ctx.fail(&AuthError::InvalidSignature, "invalid signature");
    };
    let from = resolution.wallet;
    let asset = AssetSymbol::new(params.asset_symbol);

    if let Some(key) = &resolution.session_key {
        if let Err(e) = nitro_ledger::validate_spending(ctx.state.db.as_ref(), key, &asset, params.amount) {
            return ctx.fail(&e, "allowance exceeded");
        }
    }

    let result = ctx.state.ledger.transfer(from, params.to, asset.clone(), params.amount, ctx.now);
    match result {
        Ok(()) => {
            let now_ms = ctx.now_ms;
            push_event(
                ctx.state,
                &[from, params.to],
                events::TRANSFER,
                json!({ "from": from.to_string(), "to": params.to.to_string(), "asset_symbol": asset.to_string(), "amount": params.amount }),
                now_ms,
            );
            ctx.succeed(methods::TRANSFER, Params::empty());
        }
        Err(e) => ctx.fail(&e, "transfer failed"),
    }
}

// ── Private: app sessions ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateAppSessionParams {
    application: String,
    protocol_version: String,
    participants: Vec<Address>,
    weights: Vec<u64>,
    quorum: u64,
    nonce: u64,
    challenge: String,
    #[serde(default)]
    allocations: Vec<Allocation>,
    #[serde(default)]
    session_data: Option<Value>,
}

pub fn create_app_session(ctx: &mut Context) {
    let params: CreateAppSessionParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed create_app_session request"),
    };
    let hash = match ctx.request_hash() {
        Ok(h) => h,
        Err(e) => return ctx.fail(&e, "malformed payload"),
    };
    let req = CreateAppSessionRequest {
        application: params.application,
        protocol_version: params.protocol_version,
        participants: params.participants.clone(),
        weights: params.weights,
        quorum: params.quorum,
        nonce: params.nonce,
        challenge: params.challenge,
        allocations: params.allocations,
        session_data: params.session_data,
    };
    let signatures: Vec<String> = ctx.signatures().to_vec();
    let result = nitro_ledger::create_app_session(&ctx.state.ledger, &ctx.state.session_keys, req, &signatures, hash, ctx.now);
    match result {
        Ok(session) => {
            let now_ms = ctx.now_ms;
            push_event(
                ctx.state,
                &params.participants,
                events::APP_SESSION_UPDATE,
                json!({ "session_id": session.session_id.to_string(), "status": "open" }),
                now_ms,
            );
            succeed_json(ctx, methods::CREATE_APP_SESSION, json!({ "app_session": session }));
        }
        Err(e) => ctx.fail(&e, "create_app_session failed"),
    }
}

#[derive(Deserialize)]
struct SubmitAppStateParams {
    session_id: B256,
    #[serde(default)]
    intent: Option<Intent>,
    #[serde(default)]
    version: Option<u64>,
    #[serde(default)]
    allocations: Vec<Allocation>,
    #[serde(default)]
    session_data: Option<Value>,
}

pub fn submit_app_state(ctx: &mut Context) {
    let params: SubmitAppStateParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed submit_app_state request"),
    };
    let hash = match ctx.request_hash() {
        Ok(h) => h,
        Err(e) => return ctx.fail(&e, "malformed payload"),
    };
    let req = SubmitAppStateRequest {
        session_id: params.session_id,
        intent: params.intent,
        version: params.version,
        allocations: params.allocations,
        session_data: params.session_data,
    };
    let signatures: Vec<String> = ctx.signatures().to_vec();
    let result = nitro_ledger::submit_app_state(&ctx.state.ledger, &ctx.state.session_keys, req, &signatures, hash, ctx.now);
    match result {
        Ok(session) => {
            let now_ms = ctx.now_ms;
            push_event(
                ctx.state,
                &session.participant_wallets.clone(),
                events::APP_SESSION_UPDATE,
                json!({ "session_id": session.session_id.to_string(), "version": session.version }),
                now_ms,
            );
            succeed_json(ctx, methods::SUBMIT_APP_STATE, json!({ "app_session": session }));
        }
        Err(e) => ctx.fail(&e, "submit_app_state failed"),
    }
}

#[derive(Deserialize)]
struct CloseAppSessionParams {
    session_id: B256,
    #[serde(default)]
    allocations: Vec<Allocation>,
}

pub fn close_app_session(ctx: &mut Context) {
    let params: CloseAppSessionParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed close_app_session request"),
    };
    let hash = match ctx.request_hash() {
        Ok(h) => h,
        Err(e) => return ctx.fail(&e, "malformed payload"),
    };
    let req = CloseAppSessionRequest { session_id: params.session_id, allocations: params.allocations };
    let signatures: Vec<String> = ctx.signatures().to_vec();
    let result = nitro_ledger::close_app_session(&ctx.state.ledger, &ctx.state.session_keys, req, &signatures, hash, ctx.now);
    match result {
        Ok(session) => {
            let now_ms = ctx.now_ms;
            push_event(
                ctx.state,
                &session.participant_wallets.clone(),
                events::APP_SESSION_UPDATE,
                json!({ "session_id": session.session_id.to_string(), "status": "closed" }),
                now_ms,
            );
            succeed_json(ctx, methods::CLOSE_APP_SESSION, json!({ "app_session": session }));
        }
        Err(e) => ctx.fail(&e, "close_app_session failed"),
    }
}

// ── Private: channels ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateChannelParams {
    asset_symbol: String,
}

pub fn create_channel(ctx: &mut Context) {
    let Some(wallet) = ctx.user_id else {
        return ctx.fail(&AuthError::Unauthenticated, "");
    };
    let params: CreateChannelParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed create_channel request"),
    };
    let request_id = ctx.request.0.payload.request_id;
    let mut seed = wallet.as_slice().to_vec();
    seed.extend_from_slice(params.asset_symbol.as_bytes());
    seed.extend_from_slice(&request_id.to_be_bytes());
    let channel_id = keccak256(seed);

    let channel = Channel {
        channel_id,
        wallet,
        asset_symbol: AssetSymbol::new(params.asset_symbol),
        status: ChannelStatus::Open,
        allocation: Amount::ZERO,
    };
    match ctx.state.db.put_channel(&channel) {
        Ok(()) => {
            let now_ms = ctx.now_ms;
            push_event(ctx.state, &[wallet], events::CHANNEL_UPDATE, json!({ "channel_id": channel_id.to_string(), "status": "open" }), now_ms);
            succeed_json(ctx, methods::CREATE_CHANNEL, json!({ "channel": channel }));
        }
        Err(e) => ctx.fail(&e, "failed to create channel"),
    }
}

#[derive(Deserialize)]
struct CloseChannelParams {
    channel_id: B256,
}

pub fn close_channel(ctx: &mut Context) {
    let Some(wallet) = ctx.user_id else {
        return ctx.fail(&AuthError::Unauthenticated, "");
    };
    let params: CloseChannelParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed close_channel request"),
    };
    let loaded = ctx.state.db.get_channel(&params.channel_id);
    let mut channel = match loaded {
        Ok(Some(c)) if c.wallet == wallet => c,
        Ok(Some(_)) => return ctx.fail(&AuthError::PermissionDenied, ""),
        Ok(None) => return ctx.fail_message("channel not found"),
        Err(e) => return ctx.fail(&e, "failed to load channel"),
    };
    if !channel.allocation.is_zero() {
        return ctx.fail_message("channel has nonzero allocation");
    }
    channel.status = ChannelStatus::Closed;
    match ctx.state.db.put_channel(&channel) {
        Ok(()) => {
            let now_ms = ctx.now_ms;
            push_event(ctx.state, &[wallet], events::CHANNEL_UPDATE, json!({ "channel_id": params.channel_id.to_string(), "status": "closed" }), now_ms);
            succeed_json(ctx, methods::CLOSE_CHANNEL, json!({ "channel": channel }));
        }
        Err(e) => ctx.fail(&e, "failed to close channel"),
    }
}

#[derive(Deserialize)]
struct ResizeChannelParams {
    channel_id: B256,
    allocation: Amount,
}

pub fn resize_channel(ctx: &mut Context) {
    let Some(wallet) = ctx.user_id else {
        return ctx.fail(&AuthError::Unauthenticated, "");
    };
    let params: ResizeChannelParams = match ctx.params().translate() {
        Ok(p) => p,
        Err(e) => return ctx.fail(&e, "malformed resize_channel request"),
    };
    let loaded = ctx.state.db.get_channel(&params.channel_id);
    let mut channel = match loaded {
        Ok(Some(c)) if c.wallet == wallet => c,
        Ok(Some(_)) => return ctx.fail(&AuthError::PermissionDenied, ""),
        Ok(None) => return ctx.fail_message("channel not found"),
        Err(e) => return ctx.fail(&e, "failed to load channel"),
    };
    if channel.is_challenged() {
        return ctx.fail(&nitro_ledger::LedgerError::ChallengedChannel, "");
    }
    channel.allocation = params.allocation;
    match ctx.state.db.put_channel(&channel) {
        Ok(()) => {
            let now_ms = ctx.now_ms;
            push_event(ctx.state, &[wallet], events::CHANNEL_UPDATE, json!({ "channel_id": params.channel_id.to_string(), "status": "resized" }), now_ms);
            succeed_json(ctx, methods::RESIZE_CHANNEL, json!({ "channel": channel }));
        }
        Err(e) => ctx.fail(&e, "failed to resize channel"),
    }
}
