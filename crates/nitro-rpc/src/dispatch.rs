//! The method router: an explicit `HashMap<&'static str, Vec<HandlerFn>>`
//! built once at startup, not a trait impl per method — so the full method
//! catalogue is a table a test can walk and assert against, per spec §9's
//! design note on this point.

use std::collections::HashMap;

use alloy_primitives::Address;
use uuid::Uuid;

use nitro_auth::AuthError;
use nitro_core::constants::methods;
use nitro_core::{Request, Response, TimestampMs, TimestampSecs};
use nitro_crypto::Signer;

use crate::context::{Context, HandlerFn};
use crate::error::RpcError;
use crate::handlers;
use crate::state::AppState;

pub struct RpcRouter {
    routes: HashMap<&'static str, Vec<HandlerFn>>,
}

impl RpcRouter {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    pub fn register(&mut self, method: &'static str, chain: Vec<HandlerFn>) {
        self.routes.insert(method, chain);
    }

    pub fn methods(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.routes.keys().copied()
    }

    /// Routes `request`, enforcing the timestamp-skew window before any
    /// handler runs, and signs whatever response comes out the other end —
    /// success or failure, every frame this node emits carries its
    /// signature. Returns the signed response and the connection's possibly
    /// updated identity (set the first time `auth_verify` succeeds).
    pub fn dispatch(
        &self,
        state: &AppState,
        request: &Request,
        connection_id: Uuid,
        user_id: &mut Option<Address>,
        now: TimestampSecs,
        now_ms: TimestampMs,
    ) -> Response {
        let method = request.0.payload.method.as_str();

        let request_secs = (request.0.payload.timestamp / 1000) as i64;
        if (request_secs - now).abs() > state.config.timestamp_skew_secs {
            return self.sign(state, Response::error(request.0.payload.request_id, now_ms, RpcError::TimestampOutOfRange.to_string()));
        }

        let Some(chain) = self.routes.get(method) else {
            let err = RpcError::UnknownMethod(method.to_string());
            return self.sign(state, Response::error(request.0.payload.request_id, now_ms, err.to_string()));
        };

        let mut ctx = Context::new(state, request, connection_id, *user_id, now, now_ms, chain);
        ctx.next();
        *user_id = ctx.user_id;
        self.sign(state, ctx.into_response())
    }

    fn sign(&self, state: &AppState, response: Response) -> Response {
        match response.0.payload.hash() {
            Ok(hash) => {
                let sig = state.signer.sign_hash(hash);
                Response(response.0.with_signature(sig.to_hex()))
            }
            Err(_) => response,
        }
    }
}

impl Default for RpcRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Requires `Context::user_id` to already be set — by a prior `auth_verify`
/// on this same connection — before the chain proceeds.
fn require_auth(ctx: &mut Context) {
    if ctx.user_id.is_none() {
        ctx.fail(&AuthError::Unauthenticated, "");
        return;
    }
    ctx.next();
}

/// Builds the full method table: public methods run with no prelude,
/// private methods are prefixed with [`require_auth`].
pub fn build_router() -> RpcRouter {
    let mut router = RpcRouter::new();

    router.register(methods::PING, vec![handlers::ping]);
    router.register(methods::GET_CONFIG, vec![handlers::get_config]);
    router.register(methods::GET_ASSETS, vec![handlers::get_assets]);
    router.register(methods::GET_CHANNELS, vec![handlers::get_channels]);
    router.register(methods::GET_APP_DEFINITION, vec![handlers::get_app_definition]);
    router.register(methods::GET_APP_SESSIONS, vec![handlers::get_app_sessions]);
    router.register(methods::GET_LEDGER_ENTRIES, vec![handlers::get_ledger_entries]);
    router.register(methods::GET_LEDGER_TRANSACTIONS, vec![handlers::get_ledger_transactions]);
    router.register(methods::AUTH_REQUEST, vec![handlers::auth_request]);
    router.register(methods::AUTH_VERIFY, vec![handlers::auth_verify]);

    router.register(methods::TRANSFER, vec![require_auth, handlers::transfer]);
    router.register(methods::CREATE_APP_SESSION, vec![require_auth, handlers::create_app_session]);
    router.register(methods::SUBMIT_APP_STATE, vec![require_auth, handlers::submit_app_state]);
    router.register(methods::CLOSE_APP_SESSION, vec![require_auth, handlers::close_app_session]);
    router.register(methods::CREATE_CHANNEL, vec![require_auth, handlers::create_channel]);
    router.register(methods::CLOSE_CHANNEL, vec![require_auth, handlers::close_channel]);
    router.register(methods::RESIZE_CHANNEL, vec![require_auth, handlers::resize_channel]);
    router.register(methods::GET_USER_TAG, vec![require_auth, handlers::get_user_tag]);
    router.register(methods::GET_SESSION_KEYS, vec![require_auth, handlers::get_session_keys]);
    router.register(methods::REVOKE_SESSION_KEY, vec![require_auth, handlers::revoke_session_key]);
    router.register(methods::GET_RPC_HISTORY, vec![require_auth, handlers::get_rpc_history]);
    router.register(methods::GET_LEDGER_BALANCES, vec![require_auth, handlers::get_ledger_balances]);

    router.register(methods::CLEANUP_SESSION_KEY_CACHE, vec![handlers::cleanup_session_key_cache]);

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_public_method_is_registered_without_require_auth() {
        let router = build_router();
        for method in methods::PUBLIC {
            assert!(router.routes.contains_key(method), "missing route for {method}");
        }
    }

    #[test]
    fn unknown_method_is_registered_nowhere() {
        let router = build_router();
        assert!(!router.routes.contains_key("not_a_method"));
    }
}
