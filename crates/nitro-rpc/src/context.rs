//! The per-request [`Context`]: a middleware/handler chain is a list of
//! function pointers, and `Context` carries the index into it. `next()`
//! advances and invokes the next link — the continuation-passing shape spec
//! §9 calls for instead of a trait-object chain, so the whole router is a
//! plain data table a test can assert against.

use std::collections::HashMap;

use alloy_primitives::{Address, B256};
use serde_json::Value;
use uuid::Uuid;

use nitro_core::{ClientSafe, CoreError, Params, Request, Response, TimestampMs, TimestampSecs};

use crate::state::AppState;

/// One link in a method's handler chain. Plain `fn`, not a boxed closure —
/// sled's own calls are synchronous, so nothing here needs to suspend.
pub type HandlerFn = fn(&mut Context);

pub struct Context<'a> {
    pub state: &'a AppState,
    pub request: &'a Request,
    pub connection_id: Uuid,
    pub user_id: Option<Address>,
    pub now: TimestampSecs,
    pub now_ms: TimestampMs,
    /// Scratch space a middleware can use to pass data to the handler it
    /// precedes (e.g. a resolved session key) without widening `Context`
    /// itself for every new concern.
    pub storage: HashMap<String, Value>,
    response: Response,
    chain: &'a [HandlerFn],
    index: usize,
}

impl<'a> Context<'a> {
    pub fn new(
        state: &'a AppState,
        request: &'a Request,
        connection_id: Uuid,
        user_id: Option<Address>,
        now: TimestampSecs,
        now_ms: TimestampMs,
        chain: &'a [HandlerFn],
    ) -> Self {
        let request_id = request.0.payload.request_id;
        Self {
            state,
            request,
            connection_id,
            user_id,
            now,
            now_ms,
            storage: HashMap::new(),
            response: Response::error(request_id, now_ms, "internal error"),
            chain,
            index: 0,
        }
    }

    pub fn method(&self) -> &str {
        &self.request.0.payload.method
    }

    pub fn params(&self) -> &Params {
        &self.request.0.payload.params
    }

    pub fn signatures(&self) -> &[String] {
        &self.request.0.signatures
    }

    pub fn request_hash(&self) -> Result<B256, CoreError> {
        self.request.0.payload.hash()
    }

    /// Runs the next link in the chain, if any. A terminal handler doesn't
    /// need to call this; a middleware that wants the chain to proceed must.
    pub fn next(&mut self) {
        if self.index >= self.chain.len() {
            return;
        }
        let handler = self.chain[self.index];
        self.index += 1;
        handler(self);
    }

    pub fn succeed(&mut self, method: impl Into<String>, params: Params) {
        self.response = Response::success(self.request.0.payload.request_id, method, params, self.now_ms);
    }

    /// `err`'s own message is used iff it reports itself client-safe;
    /// otherwise `fallback` is used, and a generic message if `fallback` is
    /// itself empty.
    pub fn fail<E: std::fmt::Display + ClientSafe>(&mut self, err: &E, fallback: &str) {
        let message = if err.is_client_safe() {
            err.to_string()
        } else if !fallback.is_empty() {
            fallback.to_string()
        } else {
            "internal error".to_string()
        };
        self.response = Response::error(self.request.0.payload.request_id, self.now_ms, message);
    }

    pub fn fail_message(&mut self, message: impl Into<String>) {
        self.response = Response::error(self.request.0.payload.request_id, self.now_ms, message);
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}
