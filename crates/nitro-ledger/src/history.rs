use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use nitro_core::TimestampMs;

/// One row of `get_rpc_history`: a completed request/response pair. The
/// request and response hashes, not the full payloads, are retained — the
/// client already holds both and only needs them to reconcile after a
/// reconnect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcHistoryRecord {
    pub id: u64,
    pub user_id: Address,
    pub method: String,
    pub request_hash: String,
    pub response_hash: String,
    pub timestamp: TimestampMs,
}
