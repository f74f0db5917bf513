//! Protocol constants and defaults. Mirrors the defaults called out in
//! spec §6's Configuration section.

/// Default time a connection's outbound writer waits before the connection
/// is torn down as stalled.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 10;
pub const DEFAULT_PROCESS_BUFFER_SIZE: usize = 10;
pub const DEFAULT_CHALLENGE_TTL_SECS: i64 = 120;
pub const DEFAULT_TIMESTAMP_SKEW_SECS: i64 = 300;
pub const DEFAULT_JWT_TTL_SECS: i64 = 24 * 3600;

/// A session key whose application is this exact string has root scope:
/// it bypasses both allowance and application checks.
pub const ROOT_APPLICATION: &str = "clearnode";

pub const PROTOCOL_V0_2: &str = "NitroRPC/0.2";
pub const PROTOCOL_V0_4: &str = "NitroRPC/0.4";

pub mod methods {
    // Public — skip auth.
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const GET_CONFIG: &str = "get_config";
    pub const GET_ASSETS: &str = "get_assets";
    pub const GET_CHANNELS: &str = "get_channels";
    pub const GET_APP_DEFINITION: &str = "get_app_definition";
    pub const GET_APP_SESSIONS: &str = "get_app_sessions";
    pub const GET_LEDGER_ENTRIES: &str = "get_ledger_entries";
    pub const GET_LEDGER_TRANSACTIONS: &str = "get_ledger_transactions";
    pub const AUTH_REQUEST: &str = "auth_request";
    pub const AUTH_CHALLENGE: &str = "auth_challenge";
    pub const AUTH_VERIFY: &str = "auth_verify";

    // Private — require an authenticated user_id.
    pub const TRANSFER: &str = "transfer";
    pub const CREATE_APP_SESSION: &str = "create_app_session";
    pub const SUBMIT_APP_STATE: &str = "submit_app_state";
    pub const CLOSE_APP_SESSION: &str = "close_app_session";
    pub const CREATE_CHANNEL: &str = "create_channel";
    pub const CLOSE_CHANNEL: &str = "close_channel";
    pub const RESIZE_CHANNEL: &str = "resize_channel";
    pub const GET_USER_TAG: &str = "get_user_tag";
    pub const GET_SESSION_KEYS: &str = "get_session_keys";
    pub const REVOKE_SESSION_KEY: &str = "revoke_session_key";
    pub const GET_RPC_HISTORY: &str = "get_rpc_history";
    pub const GET_LEDGER_BALANCES: &str = "get_ledger_balances";

    // Test-only.
    pub const CLEANUP_SESSION_KEY_CACHE: &str = "cleanup_session_key_cache";

    pub const ERROR: &str = "error";

    /// Methods that do not require `Context::user_id` to be set.
    pub const PUBLIC: &[&str] = &[
        PING,
        GET_CONFIG,
        GET_ASSETS,
        GET_CHANNELS,
        GET_APP_DEFINITION,
        GET_APP_SESSIONS,
        GET_LEDGER_ENTRIES,
        GET_LEDGER_TRANSACTIONS,
        AUTH_REQUEST,
        AUTH_VERIFY,
    ];

    pub fn is_public(method: &str) -> bool {
        PUBLIC.contains(&method)
    }
}

pub mod events {
    /// Balance update.
    pub const BALANCE_UPDATE: &str = "bu";
    /// Channel update.
    pub const CHANNEL_UPDATE: &str = "cu";
    /// App-session update.
    pub const APP_SESSION_UPDATE: &str = "asu";
    /// Transfer.
    pub const TRANSFER: &str = "tr";
}
