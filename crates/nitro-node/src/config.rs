//! CLI configuration, mirroring `chronx-node::Args` — one `clap` struct
//! covering everything the startup sequence needs, with the same "sensible
//! local-dev defaults, override for production" posture.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use nitro_core::constants::{
    DEFAULT_CHALLENGE_TTL_SECS, DEFAULT_JWT_TTL_SECS, DEFAULT_PROCESS_BUFFER_SIZE,
    DEFAULT_TIMESTAMP_SKEW_SECS, DEFAULT_WRITE_BUFFER_SIZE, DEFAULT_WRITE_TIMEOUT_SECS,
};
use nitro_rpc::RpcConfig;

#[derive(Parser, Debug)]
#[command(name = "nitro-node", version, about = "ClearNode off-chain clearing node")]
pub struct Args {
    /// Directory for the persistent ledger database.
    #[arg(long, default_value = "~/.nitro/data")]
    pub data_dir: PathBuf,

    /// Websocket listen address.
    #[arg(long, default_value = "127.0.0.1:8548")]
    pub rpc_addr: SocketAddr,

    /// JSON array of `{symbol, chain_id, token_address, decimals}` to seed
    /// on a fresh database. Only consulted when no assets are registered
    /// yet.
    #[arg(long)]
    pub assets_file: Option<PathBuf>,

    /// Hex-encoded 32-byte ECDSA signing key for this node's identity. If
    /// omitted, an ephemeral key is generated — fine for local development,
    /// never for a node whose signature other nodes are expected to trust
    /// across restarts.
    #[arg(long)]
    pub signer_key: Option<String>,

    /// Secret the bearer-JWT issuer signs with (HS256). If omitted, an
    /// ephemeral secret is generated — tokens will not validate across
    /// restarts.
    #[arg(long)]
    pub jwt_secret: Option<String>,

    #[arg(long, default_value_t = DEFAULT_WRITE_TIMEOUT_SECS)]
    pub write_timeout_secs: u64,

    #[arg(long, default_value_t = DEFAULT_WRITE_BUFFER_SIZE)]
    pub write_buffer_size: usize,

    #[arg(long, default_value_t = DEFAULT_PROCESS_BUFFER_SIZE)]
    pub process_buffer_size: usize,

    #[arg(long, default_value_t = DEFAULT_CHALLENGE_TTL_SECS)]
    pub challenge_ttl_secs: i64,

    #[arg(long, default_value_t = DEFAULT_TIMESTAMP_SKEW_SECS)]
    pub timestamp_skew_secs: i64,

    #[arg(long, default_value_t = DEFAULT_JWT_TTL_SECS)]
    pub jwt_ttl_secs: i64,

    #[arg(long, default_value_t = 50)]
    pub rpc_history_page_size: usize,
}

impl Args {
    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            write_timeout_secs: self.write_timeout_secs,
            write_buffer_size: self.write_buffer_size,
            process_buffer_size: self.process_buffer_size,
            challenge_ttl_secs: self.challenge_ttl_secs,
            timestamp_skew_secs: self.timestamp_skew_secs,
            jwt_ttl_secs: self.jwt_ttl_secs,
            rpc_history_page_size: self.rpc_history_page_size,
        }
    }
}

/// Expands a leading `~` to the user's home directory (`HOME` or
/// `USERPROFILE`).
pub fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
