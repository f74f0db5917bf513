use alloy_primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Amount, AssetSymbol, TimestampSecs};

/// The two protocol versions this codebase understands. New versions
/// extend this enum; they must never mutate the semantics of an existing
/// variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NitroRpcVersion {
    #[serde(rename = "NitroRPC/0.2")]
    V0_2,
    #[serde(rename = "NitroRPC/0.4")]
    V0_4,
}

impl NitroRpcVersion {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NitroRPC/0.2" => Some(Self::V0_2),
            "NitroRPC/0.4" => Some(Self::V0_4),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V0_2 => "NitroRPC/0.2",
            Self::V0_4 => "NitroRPC/0.4",
        }
    }
}

/// The closed enumeration of app-session update intents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Operate,
    Deposit,
    Withdraw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppSessionStatus {
    Open,
    Closed,
}

/// One line of a create/submit/close request's allocation list: a
/// participant's desired balance for one asset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub participant: Address,
    pub asset_symbol: AssetSymbol,
    pub amount: Amount,
}

/// `{session_id, application, protocol_version, participant_wallets[],
/// weights[], quorum, challenge, nonce, status, version, session_data,
/// created_at, updated_at}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppSession {
    pub session_id: B256,
    pub application: String,
    pub protocol_version: NitroRpcVersion,
    pub participant_wallets: Vec<Address>,
    pub weights: Vec<u64>,
    pub quorum: u64,
    pub challenge: String,
    pub nonce: u64,
    pub status: AppSessionStatus,
    pub version: u64,
    pub session_data: Option<serde_json::Value>,
    pub created_at: TimestampSecs,
    pub updated_at: TimestampSecs,
}

impl AppSession {
    pub fn weight_of(&self, participant: &Address) -> Option<u64> {
        self.participant_wallets
            .iter()
            .position(|p| p == participant)
            .map(|i| self.weights[i])
    }

    pub fn is_participant(&self, wallet: &Address) -> bool {
        self.participant_wallets.contains(wallet)
    }

    pub fn total_weight(&self) -> u64 {
        self.weights.iter().sum()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, AppSessionStatus::Open)
    }
}

/// Validates the creation-time shape invariants that must hold before any
/// mutation is attempted: `|participants| >= 2`, `|weights| ==
/// |participants|`, every weight `>= 0` (trivially true for `u64`),
/// `quorum <= sum(weights)`, `nonce != 0`, and a recognized protocol.
pub fn validate_definition_shape(
    protocol_version: &str,
    participants: &[Address],
    weights: &[u64],
    quorum: u64,
    nonce: u64,
) -> Result<NitroRpcVersion, CoreError> {
    let version = NitroRpcVersion::parse(protocol_version)
        .ok_or_else(|| CoreError::Malformed(format!("unrecognized protocol {protocol_version}")))?;
    if participants.len() < 2 {
        return Err(CoreError::Other("app session requires at least 2 participants".into()));
    }
    if weights.len() != participants.len() {
        return Err(CoreError::Other("weights length must match participants length".into()));
    }
    if nonce == 0 {
        return Err(CoreError::Other("nonce must be non-zero".into()));
    }
    let total: u64 = weights.iter().sum();
    if quorum > total {
        return Err(CoreError::Other(format!(
            "quorum {quorum} exceeds total weight {total}"
        )));
    }
    Ok(version)
}

/// The session id is the Keccak256 hash of the encoded app definition —
/// deterministic so two nodes deriving it from the same create request
/// agree without coordination.
pub fn compute_session_id(
    application: &str,
    protocol_version: &str,
    participants: &[Address],
    weights: &[u64],
    quorum: u64,
    nonce: u64,
    challenge: &str,
) -> B256 {
    let definition = serde_json::json!({
        "application": application,
        "protocol_version": protocol_version,
        "participants": participants.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        "weights": weights,
        "quorum": quorum,
        "nonce": nonce,
        "challenge": challenge,
    });
    let bytes = serde_json::to_vec(&definition).expect("definition is always serializable");
    keccak256(bytes)
}
