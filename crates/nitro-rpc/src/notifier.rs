//! Fans server-initiated push events (`bu`/`cu`/`asu`/`tr`, spec's event
//! catalogue) out to the connections subscribed to the wallets they concern.
//! `dashmap` gives every handler lock-free access to the registry on the hot
//! commit path, the same tradeoff [`nitro_auth::ChallengeCache`] makes.

use alloy_primitives::Address;
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use nitro_core::Response;

#[derive(Clone, Default)]
pub struct Notifier {
    connections: std::sync::Arc<DashMap<Uuid, UnboundedSender<Vec<u8>>>>,
    by_wallet: std::sync::Arc<DashMap<Address, Vec<Uuid>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: Uuid, outbound: UnboundedSender<Vec<u8>>) {
        self.connections.insert(connection_id, outbound);
    }

    /// Subscribes a connection to push events addressed to `wallet`. Called
    /// once a connection authenticates.
    pub fn bind_wallet(&self, connection_id: Uuid, wallet: Address) {
        self.by_wallet.entry(wallet).or_default().push(connection_id);
    }

    pub fn unregister(&self, connection_id: Uuid) {
        self.connections.remove(&connection_id);
        for mut entry in self.by_wallet.iter_mut() {
            entry.retain(|id| *id != connection_id);
        }
    }

    pub fn notify_wallet(&self, wallet: Address, event: &Response) {
        let Ok(bytes) = event.encode() else { return };
        let Some(ids) = self.by_wallet.get(&wallet) else { return };
        for id in ids.iter() {
            if let Some(tx) = self.connections.get(id) {
                let _ = tx.send(bytes.clone());
            }
        }
    }

    pub fn notify_wallets(&self, wallets: &[Address], event: &Response) {
        for wallet in wallets {
            self.notify_wallet(*wallet, event);
        }
    }
}
