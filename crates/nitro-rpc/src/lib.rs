//! The method router, per-connection websocket plumbing, and the handler
//! catalogue that together answer every request in the method table.
//! `nitro-node` builds one [`AppState`] at startup and hands it, along with
//! [`build_router`]'s [`RpcRouter`], to [`connection::serve`] for each
//! accepted socket.

pub mod connection;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod notifier;
pub mod state;

pub use connection::{serve, Connection};
pub use context::{Context, HandlerFn};
pub use dispatch::{build_router, RpcRouter};
pub use error::{RpcError, RpcResult};
pub use notifier::Notifier;
pub use state::{AppState, RpcConfig};
