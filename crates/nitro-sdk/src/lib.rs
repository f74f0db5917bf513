//! The client-side half of the wire protocol: a signing request/response
//! client and the event loop that demultiplexes server-pushed frames to
//! user-registered handlers. This workspace's analogue of `chronx-wallet`.

pub mod client;
pub mod error;
pub mod event_loop;

pub use client::NitroClient;
pub use error::{SdkError, SdkResult};
pub use event_loop::{EventHandler, EventLoop};
