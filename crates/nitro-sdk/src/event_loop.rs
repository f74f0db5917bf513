//! Demultiplexes server-initiated frames (`request_id = 0`, method one of
//! the push-event names in [`nitro_core::constants::events`]) to registered
//! per-event callbacks. Per spec.md §5's "single writer lock around a
//! string→handler mapping", the registry is one [`parking_lot::RwLock`], not
//! a per-event lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use nitro_core::Response;

/// A user-supplied callback for one event type. Only one may be registered
/// per event name — a later [`EventLoop::on`] call for the same name
/// replaces the earlier one.
pub type EventHandler = Box<dyn Fn(Response) + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventLoop {
    handlers: Arc<RwLock<HashMap<String, EventHandler>>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, event: impl Into<String>, handler: EventHandler) {
        self.handlers.write().insert(event.into(), handler);
    }

    pub fn remove(&self, event: &str) {
        self.handlers.write().remove(event);
    }

    pub fn is_registered(&self, event: &str) -> bool {
        self.handlers.read().contains_key(event)
    }

    /// Routes one server-initiated frame to its registered handler, if any.
    /// Frames with no registered handler for their method are dropped
    /// silently — an unhandled push event is not an error.
    pub(crate) fn dispatch(&self, event: Response) {
        let method = event.0.payload.method.clone();
        let handlers = self.handlers.read();
        if let Some(handler) = handlers.get(&method) {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nitro_core::{Envelope, Params, Payload};

    use super::*;

    fn push(method: &str) -> Response {
        Response(Envelope::new(Payload::new(0, method, Params::empty(), 0)))
    }

    #[test]
    fn later_registration_overwrites_earlier_one() {
        let event_loop = EventLoop::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let first_counter = first.clone();
        event_loop.on("bu", Box::new(move |_| { first_counter.fetch_add(1, Ordering::SeqCst); }));
        let second_counter = second.clone();
        event_loop.on("bu", Box::new(move |_| { second_counter.fetch_add(1, Ordering::SeqCst); }));

        event_loop.dispatch(push("bu"));

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unhandled_event_is_dropped_silently() {
        let event_loop = EventLoop::new();
        event_loop.dispatch(push("cu"));
    }
}
