//! Named handler registry.
//!
//! Maps an event name to the ordered list of handlers registered for it.
//! `message`, `open` and `error` are ordinary names in the same map.

use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{
    handler::EventHandler,
    types::{ERROR_EVENT, Event, MESSAGE_EVENT, OPEN_EVENT},
};

type HandlerList = Vec<Arc<dyn EventHandler>>;

/// Append-only registry of event handlers.
///
/// Registration takes the write lock briefly; dispatch clones the handler list
/// for the event's name under the read lock and invokes it after releasing
/// the lock, so a handler may register further handlers without deadlocking.
/// Those additions take effect from the next dispatch.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, HandlerList>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `name`.
    pub fn add_event_listener<H: EventHandler>(&self, name: impl Into<String>, handler: H) {
        self.handlers
            .write()
            .entry(name.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Register a handler for unnamed (`message`) events.
    pub fn on_message<H: EventHandler>(&self, handler: H) {
        self.add_event_listener(MESSAGE_EVENT, handler);
    }

    /// Register a handler for the `open` event.
    pub fn on_open<H: EventHandler>(&self, handler: H) {
        self.add_event_listener(OPEN_EVENT, handler);
    }

    /// Register a handler for the `error` event.
    pub fn on_error<H: EventHandler>(&self, handler: H) {
        self.add_event_listener(ERROR_EVENT, handler);
    }

    /// Number of handlers registered for `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers.read().get(name).map_or(0, Vec::len)
    }

    /// Invoke every handler registered for `event.event`, in order.
    ///
    /// Returns how many handlers ran. No handlers is a silent no-op.
    pub fn dispatch(&self, event: &Event) -> usize {
        let snapshot = match self.handlers.read().get(event.event_type()) {
            Some(list) => list.clone(),
            None => return 0,
        };

        for handler in &snapshot {
            handler.handle(event);
        }
        snapshot.len()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let mut map = f.debug_map();
        for (name, list) in handlers.iter() {
            map.entry(name, &list.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes_utils::Str;

    use super::*;
    use crate::types::ConnectionState;

    fn named(name: &'static str, data: &'static str) -> Event {
        Event {
            id: None,
            event: Str::from_static(name),
            data: Str::from_static(data),
            retry: None,
            ready_state: ConnectionState::Open,
            error: None,
        }
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&log);
        registry.on_message(move |e: &Event| first.lock().unwrap().push(format!("1:{}", e.data())));
        let second = Arc::clone(&log);
        registry.on_message(move |e: &Event| second.lock().unwrap().push(format!("2:{}", e.data())));

        assert_eq!(registry.dispatch(&named("message", "hi")), 2);
        assert_eq!(*log.lock().unwrap(), vec!["1:hi", "2:hi"]);
    }

    #[test]
    fn test_names_are_independent() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        registry.add_event_listener("add", move |_: &Event| l.lock().unwrap().push("add"));
        let l = Arc::clone(&log);
        registry.add_event_listener("remove", move |_: &Event| l.lock().unwrap().push("remove"));

        registry.dispatch(&named("remove", ""));
        registry.dispatch(&named("add", ""));
        assert_eq!(*log.lock().unwrap(), vec!["remove", "add"]);
        assert_eq!(registry.handler_count("add"), 1);
        assert_eq!(registry.handler_count("message"), 0);
    }

    #[test]
    fn test_dispatch_without_handlers_is_noop() {
        let registry = HandlerRegistry::new();
        assert_eq!(registry.dispatch(&named("nobody", "x")), 0);
    }

    #[test]
    fn test_convenience_registrations_use_reserved_names() {
        let registry = HandlerRegistry::new();
        registry.on_message(|_: &Event| {});
        registry.on_open(|_: &Event| {});
        registry.on_error(|_: &Event| {});
        registry.add_event_listener(MESSAGE_EVENT, |_: &Event| {});

        assert_eq!(registry.handler_count(MESSAGE_EVENT), 2);
        assert_eq!(registry.handler_count(OPEN_EVENT), 1);
        assert_eq!(registry.handler_count(ERROR_EVENT), 1);
    }

    #[test]
    fn test_registration_during_dispatch_applies_next_time() {
        let registry = Arc::new(HandlerRegistry::new());
        let calls = Arc::new(Mutex::new(0usize));

        let inner_registry = Arc::clone(&registry);
        let inner_calls = Arc::clone(&calls);
        registry.on_message(move |_: &Event| {
            let c = Arc::clone(&inner_calls);
            inner_registry.on_message(move |_: &Event| *c.lock().unwrap() += 1);
        });

        assert_eq!(registry.dispatch(&named("message", "")), 1);
        assert_eq!(*calls.lock().unwrap(), 0);

        assert_eq!(registry.dispatch(&named("message", "")), 2);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_debug_lists_counts() {
        let registry = HandlerRegistry::new();
        registry.on_open(|_: &Event| {});
        assert_eq!(format!("{registry:?}"), "{\"open\": 1}");
    }
}
