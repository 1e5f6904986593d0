//! Typed event dispatch
//!
//! A dispatcher owns a list of boxed handlers for one event type. Handlers
//! run in registration order; returning `true` consumes the event and stops
//! propagation. Closures with the matching signature are handlers too.

/// Receives events of type `E`
pub trait EventHandler<E> {
    /// Handle one event; return `true` to consume it
    fn handle(&mut self, event: &E) -> bool;
}

impl<E, F: FnMut(&E) -> bool> EventHandler<E> for F {
    fn handle(&mut self, event: &E) -> bool {
        self(event)
    }
}

/// Ordered list of handlers for one event type
pub struct EventDispatcher<E> {
    handlers: Vec<Box<dyn EventHandler<E>>>,
}

impl<E> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventDispatcher<E> {
    /// Create a dispatcher with no handlers
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a handler; it runs after all previously registered ones
    pub fn register(&mut self, handler: Box<dyn EventHandler<E>>) {
        self.handlers.push(handler);
    }

    /// Deliver an event to handlers in order until one consumes it
    ///
    /// Returns `true` when some handler consumed the event.
    pub fn dispatch(&mut self, event: &E) -> bool {
        for handler in &mut self.handlers {
            if handler.handle(event) {
                return true;
            }
        }
        false
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<E> std::fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
