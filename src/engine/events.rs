//! Lifecycle observable.
//!
//! Each tag instance carries one of these for its lifecycle notifications:
//! `before-mount`, `mount`, `update`, `updated`, `before-unmount`, `unmount`.
//! Handlers run synchronously, in registration order, against a snapshot of
//! the handler list, so a handler may subscribe or unsubscribe freely while
//! an event is being delivered.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type Handler<T> = Rc<dyn Fn(&T)>;

struct Entry<T> {
    id: u64,
    event: String,
    once: bool,
    handler: Handler<T>,
}

pub struct Observable<T> {
    entries: RefCell<Vec<Entry<T>>>,
    next_id: Cell<u64>,
}

impl<T> Observable<T> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Subscribe.
    pub fn on(&self, event: &str, handler: Handler<T>) {
        self.add(event, handler, false);
    }

    /// Subscribe for a single delivery.
    pub fn one(&self, event: &str, handler: Handler<T>) {
        self.add(event, handler, true);
    }

    fn add(&self, event: &str, handler: Handler<T>, once: bool) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push(Entry {
            id,
            event: event.to_string(),
            once,
            handler,
        });
    }

    /// Remove every handler for an event name.
    pub fn off(&self, event: &str) {
        self.entries.borrow_mut().retain(|e| e.event != event);
    }

    /// Deliver an event to every matching handler.
    pub fn trigger(&self, payload: &T, event: &str) {
        let matching: Vec<(u64, bool, Handler<T>)> = self
            .entries
            .borrow()
            .iter()
            .filter(|e| e.event == event)
            .map(|e| (e.id, e.once, e.handler.clone()))
            .collect();

        // drop one-shot entries before running, so re-entrant triggers
        // cannot deliver them twice
        let once_ids: Vec<u64> = matching
            .iter()
            .filter(|(_, once, _)| *once)
            .map(|(id, _, _)| *id)
            .collect();
        if !once_ids.is_empty() {
            self.entries
                .borrow_mut()
                .retain(|e| !once_ids.contains(&e.id));
        }

        for (_, _, handler) in matching {
            handler(payload);
        }
    }
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}
