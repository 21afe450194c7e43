//! Typed observer registration.
//!
//! Replaces implicit signal wiring with explicit connect/disconnect:
//! every connection returns a [`HandlerId`] and detachment is always
//! deterministic, never left to garbage collection.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Token identifying one connected callback, used to disconnect it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

/// An ordered list of `Fn()` callbacks with stable handler ids.
///
/// Callbacks connected during an emit are not invoked until the next
/// emit; callbacks disconnected during an emit still run for the
/// current one.
pub struct Observers {
    next_id: Cell<u64>,
    slots: RefCell<Vec<(u64, Rc<dyn Fn()>)>>,
}

impl Observers {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            slots: RefCell::new(Vec::new()),
        }
    }

    pub fn connect(&self, callback: impl Fn() + 'static) -> HandlerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.slots.borrow_mut().push((id, Rc::new(callback)));
        HandlerId(id)
    }

    /// Returns false if the handler was already disconnected.
    pub fn disconnect(&self, id: HandlerId) -> bool {
        let mut slots = self.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|(slot_id, _)| *slot_id != id.0);
        slots.len() != before
    }

    pub fn emit(&self) {
        // Snapshot the callback list so connect/disconnect from inside a
        // callback cannot invalidate the iteration.
        let callbacks: Vec<Rc<dyn Fn()>> = self
            .slots
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}

impl Default for Observers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_connect_and_emit() {
        let observers = Observers::new();
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        observers.connect(move || c.set(c.get() + 1));

        observers.emit();
        observers.emit();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_disconnect() {
        let observers = Observers::new();
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        let id = observers.connect(move || c.set(c.get() + 1));

        observers.emit();
        assert!(observers.disconnect(id));
        observers.emit();

        assert_eq!(count.get(), 1);
        // Double disconnect is a no-op.
        assert!(!observers.disconnect(id));
    }

    #[test]
    fn test_handler_ids_are_unique() {
        let observers = Observers::new();
        let a = observers.connect(|| {});
        let b = observers.connect(|| {});
        assert_ne!(a, b);

        observers.disconnect(a);
        assert_eq!(observers.len(), 1);
        observers.disconnect(b);
        assert!(observers.is_empty());
    }

    #[test]
    fn test_disconnect_during_emit_runs_current_round() {
        let observers = Rc::new(Observers::new());
        let count = Rc::new(Cell::new(0));

        let c = count.clone();
        let obs = observers.clone();
        let id_slot = Rc::new(Cell::new(None));
        let id_ref = id_slot.clone();
        let id = observers.connect(move || {
            c.set(c.get() + 1);
            if let Some(id) = id_ref.get() {
                obs.disconnect(id);
            }
        });
        id_slot.set(Some(id));

        observers.emit();
        observers.emit();
        assert_eq!(count.get(), 1);
    }
}
