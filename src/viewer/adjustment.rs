//! Scroll-axis state in the classic adjustment shape: a value inside
//! `[lower, upper]` with a viewport page riding on it.

use std::cell::Cell;

use crate::observers::{HandlerId, Observers};

/// One scrollable axis. "changed" fires on range reconfiguration,
/// "value-changed" when the value moves.
pub struct Adjustment {
    value: Cell<f64>,
    lower: Cell<f64>,
    upper: Cell<f64>,
    page_size: Cell<f64>,
    step_increment: Cell<f64>,
    page_increment: Cell<f64>,
    changed: Observers,
    value_changed: Observers,
}

impl Adjustment {
    pub fn new() -> Self {
        Self {
            value: Cell::new(0.0),
            lower: Cell::new(0.0),
            upper: Cell::new(0.0),
            page_size: Cell::new(0.0),
            step_increment: Cell::new(0.0),
            page_increment: Cell::new(0.0),
            changed: Observers::new(),
            value_changed: Observers::new(),
        }
    }

    pub fn value(&self) -> f64 {
        self.value.get()
    }

    pub fn lower(&self) -> f64 {
        self.lower.get()
    }

    pub fn upper(&self) -> f64 {
        self.upper.get()
    }

    pub fn page_size(&self) -> f64 {
        self.page_size.get()
    }

    pub fn step_increment(&self) -> f64 {
        self.step_increment.get()
    }

    pub fn page_increment(&self) -> f64 {
        self.page_increment.get()
    }

    fn clamp(&self, value: f64) -> f64 {
        // The lower bound wins when the range is degenerate.
        let max_value = (self.upper.get() - self.page_size.get()).max(self.lower.get());
        value.clamp(self.lower.get(), max_value)
    }

    /// Set the value, clamped into the valid range. Fires
    /// "value-changed" and returns true only when the stored value
    /// actually moved.
    pub fn set_value(&self, value: f64) -> bool {
        let clamped = self.clamp(value);
        if clamped == self.value.get() {
            return false;
        }
        self.value.set(clamped);
        self.value_changed.emit();
        true
    }

    /// Reconfigure the whole range. Fires "changed" unconditionally and
    /// "value-changed" when the clamp moved the value; returns whether
    /// it did.
    pub fn configure(
        &self,
        lower: f64,
        upper: f64,
        page_size: f64,
        step_increment: f64,
        page_increment: f64,
    ) -> bool {
        self.lower.set(lower);
        self.upper.set(upper);
        self.page_size.set(page_size);
        self.step_increment.set(step_increment);
        self.page_increment.set(page_increment);

        let clamped = self.clamp(self.value.get());
        let moved = clamped != self.value.get();
        self.value.set(clamped);

        self.changed.emit();
        if moved {
            self.value_changed.emit();
        }
        moved
    }

    pub fn connect_changed(&self, callback: impl Fn() + 'static) -> HandlerId {
        self.changed.connect(callback)
    }

    pub fn connect_value_changed(&self, callback: impl Fn() + 'static) -> HandlerId {
        self.value_changed.connect(callback)
    }

    pub fn disconnect_changed(&self, id: HandlerId) -> bool {
        self.changed.disconnect(id)
    }

    pub fn disconnect_value_changed(&self, id: HandlerId) -> bool {
        self.value_changed.disconnect(id)
    }
}

impl Default for Adjustment {
    fn default() -> Self {
        Self::new()
    }
}
