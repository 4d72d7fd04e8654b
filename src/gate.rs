//! Counting admission gate.

use std::sync::{Condvar, Mutex, PoisonError};

/// Lets at most `capacity` holders through at a time.
///
/// [`acquire`](Gate::acquire) blocks until a slot is free and returns a
/// [`Permit`]; dropping the permit frees the slot, which also happens while
/// unwinding from a panic.
#[derive(Debug)]
pub struct Gate {
    capacity: usize,
    available: Mutex<usize>,
    freed: Condvar,
}

impl Gate {
    /// A gate with `capacity` slots. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            available: Mutex::new(capacity),
            freed: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        *self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a slot is free and take it.
    pub fn acquire(&self) -> Permit<'_> {
        let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        while *available == 0 {
            available = self
                .freed
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        Permit { gate: self }
    }

    fn release(&self) {
        let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        *available += 1;
        self.freed.notify_one();
    }
}

/// A held slot; released on drop.
#[derive(Debug)]
pub struct Permit<'g> {
    gate: &'g Gate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
