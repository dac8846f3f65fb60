//! Small synchronisation helpers shared across the crate.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the guard when a panicking handler poisoned
/// it. Continuations are caught before they can poison, so recovery here is
/// a second line of defence rather than an expected path.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
