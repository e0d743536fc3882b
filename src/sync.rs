//! # Synchronization Primitives
//!
//! Critical-section wrapper for the setup-phase API. Scheduler state
//! shared with the interrupt handlers must only be touched with
//! interrupts masked; thread bodies get no blocking primitives and
//! must not assume atomicity across instructions unless they mask
//! interrupts themselves.

use cortex_m::interrupt;

/// Execute a closure with interrupts disabled.
///
/// Keep the enclosed work short: the tick source cannot fire while a
/// critical section runs, so long sections stretch time-slices.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&interrupt::CriticalSection) -> R,
{
    interrupt::free(f)
}
