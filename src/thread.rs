//! # Thread Control Block
//!
//! Defines the thread descriptor for RondOS. A thread is an entry
//! procedure plus a caller-owned stack region; the scheduler stores one
//! descriptor per ring slot and never allocates.
//!
//! The descriptor's `stack_pointer` always references a fully formed
//! saved-context frame while the thread is not running: the registry
//! seeds a synthetic first frame before the thread has ever run, and
//! the context switcher rewrites the field on every suspension.

/// Entry procedure of a thread. Runs forever; the scheduler has no
/// notion of thread termination.
pub type ThreadEntry = extern "C" fn() -> !;

/// Reserved run-state flag.
///
/// Registration writes the neutral `Idle` value; nothing in the
/// dispatcher consults it yet. Kept as an extension point for a future
/// preemption-control feature (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Neutral value; the only one ever written.
    Idle,
    /// Not yet produced by the scheduler.
    Running,
}

/// Thread Control Block (TCB) — one ring slot.
///
/// The stack region behind `stack_base`/`stack_size` is owned by the
/// caller that registered the thread and must stay valid for the whole
/// program run. The region descriptor is fixed at registration and is
/// used to seed the initial stack pointer and for debug-only bound
/// checks; only `stack_pointer` changes afterwards.
pub struct Tcb {
    /// Entry procedure, `None` for a free slot.
    pub entry: Option<ThreadEntry>,

    /// Saved stack pointer. Rewritten on every suspension; between
    /// suspensions it points at the thread's topmost saved frame.
    pub stack_pointer: *mut u8,

    /// Lowest address of the thread's stack region.
    pub stack_base: *mut u8,

    /// Length of the stack region in bytes.
    pub stack_size: usize,

    /// Reserved flag, written only to `RunState::Idle`.
    pub run_state: RunState,
}

// Safety: the raw pointers always reference the thread's own
// caller-owned stack region, and TCBs are only mutated inside critical
// sections or from the single-interrupt-at-a-time handlers.
unsafe impl Send for Tcb {}
unsafe impl Sync for Tcb {}

impl Tcb {
    /// A free slot. Used to initialize the static ring array.
    pub const EMPTY: Self = Self {
        entry: None,
        stack_pointer: core::ptr::null_mut(),
        stack_base: core::ptr::null_mut(),
        stack_size: 0,
        run_state: RunState::Idle,
    };

    /// Fill a slot at registration time.
    ///
    /// `stack_pointer` must already reference the synthetic first frame
    /// seeded into the region by the port.
    pub fn bind(
        &mut self,
        entry: ThreadEntry,
        stack_base: *mut u8,
        stack_size: usize,
        stack_pointer: *mut u8,
    ) {
        self.entry = Some(entry);
        self.stack_base = stack_base;
        self.stack_size = stack_size;
        self.stack_pointer = stack_pointer;
        self.run_state = RunState::Idle;
    }

    /// Whether this slot holds a registered thread.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.entry.is_some()
    }

    /// One past the highest address of the stack region.
    #[inline]
    pub fn stack_top(&self) -> *mut u8 {
        self.stack_base.wrapping_add(self.stack_size)
    }

    /// Whether `sp` lies within this thread's stack region. Used by the
    /// debug-only bound check on suspension.
    #[inline]
    pub fn owns(&self, sp: *const u8) -> bool {
        let base = self.stack_base as usize;
        let sp = sp as usize;
        sp >= base && sp <= base + self.stack_size
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn spin() -> ! {
        loop {}
    }

    #[test]
    fn empty_slot_is_unbound() {
        let tcb = Tcb::EMPTY;
        assert!(!tcb.is_bound());
        assert!(tcb.stack_pointer.is_null());
        assert_eq!(tcb.stack_size, 0);
        assert_eq!(tcb.run_state, RunState::Idle);
    }

    #[test]
    fn bind_fills_descriptor() {
        let mut stack = [0u8; 64];
        let base = stack.as_mut_ptr();
        let sp = stack[32..].as_mut_ptr();

        let mut tcb = Tcb::EMPTY;
        tcb.bind(spin, base, stack.len(), sp);

        assert!(tcb.is_bound());
        assert_eq!(tcb.stack_pointer, sp);
        assert_eq!(tcb.stack_base, base);
        assert_eq!(tcb.stack_size, 64);
        assert_eq!(tcb.stack_top(), base.wrapping_add(64));
        assert_eq!(tcb.run_state, RunState::Idle);
    }

    #[test]
    fn owns_covers_the_region_inclusive() {
        let mut stack = [0u8; 64];
        let base = stack.as_mut_ptr();

        let mut tcb = Tcb::EMPTY;
        tcb.bind(spin, base, stack.len(), base.wrapping_add(64));

        assert!(tcb.owns(base));
        assert!(tcb.owns(base.wrapping_add(64)));
        assert!(!tcb.owns(base.wrapping_add(65)));
    }
}
