//! # Scheduler
//!
//! Core scheduling logic for RondOS: a fixed ring of threads dispatched
//! round-robin, one tick per thread, forever.
//!
//! ## Ring model
//!
//! Threads live in a fixed-capacity array of TCB slots filled in
//! registration order during the single-threaded setup phase. Slot 0 is
//! the ring's head and the first thread dispatched; successor and
//! predecessor are modular index arithmetic, so the ring is closed by
//! construction and registration order is execution order.
//!
//! ## Per tick
//!
//! 1. The tick source bumps the tick counter (`on_tick`)
//! 2. The port's switch path captures the running thread's registers
//!    and hands the resulting stack pointer to `suspend_current`
//! 3. `dispatch_next` advances the ring and returns the next thread's
//!    saved stack pointer for the port to restore
//!
//! There is no priority check and no voluntary yield; every thread gets
//! an identical time-slice. The hot paths carry no checks beyond
//! debug-only assertions compiled out of release builds.

use core::fmt;
use core::marker::PhantomData;

use crate::arch::Port;
use crate::config::MAX_THREADS;
use crate::thread::{Tcb, ThreadEntry};

// ---------------------------------------------------------------------------
// Registration errors
// ---------------------------------------------------------------------------

/// Setup-time registration failures. Nothing on the tick or switch
/// paths can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// All ring slots are taken (`MAX_THREADS`).
    TooManyThreads,
    /// The supplied stack region cannot hold the synthetic first frame.
    StackTooSmall,
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::TooManyThreads => write!(f, "maximum number of threads reached"),
            RegisterError::StackTooSmall => write!(f, "stack region too small for a context frame"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// The scheduler state: thread ring, current slot, tick counter.
///
/// An explicit object rather than a hidden global; the top-level driver
/// in `kernel.rs` owns the single production instance and injects it
/// into the interrupt handlers, and tests construct their own.
pub struct Scheduler<P: Port> {
    /// Ring slots, filled in registration order.
    threads: [Tcb; MAX_THREADS],

    /// Number of registered threads.
    count: usize,

    /// Slot of the currently running thread (the ring's head until the
    /// first tick after first dispatch).
    current: usize,

    /// Ticks delivered by the preemption source since boot.
    ticks: u32,

    _port: PhantomData<P>,
}

impl<P: Port> Scheduler<P> {
    pub const fn new() -> Self {
        Self {
            threads: [Tcb::EMPTY; MAX_THREADS],
            count: 0,
            current: 0,
            ticks: 0,
            _port: PhantomData,
        }
    }

    // -- registration (setup phase only) ------------------------------------

    /// Append a thread to the ring.
    ///
    /// The first registered thread becomes the ring's head and is the
    /// first dispatched. The caller keeps ownership of `stack`, which
    /// is seeded with a synthetic first suspended frame so that the
    /// restore path finds a fully formed context even though the thread
    /// has never run.
    ///
    /// Must not be called once the scheduler has started: registration
    /// races with the live ring and is out of contract.
    pub fn register(
        &mut self,
        entry: ThreadEntry,
        stack: &'static mut [u8],
    ) -> Result<usize, RegisterError> {
        if self.count >= MAX_THREADS {
            return Err(RegisterError::TooManyThreads);
        }
        if stack.len() < P::MIN_STACK {
            return Err(RegisterError::StackTooSmall);
        }

        let slot = self.count;
        let base = stack.as_mut_ptr();
        let size = stack.len();
        let sp = P::seed_frame(stack, entry);
        self.threads[slot].bind(entry, base, size, sp);
        self.count += 1;
        Ok(slot)
    }

    /// Number of registered threads.
    #[inline]
    pub fn thread_count(&self) -> usize {
        self.count
    }

    /// Slot of the currently running thread.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Ticks delivered since boot.
    #[inline]
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// The descriptor in `slot`.
    #[inline]
    pub fn thread(&self, slot: usize) -> &Tcb {
        &self.threads[slot]
    }

    // -- ring links ---------------------------------------------------------

    /// Slot following `slot` in the ring.
    #[inline]
    pub fn successor(&self, slot: usize) -> usize {
        (slot + 1) % self.count
    }

    /// Slot preceding `slot` in the ring.
    #[inline]
    pub fn predecessor(&self, slot: usize) -> usize {
        (slot + self.count - 1) % self.count
    }

    // -- hot paths ----------------------------------------------------------

    /// Tick bookkeeping. Called from the preemption interrupt on every
    /// firing, immediately before the switch is requested.
    #[inline]
    pub fn on_tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
    }

    /// Persist the suspended thread's stack pointer into its
    /// descriptor. `sp` is the value left after the port captured the
    /// full register set onto the thread's own stack.
    #[inline]
    pub fn suspend_current(&mut self, sp: *mut u8) {
        debug_assert!(
            self.threads[self.current].owns(sp),
            "suspended stack pointer outside the thread's stack region"
        );
        self.threads[self.current].stack_pointer = sp;
    }

    /// Advance the ring and return the next thread's saved stack
    /// pointer for the port to restore.
    #[inline]
    pub fn dispatch_next(&mut self) -> *mut u8 {
        debug_assert!(self.count > 0, "dispatch on an empty ring");
        self.current = self.successor(self.current);
        self.threads[self.current].stack_pointer
    }

    // -- first dispatch -----------------------------------------------------

    /// Saved stack pointer of the ring's head, for the one-time first
    /// dispatch at boot.
    ///
    /// Starting with an empty ring is a fatal precondition violation;
    /// this runs once, off the hot paths, so the guard is unconditional.
    pub fn first_stack(&self) -> *mut u8 {
        assert!(self.count > 0, "cannot start the scheduler with no threads");
        self.threads[self.current].stack_pointer
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::sim::{SimExecutor, SimPort};
    use std::boxed::Box;

    extern "C" fn spin() -> ! {
        loop {}
    }

    fn stack() -> &'static mut [u8] {
        Box::leak(Box::new([0u8; 256])).as_mut_slice()
    }

    fn ring_of(n: usize) -> Scheduler<SimPort> {
        let mut sched = Scheduler::new();
        for _ in 0..n {
            sched.register(spin, stack()).unwrap();
        }
        sched
    }

    #[test]
    fn registration_fills_slots_in_call_order() {
        let mut sched: Scheduler<SimPort> = Scheduler::new();
        assert_eq!(sched.thread_count(), 0);

        for expected in 0..3 {
            let slot = sched.register(spin, stack()).unwrap();
            assert_eq!(slot, expected);
        }
        assert_eq!(sched.thread_count(), 3);
        assert_eq!(sched.current(), 0);
        for slot in 0..3 {
            assert!(sched.thread(slot).is_bound());
        }
    }

    #[test]
    fn registration_seeds_a_first_frame() {
        let mut sched: Scheduler<SimPort> = Scheduler::new();
        sched.register(spin, stack()).unwrap();

        let tcb = sched.thread(0);
        assert!(tcb.owns(tcb.stack_pointer));
        assert_eq!(SimPort::frame_entry(tcb.stack_pointer), spin as usize);
    }

    #[test]
    fn registration_rejects_a_full_ring() {
        let mut sched = ring_of(MAX_THREADS);
        assert_eq!(
            sched.register(spin, stack()),
            Err(RegisterError::TooManyThreads)
        );
        assert_eq!(sched.thread_count(), MAX_THREADS);
    }

    #[test]
    fn registration_rejects_an_undersized_stack() {
        let mut sched: Scheduler<SimPort> = Scheduler::new();
        let tiny = Box::leak(Box::new([0u8; 8])).as_mut_slice();
        assert_eq!(sched.register(spin, tiny), Err(RegisterError::StackTooSmall));
        assert_eq!(sched.thread_count(), 0);
    }

    #[test]
    fn ring_is_closed_for_a_single_thread() {
        let sched = ring_of(1);
        assert_eq!(sched.successor(0), 0);
        assert_eq!(sched.predecessor(0), 0);
    }

    #[test]
    fn ring_closure_round_trips_in_both_directions() {
        let n = 5;
        let sched = ring_of(n);
        for start in 0..n {
            let mut forward = start;
            let mut backward = start;
            for _ in 0..n {
                forward = sched.successor(forward);
                backward = sched.predecessor(backward);
            }
            assert_eq!(forward, start);
            assert_eq!(backward, start);
        }
    }

    #[test]
    fn seven_ticks_dispatch_a_b_c_a_b_c_a() {
        let mut sched = ring_of(3);

        // Tick 0 is the first dispatch to the head; each firing
        // afterwards advances one position.
        let mut log = std::vec![sched.current()];
        for _ in 0..6 {
            sched.on_tick();
            sched.dispatch_next();
            log.push(sched.current());
        }
        assert_eq!(log, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn m_rounds_dispatch_every_thread_exactly_m_times() {
        let n = 4;
        let m = 6;
        let mut sched = ring_of(n);

        let mut dispatches = [0u32; 4];
        dispatches[sched.current()] += 1;
        for _ in 0..(m * n - 1) {
            sched.on_tick();
            sched.dispatch_next();
            dispatches[sched.current()] += 1;
        }
        assert_eq!(dispatches, [m as u32; 4]);
    }

    #[test]
    fn each_slice_runs_its_thread_exactly_once() {
        let mut sched = ring_of(3);
        let mut machine = SimExecutor::new();

        machine.run_slice(sched.current());
        for _ in 0..20 {
            sched.on_tick();
            sched.dispatch_next();
            machine.run_slice(sched.current());
        }

        // 21 slices over 3 threads: no lost or duplicated execution.
        for slot in 0..3 {
            assert_eq!(machine.slices(slot), 7);
        }
    }

    #[test]
    fn ticks_accumulate_one_per_firing() {
        let mut sched = ring_of(2);
        assert_eq!(sched.ticks(), 0);
        for expected in 1..=50 {
            sched.on_tick();
            sched.dispatch_next();
            assert_eq!(sched.ticks(), expected);
        }
    }

    #[test]
    fn suspension_persists_the_stack_pointer() {
        let mut sched = ring_of(2);

        // Model a capture that pushed one frame below the seeded one.
        let sp = sched.thread(0).stack_pointer.wrapping_sub(16);
        sched.suspend_current(sp);
        assert_eq!(sched.thread(0).stack_pointer, sp);

        // The other thread's saved frame is untouched.
        let other = sched.thread(1);
        assert!(other.owns(other.stack_pointer));
    }

    #[test]
    fn dispatch_resumes_from_the_persisted_pointer() {
        let mut sched = ring_of(2);
        let sp = sched.thread(1).stack_pointer.wrapping_sub(32);

        sched.on_tick();
        sched.dispatch_next();
        sched.suspend_current(sp);

        sched.on_tick();
        sched.dispatch_next(); // back around to slot 0
        sched.on_tick();
        assert_eq!(sched.dispatch_next(), sp);
    }

    #[test]
    #[should_panic(expected = "no threads")]
    fn starting_with_an_empty_ring_is_fatal() {
        let sched: Scheduler<SimPort> = Scheduler::new();
        sched.first_stack();
    }

    #[test]
    fn first_dispatch_targets_the_first_registered_thread() {
        let sched = ring_of(3);
        assert_eq!(sched.first_stack(), sched.thread(0).stack_pointer);
    }
}
