//! # Kernel
//!
//! Top-level driver and public API for RondOS.
//!
//! The kernel owns the single scheduler instance and the elapsed
//! clock, wires them into the interrupt handlers, and coordinates
//! system startup. Setup-phase functions use critical sections; the
//! millisecond queries go through the clock's atomic counter and need
//! none.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()       ← Reset driver state
//!         ├─► kernel::register()   ← Add threads (×N, in ring order)
//!         └─► kernel::start()      ← Launch the ring (no return)
//!               ├─► Calibrate + start the millisecond timer
//!               ├─► Configure the 8 ms SysTick
//!               ├─► Set interrupt priorities
//!               └─► First dispatch into the ring's head
//! ```

use crate::arch::DefaultPort;
use crate::scheduler::{RegisterError, Scheduler};
use crate::sync;
use crate::thread::ThreadEntry;
use crate::timebase::{self, ClockSource, ElapsedClock};

// ---------------------------------------------------------------------------
// Driver-owned instances
// ---------------------------------------------------------------------------

/// The scheduler instance. All access goes through `SCHEDULER_PTR`,
/// set during `init()`, under critical sections or from ISR context
/// (one handler at a time on this target).
static mut SCHEDULER: Scheduler<DefaultPort> = Scheduler::new();

/// Raw pointer to the scheduler for the port layer's handlers
/// (SysTick, PendSV), which cannot easily hold references.
pub(crate) static mut SCHEDULER_PTR: *mut Scheduler<DefaultPort> = core::ptr::null_mut();

/// The monotonic millisecond clock, pulsed by the calibrated timer
/// interrupt. Plain static: queries are single atomic loads.
pub(crate) static CLOCK: ElapsedClock = ElapsedClock::new();

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Initialize the RondOS driver state.
///
/// Must be called exactly once, from the main thread, before any other
/// kernel function.
pub fn init() {
    unsafe {
        SCHEDULER = Scheduler::new();
        SCHEDULER_PTR = core::ptr::addr_of_mut!(SCHEDULER);
    }
}

/// Register a thread with the scheduler.
///
/// Threads execute in registration order, starting with the first one
/// registered. The caller keeps ownership of `stack` and must size it
/// for the thread's worst-case need; there is no growth and no guard
/// region.
///
/// Call between `init()` and `start()` only: the ring must be complete
/// before the scheduler starts, and registering afterwards races with
/// live dispatching.
pub fn register(
    entry: ThreadEntry,
    stack: &'static mut [u8],
) -> Result<usize, RegisterError> {
    sync::critical_section(|_cs| unsafe { (*SCHEDULER_PTR).register(entry, stack) })
}

/// Start the RondOS scheduler. **Does not return.**
///
/// Calibrates and starts the millisecond timer, configures the 8 ms
/// SysTick, and first-dispatches into the first registered thread.
/// After this call the system is fully preemptive.
///
/// # Panics
/// If no threads have been registered.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn start(mut core_peripherals: cortex_m::Peripherals) -> ! {
    use crate::arch::cortex_m4;
    use crate::arch::Port;
    use crate::config::{CLOCK_PERIOD_US, TIMER_TICKS_PER_US};

    cortex_m4::configure_ms_timer(timebase::calibrate(CLOCK_PERIOD_US, TIMER_TICKS_PER_US));
    cortex_m4::configure_systick(&mut core_peripherals.SYST);
    cortex_m4::set_interrupt_priorities();

    let first = sync::critical_section(|_cs| unsafe { (*SCHEDULER_PTR).first_stack() });

    unsafe { DefaultPort::first_resume(first) }
}

/// Busy-wait for `ms` milliseconds of elapsed-clock time.
///
/// Blocks only the calling thread; preemption keeps the other threads
/// running throughout the wait.
pub fn delay_ms(ms: u32) {
    timebase::delay_ms(&CLOCK, ms)
}

/// Milliseconds elapsed since `start()`.
pub fn elapsed_ms() -> u32 {
    CLOCK.now_ms()
}

/// Preemption ticks delivered since `start()`.
pub fn ticks() -> u32 {
    sync::critical_section(|_cs| unsafe { (*SCHEDULER_PTR).ticks() })
}
