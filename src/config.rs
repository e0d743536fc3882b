//! # RondOS Configuration
//!
//! Compile-time constants governing the scheduler and the time base.
//! All limits are fixed at compile time — no dynamic allocation.

/// Maximum number of threads the ring can hold. Bounds the static TCB
/// array; the set of threads is fixed before the scheduler starts.
pub const MAX_THREADS: usize = 8;

/// System clock frequency in Hz (STM32F4 on the 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Input clock rate of the calibratable millisecond timer, expressed as
/// timer ticks per microsecond. The basic timers on this part run off
/// the undivided APB1 clock, which equals the system clock here.
pub const TIMER_TICKS_PER_US: u32 = SYSTEM_CLOCK_HZ / 1_000_000;

/// Preemption period in microseconds. Every thread runs for exactly one
/// tick before it is forcibly suspended.
pub const TICK_PERIOD_US: u32 = 8_000;

/// Target period of the elapsed-time clock in microseconds. The
/// calibrator turns this into concrete timer parameters at boot.
pub const CLOCK_PERIOD_US: u32 = 1_000;

/// Suggested per-thread stack size in bytes for the demo firmware.
/// Callers own their stack regions and may size them per thread; this
/// is a reasonable default for shallow call chains plus the 64-byte
/// saved-context frame.
pub const STACK_SIZE: usize = 1024;
