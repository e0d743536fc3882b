//! # RondOS
//!
//! A minimal round-robin RTOS core for single-core ARM Cortex-M4
//! microcontrollers: no heap, no priorities, no blocking primitives,
//! just a fixed ring of threads preempted on a calibrated tick.
//!
//! ## Overview
//!
//! A statically known set of threads is registered before boot, each
//! with a caller-owned stack. The scheduler dispatches them in
//! registration order, one 8 ms time-slice each, forever. A second
//! calibrated timer pulses a monotonic millisecond clock that backs
//! delays and elapsed-time queries.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 Application Threads                     │
//! ├────────────────────────────────────────────────────────┤
//! │                Kernel API (kernel.rs)                   │
//! │   init() · register() · start() · delay_ms() ·         │
//! │   elapsed_ms() · ticks()                                │
//! ├───────────────────┬────────────────────────────────────┤
//! │  Scheduler        │  Time Base                         │
//! │  scheduler.rs     │  timebase.rs                       │
//! │  ─ ring slots     │  ─ calibrate()                     │
//! │  ─ on_tick()      │  ─ ElapsedClock                    │
//! │  ─ dispatch_next()│  ─ delay_ms()                      │
//! ├───────────────────┴────────────────────────────────────┤
//! │            Thread Model (thread.rs)                     │
//! │        TCB · stack region · seeded first frame          │
//! ├────────────────────────────────────────────────────────┤
//! │        Port Layer (arch/cortex_m4.rs, arch/sim.rs)      │
//! │   PendSV · SysTick · ms timer · frame seeding           │
//! ├────────────────────────────────────────────────────────┤
//! │          ARM Cortex-M4 Hardware (Thumb-2)               │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling Model
//!
//! - Preemption is unconditional: every SysTick firing suspends the
//!   running thread and dispatches its ring successor. For N threads
//!   each one runs exactly once per N ticks; there is no starvation
//!   and no responsiveness better than N tick periods.
//! - Delays busy-wait on the millisecond clock and stall only the
//!   caller.
//! - Contract violations (registering after start, overflowing a
//!   stack) are not detected at runtime; debug builds carry assertions
//!   on the switch path, release builds carry none.
//!
//! ## Memory Model
//!
//! - **No heap**: all scheduler state is statically allocated
//! - **No `alloc`**: pure `core`
//! - **Fixed TCB array**: `[Tcb; MAX_THREADS]`
//! - **Caller-owned stacks**: registered regions must live forever

#![no_std]

pub mod arch;
pub mod config;
pub mod kernel;
pub mod scheduler;
pub mod sync;
pub mod thread;
pub mod timebase;

#[cfg(test)]
extern crate std;
