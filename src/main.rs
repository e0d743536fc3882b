//! # RondOS Demo Firmware
//!
//! Three threads sharing the ring:
//!
//! | Thread | Behavior |
//! |--------|----------|
//! | `heartbeat_thread` | Bumps a beat counter every 500 ms |
//! | `sampler_thread`   | Snapshots the millisecond clock every 100 ms |
//! | `worker_thread`    | Pure CPU churn, never delays |
//!
//! The worker never blocks, yet the other two keep making progress:
//! preemption is driven by the tick interrupt alone, and the delay
//! loops stall only their own thread.

#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_std, no_main)]

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod firmware {
    use core::sync::atomic::{AtomicU32, Ordering};

    use cortex_m_rt::entry;
    use panic_halt as _;

    use rondos::config::STACK_SIZE;
    use rondos::kernel;

    // Caller-owned stack regions; the scheduler borrows them for the
    // whole program run.
    static mut HEARTBEAT_STACK: [u8; STACK_SIZE] = [0; STACK_SIZE];
    static mut SAMPLER_STACK: [u8; STACK_SIZE] = [0; STACK_SIZE];
    static mut WORKER_STACK: [u8; STACK_SIZE] = [0; STACK_SIZE];

    /// Beats since boot, one every 500 ms.
    static BEATS: AtomicU32 = AtomicU32::new(0);

    /// Latest millisecond-clock snapshot taken by the sampler.
    static LAST_SAMPLE_MS: AtomicU32 = AtomicU32::new(0);

    /// Iterations the worker managed between preemptions.
    static WORK_DONE: AtomicU32 = AtomicU32::new(0);

    extern "C" fn heartbeat_thread() -> ! {
        loop {
            kernel::delay_ms(500);
            BEATS.fetch_add(1, Ordering::Relaxed);
        }
    }

    extern "C" fn sampler_thread() -> ! {
        loop {
            kernel::delay_ms(100);
            LAST_SAMPLE_MS.store(kernel::elapsed_ms(), Ordering::Relaxed);
        }
    }

    extern "C" fn worker_thread() -> ! {
        loop {
            // Runs flat out; the tick interrupt carves it into slices.
            WORK_DONE.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn stack_of(region: *mut [u8; STACK_SIZE]) -> &'static mut [u8] {
        unsafe { (*region).as_mut_slice() }
    }

    #[entry]
    fn main() -> ! {
        let cp = cortex_m::Peripherals::take().unwrap();

        kernel::init();

        kernel::register(
            heartbeat_thread,
            stack_of(core::ptr::addr_of_mut!(HEARTBEAT_STACK)),
        )
        .expect("failed to register heartbeat_thread");

        kernel::register(
            sampler_thread,
            stack_of(core::ptr::addr_of_mut!(SAMPLER_STACK)),
        )
        .expect("failed to register sampler_thread");

        kernel::register(
            worker_thread,
            stack_of(core::ptr::addr_of_mut!(WORKER_STACK)),
        )
        .expect("failed to register worker_thread");

        // First dispatch into heartbeat_thread; never returns.
        kernel::start(cp)
    }
}

// The firmware is Cortex-M only; host builds get an empty binary so
// `cargo build` works alongside the host test suite.
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn main() {}
