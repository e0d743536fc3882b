//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor:
//! context switching via PendSV, the 8 ms SysTick preemption source,
//! and the calibratable basic timer behind the millisecond clock.
//!
//! ## Context Switch Mechanism
//!
//! The Cortex-M4 uses a split-stack model:
//! - **MSP** (Main Stack Pointer): used by the boot code and interrupt
//!   handlers
//! - **PSP** (Process Stack Pointer): used by threads in Thread mode
//!
//! On exception entry the hardware stacks R0–R3, R12, LR, PC and xPSR
//! onto the process stack. The PendSV handler saves and restores R4–R11
//! around that, which completes the full context. A seeded first frame
//! therefore holds all sixteen words, so resuming a thread that has
//! never run is indistinguishable from resuming a preempted one.
//!
//! ## Interrupt Priorities
//!
//! SysTick, PendSV and the millisecond timer all run at the lowest
//! priority: one handler at a time, never nested, matching the
//! non-reentrant interrupt model the scheduler state relies on.

use core::arch::{asm, naked_asm};
use cortex_m::peripheral::syst::SystClkSource;

use super::Port;
use crate::config::{SYSTEM_CLOCK_HZ, TICK_PERIOD_US};
use crate::thread::ThreadEntry;
use crate::timebase::TimerParams;

/// Physical context capability for the Cortex-M4.
pub struct CortexM4;

/// Words in a full saved context: R4–R11 plus the hardware-stacked
/// R0–R3, R12, LR, PC, xPSR.
const FRAME_WORDS: usize = 16;

impl Port for CortexM4 {
    // Frame plus worst-case 8-byte alignment of the stack top.
    const MIN_STACK: usize = FRAME_WORDS * 4 + 8;

    /// Lay down the synthetic first suspended frame.
    ///
    /// ## Stack Layout (top = high address, growing down)
    ///
    /// ```text
    /// [Hardware-stacked frame]
    ///   xPSR  (Thumb bit set)
    ///   PC    (thread entry point)
    ///   LR    (thread_park)
    ///   R12, R3, R2, R1, R0  (0)
    /// [Software-saved context]
    ///   R11 … R4  (0)         <- returned stack pointer
    /// ```
    fn seed_frame(stack: &mut [u8], entry: ThreadEntry) -> *mut u8 {
        debug_assert!(stack.len() >= Self::MIN_STACK);

        let top = stack.as_mut_ptr() as usize + stack.len();
        // AAPCS requires an 8-byte aligned stack.
        let aligned_top = top & !0x07;
        let frame = (aligned_top - FRAME_WORDS * 4) as *mut u32;

        unsafe {
            // Software-saved registers R4-R11.
            for i in 0..8 {
                frame.add(i).write(0);
            }
            // Hardware-stacked R0-R3, R12.
            for i in 8..13 {
                frame.add(i).write(0);
            }
            frame.add(13).write(thread_park as u32); // LR
            frame.add(14).write(entry as u32); // PC
            frame.add(15).write(0x0100_0000); // xPSR, Thumb bit
        }

        frame as *mut u8
    }

    /// Enter the head thread's seeded frame. Final action of boot;
    /// never returns.
    unsafe fn first_resume(sp: *mut u8) -> ! {
        asm!(
            // Point PSP past the software-saved R4-R11 (seeded as
            // zeros; nothing to restore on the very first entry).
            "adds r0, #32",
            "msr psp, r0",

            // Thread mode now runs on PSP (CONTROL.SPSEL = 1).
            "movs r0, #2",
            "msr control, r0",
            "isb",

            // Unstack the hardware frame by hand; this is a branch,
            // not an exception return.
            "pop {{r0-r3, r12}}",
            "pop {{r4}}", // LR slot (thread_park; entries never return)
            "pop {{r5}}", // PC = thread entry point
            "pop {{r6}}", // xPSR slot, discarded

            "cpsie i",
            "bx r5",

            in("r0") sp,
            options(noreturn)
        );
    }
}

/// Landing pad for the seeded LR slot. Entries are `fn() -> !`; if one
/// returns anyway, park the core instead of walking off the stack.
extern "C" fn thread_park() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// Tick source (SysTick)
// ---------------------------------------------------------------------------

/// Configure SysTick as the preemption source.
///
/// Fires every [`TICK_PERIOD_US`] microseconds off the processor
/// clock. SysTick clears its own COUNTFLAG on handler entry, so unlike
/// the millisecond timer no acknowledge sequence is needed here.
pub fn configure_systick(syst: &mut cortex_m::peripheral::SYST) {
    let reload = SYSTEM_CLOCK_HZ / 1_000_000 * TICK_PERIOD_US - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Trigger a PendSV exception to perform a context switch.
///
/// PendSV runs at the lowest priority, so the switch happens only once
/// no other handler is active. Sets PENDSVSET in the ICSR.
#[inline]
pub fn trigger_pendsv() {
    const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
    unsafe {
        core::ptr::write_volatile(ICSR, 1 << 28);
    }
}

/// Put SysTick, PendSV and the millisecond timer at the lowest
/// interrupt priority so handlers never nest.
pub fn set_interrupt_priorities() {
    unsafe {
        // SHPR3: bits [23:16] = PendSV, bits [31:24] = SysTick.
        let shpr3: *mut u32 = 0xE000_ED20 as *mut u32;
        let val = core::ptr::read_volatile(shpr3);
        core::ptr::write_volatile(shpr3, val | (0xFF << 16) | (0xFF << 24));

        // NVIC IPR byte for the millisecond timer's IRQ.
        let ipr = (NVIC_IPR_BASE + MS_TIMER_IRQ) as *mut u8;
        core::ptr::write_volatile(ipr, 0xF0);
    }
}

// ---------------------------------------------------------------------------
// Millisecond timer (TIM7 basic timer)
// ---------------------------------------------------------------------------

const RCC_APB1ENR: *mut u32 = 0x4002_3840 as *mut u32;
const RCC_TIM7EN: u32 = 1 << 5;

const TIM7_CR1: *mut u32 = 0x4000_1400 as *mut u32;
const TIM7_DIER: *mut u32 = 0x4000_140C as *mut u32;
const TIM7_SR: *mut u32 = 0x4000_1410 as *mut u32;
const TIM7_CNT: *mut u32 = 0x4000_1424 as *mut u32;
const TIM7_PSC: *mut u32 = 0x4000_1428 as *mut u32;
const TIM7_ARR: *mut u32 = 0x4000_142C as *mut u32;

/// TIM7 global interrupt position on STM32F4.
const MS_TIMER_IRQ: usize = 55;

const NVIC_ISER1: *mut u32 = 0xE000_E104 as *mut u32;
const NVIC_IPR_BASE: usize = 0xE000_E400;

/// Program the basic timer with calibrated parameters and start it.
///
/// The calibrator's output means "overflow every `modulo * 2^exponent`
/// input ticks"; on this timer that maps to `PSC = 2^exponent - 1`,
/// `ARR = modulo - 1`.
pub fn configure_ms_timer(params: TimerParams) {
    unsafe {
        core::ptr::write_volatile(
            RCC_APB1ENR,
            core::ptr::read_volatile(RCC_APB1ENR) | RCC_TIM7EN,
        );

        core::ptr::write_volatile(TIM7_PSC, (1u32 << params.exponent) - 1);
        core::ptr::write_volatile(TIM7_ARR, u32::from(params.modulo.max(1)) - 1);
        core::ptr::write_volatile(TIM7_CNT, 0);
        core::ptr::write_volatile(TIM7_SR, 0);
        core::ptr::write_volatile(TIM7_DIER, 1); // UIE
        core::ptr::write_volatile(TIM7_CR1, 1); // CEN

        core::ptr::write_volatile(NVIC_ISER1, 1 << (MS_TIMER_IRQ - 32));
    }
}

// ---------------------------------------------------------------------------
// Interrupt handlers
// ---------------------------------------------------------------------------

/// SysTick handler — the Tick Source.
///
/// Counts the tick, then unconditionally requests a context switch:
/// every thread gets an identical time-slice, no priority check, no
/// voluntary yield.
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    (*crate::kernel::SCHEDULER_PTR).on_tick();
    trigger_pendsv();
}

/// PendSV handler — the context switch itself.
///
/// 1. Push R4–R11 onto the running thread's process stack
/// 2. Persist the resulting PSP into its TCB
/// 3. Advance the ring and fetch the next thread's saved PSP
/// 4. Pop R4–R11 from the new stack and return from the exception;
///    the hardware unstacks the rest
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",

        "bl {suspend}", // suspend_current(r0: sp)
        "bl {dispatch}", // dispatch_next() -> new sp in r0

        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",

        // Exception return to Thread mode on PSP.
        "ldr r0, =0xFFFFFFFD",
        "bx r0",

        suspend = sym suspend_current_context,
        dispatch = sym dispatch_next_context,
    );
}

/// Persist the suspended thread's stack pointer. Called from PendSV.
#[no_mangle]
unsafe extern "C" fn suspend_current_context(psp: *mut u8) {
    (*crate::kernel::SCHEDULER_PTR).suspend_current(psp);
}

/// Advance the ring; returns the next thread's saved stack pointer.
/// Called from PendSV.
#[no_mangle]
unsafe extern "C" fn dispatch_next_context() -> *mut u8 {
    (*crate::kernel::SCHEDULER_PTR).dispatch_next()
}

/// Millisecond timer handler — the ElapsedClock pulse.
///
/// UIF must be cleared on every firing or the handler re-enters
/// forever; UIE stays set so the timer keeps free-running.
#[no_mangle]
unsafe extern "C" fn TIM7() {
    core::ptr::write_volatile(TIM7_SR, 0);
    crate::kernel::CLOCK.pulse();
}

// ---------------------------------------------------------------------------
// Device vector table
// ---------------------------------------------------------------------------

/// One device-interrupt vector slot.
#[derive(Clone, Copy)]
#[repr(C)]
union Vector {
    handler: unsafe extern "C" fn(),
    reserved: usize,
}

/// Device interrupt vectors. Only the millisecond timer is wired; no
/// other device interrupt is ever unmasked.
#[link_section = ".vector_table.interrupts"]
#[no_mangle]
static __INTERRUPTS: [Vector; 56] = {
    let mut table = [Vector { reserved: 0 }; 56];
    table[MS_TIMER_IRQ] = Vector { handler: TIM7 };
    table
};
