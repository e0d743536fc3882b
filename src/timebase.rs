//! # Time Base
//!
//! The two periodic interrupts that drive RondOS are parameterized
//! here: the calibrator turns a target period into hardware timer
//! parameters, the elapsed clock counts calibrated millisecond pulses,
//! and the delay primitive busy-waits against an injected clock source.
//!
//! ## Calibration
//!
//! The millisecond timer divides its input clock by a power-of-two
//! prescaler and overflows at an 8-bit modulo count, so the reachable
//! periods are `modulo * 2^exponent` input ticks. Calibration picks the
//! pair minimizing the deviation from the requested period. It cannot
//! fail; the residual error is bounded by prescaler granularity and is
//! inherent to the input clock.

use core::sync::atomic::{AtomicU32, Ordering};

// ---------------------------------------------------------------------------
// Calibrator
// ---------------------------------------------------------------------------

/// Hardware parameters of a calibratable periodic timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerParams {
    /// Prescaler exponent; the timer divides its input clock by
    /// `2^exponent`.
    pub exponent: u8,
    /// Modulo count; the timer overflows every `modulo` prescaled
    /// ticks.
    pub modulo: u8,
}

impl TimerParams {
    /// Period these parameters produce, in microseconds, for the given
    /// input clock rate.
    pub fn period_us(&self, ticks_per_us: u32) -> u32 {
        u32::from(self.modulo) * (1u32 << self.exponent) / ticks_per_us
    }
}

/// Compute the timer parameters best approximating `target_us` at the
/// given input clock rate.
///
/// A linear divide-by-255 estimate is rounded up to the next power of
/// two via its highest set bit, fixing the prescaler exponent; the
/// modulo is then found by exhaustive scan. Scanning downward from 255
/// keeps the larger modulo on error ties.
///
/// Recompute whenever the clock rate or the target period changes; the
/// boot routine calls this once for the 1 ms elapsed clock.
pub fn calibrate(target_us: u32, ticks_per_us: u32) -> TimerParams {
    let linear = target_us * ticks_per_us / u32::from(u8::MAX);
    let exponent = if linear == 0 {
        1
    } else {
        // Highest set bit position, plus one.
        32 - linear.leading_zeros()
    };
    let prescaler = 1u32 << exponent;

    let mut best_modulo = u8::MAX;
    let mut best_error = u32::MAX;

    for modulo in (0..=u32::from(u8::MAX)).rev() {
        let achieved_us = modulo * prescaler / ticks_per_us;
        let error = achieved_us.abs_diff(target_us);
        if error < best_error {
            best_error = error;
            best_modulo = modulo as u8;
        }
    }

    TimerParams {
        exponent: exponent as u8,
        modulo: best_modulo,
    }
}

// ---------------------------------------------------------------------------
// Elapsed clock
// ---------------------------------------------------------------------------

/// A source of monotonic millisecond time.
///
/// The delay primitive polls this instead of reaching for a global, so
/// tests can substitute deterministic doubles.
pub trait ClockSource {
    /// Milliseconds elapsed since the source started counting.
    fn now_ms(&self) -> u32;
}

/// Monotonic millisecond counter fed by the calibrated clock interrupt.
///
/// A single machine word; queries are one atomic load, so readers in
/// any thread see a consistent snapshot without masking interrupts.
pub struct ElapsedClock {
    millis: AtomicU32,
}

impl ElapsedClock {
    pub const fn new() -> Self {
        Self {
            millis: AtomicU32::new(0),
        }
    }

    /// Record one calibrated-millisecond pulse. Called from the clock
    /// interrupt handler only.
    #[inline]
    pub fn pulse(&self) {
        self.millis.fetch_add(1, Ordering::Relaxed);
    }
}

impl ClockSource for ElapsedClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        self.millis.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

/// Busy-wait until `ms` milliseconds have elapsed on `clock`.
///
/// Stalls only the calling thread; preemption is asynchronous, so the
/// other threads keep receiving their slices during the wait. The
/// wrapping subtraction keeps the comparison correct across counter
/// rollover.
pub fn delay_ms<C: ClockSource>(clock: &C, ms: u32) {
    let start = clock.now_ms();
    while clock.now_ms().wrapping_sub(start) < ms {
        core::hint::spin_loop();
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TIMER_TICKS_PER_US;

    #[test]
    fn reference_millisecond_target_is_exact() {
        let params = calibrate(1000, TIMER_TICKS_PER_US);
        assert_eq!(params.exponent, 6);
        assert_eq!(params.modulo, 250);
        assert_eq!(params.period_us(TIMER_TICKS_PER_US), 1000);
    }

    #[test]
    fn calibration_beats_exhaustive_search() {
        for target_us in [1000, 8000, 32000] {
            let params = calibrate(target_us, TIMER_TICKS_PER_US);
            let error = params
                .period_us(TIMER_TICKS_PER_US)
                .abs_diff(target_us);

            for exponent in 0..=7u8 {
                for modulo in 0..=u8::MAX {
                    let candidate = TimerParams { exponent, modulo };
                    let candidate_error = candidate
                        .period_us(TIMER_TICKS_PER_US)
                        .abs_diff(target_us);
                    assert!(
                        error <= candidate_error,
                        "target {}: ({}, {}) worse than ({}, {})",
                        target_us,
                        params.exponent,
                        params.modulo,
                        exponent,
                        modulo
                    );
                }
            }
        }
    }

    #[test]
    fn error_ties_keep_the_larger_modulo() {
        // prescaler 8 against 16 ticks/us: modulo 200 and 201 both land
        // on exactly 100 us; the downward scan must keep 201.
        let params = calibrate(100, TIMER_TICKS_PER_US);
        assert_eq!(params.exponent, 3);
        assert_eq!(params.modulo, 201);
        assert_eq!(params.period_us(TIMER_TICKS_PER_US), 100);
    }

    #[test]
    fn tiny_target_degenerates_to_exponent_one() {
        // 1 us * 16 ticks / 255 rounds to zero; the bit scan bottoms
        // out at exponent 1.
        let params = calibrate(1, TIMER_TICKS_PER_US);
        assert_eq!(params.exponent, 1);
        assert_eq!(params.period_us(TIMER_TICKS_PER_US), 1);
    }

    #[test]
    fn elapsed_clock_counts_each_pulse() {
        let clock = ElapsedClock::new();
        assert_eq!(clock.now_ms(), 0);

        let mut previous = 0;
        for _ in 0..100 {
            clock.pulse();
            let now = clock.now_ms();
            assert_eq!(now, previous + 1);
            previous = now;
        }
    }

    /// Clock double that delivers one pulse per query, counting how
    /// many pulses the caller observed.
    struct SelfPulsingClock {
        now: AtomicU32,
        polls: AtomicU32,
    }

    impl SelfPulsingClock {
        fn starting_at(start: u32) -> Self {
            Self {
                now: AtomicU32::new(start),
                polls: AtomicU32::new(0),
            }
        }
    }

    impl ClockSource for SelfPulsingClock {
        fn now_ms(&self) -> u32 {
            self.polls.fetch_add(1, Ordering::Relaxed);
            self.now.fetch_add(1, Ordering::Relaxed)
        }
    }

    #[test]
    fn delay_returns_only_after_enough_pulses() {
        let clock = SelfPulsingClock::starting_at(0);
        delay_ms(&clock, 25);
        // One poll reads the start value, then at least 25 pulses must
        // have been observed before the loop can exit.
        assert!(clock.polls.load(Ordering::Relaxed) >= 26);
        assert!(clock.now.load(Ordering::Relaxed) >= 25);
    }

    #[test]
    fn delay_survives_counter_rollover() {
        let clock = SelfPulsingClock::starting_at(u32::MAX - 2);
        delay_ms(&clock, 10);
        assert!(clock.polls.load(Ordering::Relaxed) >= 11);
    }

    #[test]
    fn zero_delay_returns_immediately() {
        let clock = SelfPulsingClock::starting_at(7);
        delay_ms(&clock, 0);
        // One poll for the start sample, one for the exit check.
        assert!(clock.polls.load(Ordering::Relaxed) <= 2);
    }
}
