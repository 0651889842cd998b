//! Clock adapters for the Waterly node.
//!
//! Provides monotonic time plus the blocking delay the controller uses as
//! its suspension point.
//!
//! - **`target_os = "espidf"`** [`SystemClock`] wraps
//!   `esp_timer_get_time()` (microsecond precision, monotonic) and yields
//!   to FreeRTOS for delays.
//! - **`not(target_os = "espidf")`** [`SimClock`] keeps virtual time that
//!   advances only when something delays on it, so host runs are
//!   deterministic and instant.

use embedded_hal::delay::DelayNs;

use crate::app::ports::Clock;

// ── ESP32 ─────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[cfg(target_os = "espidf")]
impl SystemClock {
    pub fn new() -> Self {
        Self
    }

    /// Microseconds since boot (monotonic, wraps at `u64::MAX`).
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }
}

#[cfg(target_os = "espidf")]
impl DelayNs for SystemClock {
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_hal::delay::FreeRtos.delay_ns(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }
}

#[cfg(target_os = "espidf")]
impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.uptime_us() / 1000
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::SimClock;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::{Clock, DelayNs};

    /// Virtual clock.  Clones share the same timeline.
    #[derive(Debug, Default, Clone)]
    pub struct SimClock {
        now_us: Rc<Cell<u64>>,
    }

    impl SimClock {
        pub fn new() -> Self {
            Self::default()
        }

        /// Move time forward without anyone delaying (work that takes time).
        pub fn advance_ms(&self, ms: u64) {
            self.now_us.set(self.now_us.get() + ms * 1000);
        }

        pub fn uptime_us(&self) -> u64 {
            self.now_us.get()
        }
    }

    impl DelayNs for SimClock {
        fn delay_ns(&mut self, ns: u32) {
            self.now_us.set(self.now_us.get() + u64::from(ns.div_ceil(1000)));
        }
    }

    impl Clock for SimClock {
        fn now_ms(&self) -> u64 {
            self.now_us.get() / 1000
        }
    }
}
