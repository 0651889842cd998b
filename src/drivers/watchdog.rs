//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the controller loop
//! stalls for longer than the configured timeout (10 s by default).
//!
//! The controller must call `feed()` on every iteration.  On host builds
//! the simulated watchdog measures the gap between feeds on a
//! [`SimClock`](crate::adapters::time::SimClock) and reports starvation
//! instead of resetting.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

use crate::app::ports::LivenessPort;
use crate::error::Error;

#[cfg(not(target_os = "espidf"))]
use crate::adapters::time::SimClock;

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    clock: SimClock,
    #[cfg(not(target_os = "espidf"))]
    last_feed_ms: Option<u64>,
}

impl Watchdog {
    /// Initialise and subscribe the current task to the TWDT.
    #[cfg(target_os = "espidf")]
    pub fn new(timeout_ms: u32) -> Self {
        unsafe {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            let ret = esp_task_wdt_reconfigure(&cfg);
            if ret != ESP_OK {
                log::warn!(
                    "TWDT reconfigure returned {} (may already be configured)",
                    ret
                );
            }

            let ret = esp_task_wdt_add(core::ptr::null_mut());
            let subscribed = ret == ESP_OK;
            if subscribed {
                info!("Watchdog: subscribed ({} ms timeout, panic on trigger)", timeout_ms);
            } else {
                log::warn!("Watchdog: failed to subscribe ({})", ret);
            }

            Self {
                timeout_ms,
                subscribed,
            }
        }
    }

    /// Simulated watchdog timed by `clock`.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(timeout_ms: u32, clock: SimClock) -> Self {
        info!("Watchdog(sim): {} ms timeout", timeout_ms);
        Self {
            timeout_ms,
            clock,
            last_feed_ms: None,
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}

impl LivenessPort for Watchdog {
    #[cfg(target_os = "espidf")]
    fn feed(&mut self) -> Result<(), Error> {
        if self.subscribed {
            unsafe {
                esp_task_wdt_reset();
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn feed(&mut self) -> Result<(), Error> {
        use crate::app::ports::Clock;

        let now = self.clock.now_ms();
        let late = self
            .last_feed_ms
            .is_some_and(|last| now - last > u64::from(self.timeout_ms));
        self.last_feed_ms = Some(now);
        if late {
            log::error!("Watchdog(sim): starved at {} ms", now);
            return Err(Error::FatalWatchdogStarvation);
        }
        Ok(())
    }
}
