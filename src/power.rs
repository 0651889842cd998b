//! Power lifecycle: wake-cause reporting and the terminal actions a halted
//! controller hands back (deep sleep, restart, watchdog reset).

use log::info;

use crate::fsm::Terminal;

/// Why this boot happened, as far as the sleep controller knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Cold power-on or reset (no sleep wakeup pending).
    PowerOn,
    /// The deep-sleep timer expired.
    Timer,
    /// Any other wakeup source, by raw `esp_sleep_wakeup_cause_t`.
    Other(u32),
}

impl WakeReason {
    pub const fn from_raw(cause: u32) -> Self {
        match cause {
            0 => Self::PowerOn,
            4 => Self::Timer,
            other => Self::Other(other),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn wake_reason() -> WakeReason {
    let cause = unsafe { esp_idf_svc::sys::esp_sleep_get_wakeup_cause() };
    WakeReason::from_raw(cause as u32)
}

/// Log line for an action about to be carried out.
pub fn announce(terminal: Terminal) {
    match terminal {
        Terminal::DeepSleep { duration_us } => {
            info!("Power: deep sleep for {} s", duration_us / 1_000_000);
        }
        Terminal::Restart => info!("Power: restarting"),
        Terminal::WatchdogReset => info!("Power: waiting for watchdog reset"),
    }
}

/// Carry out a terminal action.  Never returns.
#[cfg(target_os = "espidf")]
pub fn execute(terminal: Terminal) -> ! {
    announce(terminal);
    match terminal {
        Terminal::DeepSleep { duration_us } => unsafe {
            esp_idf_svc::sys::esp_deep_sleep(duration_us);
        },
        Terminal::Restart => unsafe {
            esp_idf_svc::sys::esp_restart();
        },
        Terminal::WatchdogReset => {}
    }
    // Stop feeding; the TWDT panics and resets the chip.
    loop {
        esp_idf_hal::delay::FreeRtos::delay_ms(1000);
    }
}
