//! Integration tests for the AS7265x driver and bridge against the
//! simulated device, with bus time measured on the simulated clock.

use waterly::adapters::time::SimClock;
use waterly::app::ports::Clock;
use waterly::error::{BusError, SensorError};
use waterly::sensors::as7265x::As7265x;
use waterly::sensors::bridge::VirtualRegisterBridge;
use waterly::sensors::registers::{BulbCurrent, DeviceSelector, VIRT_DEV_SEL};
use waterly::sensors::sample::Channel;
use waterly::sensors::sim::SimAs7265x;

fn driver(sim: &SimAs7265x, clock: &SimClock) -> As7265x<SimAs7265x, SimClock> {
    As7265x::new(VirtualRegisterBridge::new(sim.clone(), clock.clone()))
}

#[test]
fn bulb_then_read_returns_master_bank_on_master() {
    let sim = SimAs7265x::new();
    sim.load_pattern();
    let clock = SimClock::new();
    let mut dev = driver(&sim, &clock);
    dev.init().unwrap();

    dev.set_bulb_current(BulbCurrent::Ma50, true).unwrap();
    assert_eq!(sim.selector(), Some(DeviceSelector::Master));
    assert!(sim.bulb_on(DeviceSelector::SlaveA));

    let sample = dev.read_all_channels().unwrap();
    assert_eq!(sim.selector(), Some(DeviceSelector::Master));
    assert_eq!(dev.selector(), DeviceSelector::Master);
    // Master carries R..W; values are `index + 1`.
    assert_eq!(sample.get(Channel::R), 1.0);
    assert_eq!(sample.get(Channel::W), 6.0);
    assert!(sample.is_complete());
}

#[test]
fn init_waits_for_reset_to_settle() {
    let sim = SimAs7265x::new();
    let clock = SimClock::new();
    let mut dev = driver(&sim, &clock);
    dev.init().unwrap();
    assert!(clock.now_ms() >= 1200);
}

#[test]
fn stuck_write_handshake_times_out_after_its_budget() {
    let sim = SimAs7265x::new();
    let clock = SimClock::new();
    let mut bridge = VirtualRegisterBridge::new(sim.clone(), clock.clone());

    sim.set_tx_stuck(true);
    assert_eq!(bridge.write(VIRT_DEV_SEL, 1), Err(BusError::Timeout));
    // 50 polls, 2 ms apart.
    let spent = clock.now_ms();
    assert!((98..=100).contains(&spent), "spent {spent} ms");
}

#[test]
fn unreachable_device_is_not_found() {
    let sim = SimAs7265x::new();
    sim.set_present(false);
    let clock = SimClock::new();
    let mut dev = driver(&sim, &clock);
    assert_eq!(dev.init(), Err(SensorError::DeviceNotFound));
    assert_eq!(sim.selector_writes(), Vec::<u8>::new());
}

#[test]
fn slow_boot_is_tolerated() {
    let sim = SimAs7265x::new();
    sim.set_booting_reads(3);
    let clock = SimClock::new();
    let mut dev = driver(&sim, &clock);
    assert_eq!(dev.init(), Ok(()));
}

#[test]
fn failed_channel_degrades_without_losing_the_sample() {
    let sim = SimAs7265x::new();
    sim.load_pattern();
    let clock = SimClock::new();
    let mut dev = driver(&sim, &clock);
    dev.init().unwrap();

    // Third byte of SlaveB channel 2 (C).
    sim.fail_read(DeviceSelector::SlaveB, 0x14 + 2 * 4 + 2);
    let sample = dev.read_all_channels().unwrap();
    assert!(sample.is_degraded(Channel::C));
    assert_eq!(sample.degraded_count(), 1);
    assert_eq!(sample.get(Channel::D), 204.0);
    assert_eq!(sim.selector(), Some(DeviceSelector::Master));
}
