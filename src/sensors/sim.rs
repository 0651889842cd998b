//! Host-side simulation of the AS7265x behind its I2C interface.
//!
//! Models the secondary controller's handshake (TX/RX flags, address
//! marker, READ staging), the DEV_SEL-banked registers, one-shot
//! completion, and a set of injectable faults.  Clones share state so a
//! test can hand one copy to the driver and inspect the other.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use super::registers::{
    BYTES_PER_CHANNEL, CHANNELS_PER_DEVICE, CONFIG_BANK_SHIFT, CONFIG_DATA_RDY, CONFIG_SOFT_RESET,
    DeviceSelector, HW_TYPE_AS7265X, I2C_ADDRESS, LED_BULB_ENABLE, MeasurementMode, PHY_READ,
    PHY_STATUS, PHY_WRITE, STATUS_RX_VALID, STATUS_TX_VALID, VIRT_CALIBRATED_START, VIRT_CONFIG,
    VIRT_DEV_SEL, VIRT_HW_VERSION, VIRT_LED_CONFIG, WRITE_MARKER,
};

const BANK_COUNT: usize = 3;
const CAL_END: u8 = VIRT_CALIBRATED_START + (CHANNELS_PER_DEVICE as u8) * BYTES_PER_CHANNEL;

#[derive(Debug)]
struct SimState {
    regs: [[u8; 128]; BANK_COUNT],
    pointer: u8,
    pending_write: Option<u8>,
    staged_read: Option<u8>,
    /// Virtual address behind `staged_read`, for fault matching.
    staged_from: (usize, u8),

    present: bool,
    booting_reads: u32,
    tx_busy_polls: u32,
    tx_stuck: bool,
    rx_never_valid: bool,
    bus_fault: bool,
    fail_reads: Vec<(DeviceSelector, u8)>,
    fail_select: Option<DeviceSelector>,
    ready_after: Option<u32>,
    ready_countdown: Option<u32>,

    status_reads: u32,
    selector_writes: Vec<u8>,
    config_writes: Vec<u8>,
}

impl SimState {
    fn new() -> Self {
        let mut regs = [[0u8; 128]; BANK_COUNT];
        regs[0][VIRT_HW_VERSION as usize] = HW_TYPE_AS7265X;
        Self {
            regs,
            pointer: 0,
            pending_write: None,
            staged_read: None,
            staged_from: (0, 0),
            present: true,
            booting_reads: 0,
            tx_busy_polls: 0,
            tx_stuck: false,
            rx_never_valid: false,
            bus_fault: false,
            fail_reads: Vec::new(),
            fail_select: None,
            ready_after: Some(3),
            ready_countdown: None,
            status_reads: 0,
            selector_writes: Vec::new(),
            config_writes: Vec::new(),
        }
    }

    fn selected(&self) -> usize {
        (self.regs[0][VIRT_DEV_SEL as usize] & 0x03) as usize % BANK_COUNT
    }

    fn is_banked(addr: u8) -> bool {
        addr == VIRT_LED_CONFIG || (VIRT_CALIBRATED_START..CAL_END).contains(&addr)
    }

    fn bank_for(&self, addr: u8) -> usize {
        if Self::is_banked(addr) { self.selected() } else { 0 }
    }

    fn status(&mut self) -> u8 {
        self.status_reads += 1;
        let mut status = 0;
        if self.tx_stuck || self.tx_busy_polls > 0 {
            self.tx_busy_polls = self.tx_busy_polls.saturating_sub(1);
            status |= STATUS_TX_VALID;
        }
        if self.staged_read.is_some() && !self.rx_never_valid {
            status |= STATUS_RX_VALID;
        }
        status
    }

    fn virtual_read(&mut self, addr: u8) -> u8 {
        match addr {
            VIRT_HW_VERSION if self.booting_reads > 0 => {
                self.booting_reads -= 1;
                0x00
            }
            VIRT_CONFIG => {
                let mut v = self.regs[0][VIRT_CONFIG as usize];
                if let Some(n) = self.ready_countdown {
                    if n == 0 {
                        v |= CONFIG_DATA_RDY;
                    } else {
                        self.ready_countdown = Some(n - 1);
                    }
                }
                v
            }
            _ => {
                let bank = self.bank_for(addr);
                self.regs[bank][addr as usize]
            }
        }
    }

    fn virtual_write(&mut self, addr: u8, value: u8) -> Result<(), ErrorKind> {
        match addr {
            VIRT_DEV_SEL => {
                if self.fail_select.map(|d| d as u8) == Some(value & 0x03) {
                    return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
                }
                self.selector_writes.push(value);
                self.regs[0][VIRT_DEV_SEL as usize] = value;
            }
            VIRT_CONFIG => {
                self.config_writes.push(value);
                if value & CONFIG_SOFT_RESET != 0 {
                    let hw = self.regs[0][VIRT_HW_VERSION as usize];
                    for bank in &mut self.regs {
                        bank[VIRT_CONFIG as usize] = 0;
                        bank[VIRT_LED_CONFIG as usize] = 0;
                    }
                    self.regs[0][VIRT_DEV_SEL as usize] = 0;
                    self.regs[0][VIRT_HW_VERSION as usize] = hw;
                    self.ready_countdown = None;
                    return Ok(());
                }
                let mode = (value >> CONFIG_BANK_SHIFT) & 0x03;
                self.ready_countdown = if mode == MeasurementMode::SixChannelOneShot as u8 {
                    self.ready_after
                } else {
                    None
                };
                self.regs[0][VIRT_CONFIG as usize] = value & !CONFIG_DATA_RDY;
            }
            _ => {
                let bank = self.bank_for(addr);
                self.regs[bank][addr as usize] = value;
            }
        }
        Ok(())
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), ErrorKind> {
        if reg != PHY_WRITE {
            return Ok(());
        }
        if let Some(addr) = self.pending_write.take() {
            return self.virtual_write(addr, value);
        }
        if value & WRITE_MARKER != 0 {
            self.pending_write = Some(value & !WRITE_MARKER);
        } else {
            let addr = value & 0x7F;
            self.staged_from = (self.bank_for(addr), addr);
            self.staged_read = Some(self.virtual_read(addr));
        }
        Ok(())
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, ErrorKind> {
        match reg {
            PHY_STATUS => Ok(self.status()),
            PHY_READ => {
                let (bank, addr) = self.staged_from;
                let value = self.staged_read.take().unwrap_or(0);
                let failing = self
                    .fail_reads
                    .iter()
                    .any(|&(dev, a)| dev as usize == bank && a == addr);
                if failing {
                    Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data))
                } else {
                    Ok(value)
                }
            }
            _ => Ok(0),
        }
    }
}

/// Simulated AS7265x chipset.  Implements [`I2c`] at address 0x49.
#[derive(Debug, Clone)]
pub struct SimAs7265x {
    state: Rc<RefCell<SimState>>,
}

impl Default for SimAs7265x {
    fn default() -> Self {
        Self::new()
    }
}

impl SimAs7265x {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState::new())),
        }
    }

    // ── Scenario setup ────────────────────────────────────────

    /// Load a calibrated channel value into a sub-device's data registers.
    pub fn set_channel(&self, device: DeviceSelector, index: usize, value: f32) {
        let mut s = self.state.borrow_mut();
        let base = VIRT_CALIBRATED_START as usize + index * BYTES_PER_CHANNEL as usize;
        s.regs[device as usize][base..base + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Fill every channel of every device with a recognisable pattern:
    /// `device * 100 + index + 1`.
    pub fn load_pattern(&self) {
        for dev in DeviceSelector::ALL {
            for i in 0..CHANNELS_PER_DEVICE {
                self.set_channel(dev, i, (dev as u8 as f32) * 100.0 + i as f32 + 1.0);
            }
        }
    }

    /// Remove the chip from the bus (every transfer NAKs on address).
    pub fn set_present(&self, present: bool) {
        self.state.borrow_mut().present = present;
    }

    /// HW_VERSION reads 0x00 for the next `reads` reads.
    pub fn set_booting_reads(&self, reads: u32) {
        self.state.borrow_mut().booting_reads = reads;
    }

    pub fn set_hw_version(&self, value: u8) {
        self.state.borrow_mut().regs[0][VIRT_HW_VERSION as usize] = value;
    }

    /// TX_VALID reported for the next `polls` status reads.
    pub fn set_tx_busy_polls(&self, polls: u32) {
        self.state.borrow_mut().tx_busy_polls = polls;
    }

    pub fn set_tx_stuck(&self, stuck: bool) {
        self.state.borrow_mut().tx_stuck = stuck;
    }

    pub fn set_rx_never_valid(&self, never: bool) {
        self.state.borrow_mut().rx_never_valid = never;
    }

    /// Every physical transfer NAKs.
    pub fn set_bus_fault(&self, fault: bool) {
        self.state.borrow_mut().bus_fault = fault;
    }

    /// Reads of `addr` in `device`'s bank NAK when fetched from READ.
    pub fn fail_read(&self, device: DeviceSelector, addr: u8) {
        self.state.borrow_mut().fail_reads.push((device, addr));
    }

    /// Writing DEV_SEL = `device` NAKs.
    pub fn fail_select(&self, device: Option<DeviceSelector>) {
        self.state.borrow_mut().fail_select = device;
    }

    /// CONFIG reads after a one-shot trigger before DATA_RDY rises;
    /// `None` means it never does.
    pub fn set_ready_after(&self, reads: Option<u32>) {
        self.state.borrow_mut().ready_after = reads;
    }

    // ── Inspection ────────────────────────────────────────────

    /// Raw virtual register value; banked registers use the current DEV_SEL.
    pub fn virtual_reg(&self, addr: u8) -> u8 {
        let s = self.state.borrow();
        s.regs[s.bank_for(addr)][addr as usize]
    }

    pub fn bank_reg(&self, device: DeviceSelector, addr: u8) -> u8 {
        self.state.borrow().regs[device as usize][addr as usize]
    }

    pub fn selector(&self) -> Option<DeviceSelector> {
        DeviceSelector::from_raw(self.state.borrow().regs[0][VIRT_DEV_SEL as usize])
    }

    pub fn bulb_on(&self, device: DeviceSelector) -> bool {
        self.bank_reg(device, VIRT_LED_CONFIG) & LED_BULB_ENABLE != 0
    }

    pub fn any_bulb_on(&self) -> bool {
        DeviceSelector::ALL.iter().any(|&d| self.bulb_on(d))
    }

    pub fn status_reads(&self) -> u32 {
        self.state.borrow().status_reads
    }

    pub fn selector_writes(&self) -> Vec<u8> {
        self.state.borrow().selector_writes.clone()
    }

    pub fn config_writes(&self) -> Vec<u8> {
        self.state.borrow().config_writes.clone()
    }
}

impl ErrorType for SimAs7265x {
    type Error = ErrorKind;
}

impl I2c for SimAs7265x {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut s = self.state.borrow_mut();
        if address != I2C_ADDRESS || !s.present {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        if s.bus_fault {
            return Err(ErrorKind::Bus);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => match **bytes {
                    [reg] => s.pointer = reg,
                    [reg, value] => s.write_register(reg, value)?,
                    _ => return Err(ErrorKind::Other),
                },
                Operation::Read(buf) => {
                    let reg = s.pointer;
                    for byte in buf.iter_mut() {
                        *byte = s.read_register(reg)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Delay provider that only accumulates the requested time.
#[derive(Debug, Default, Clone)]
pub struct NoopDelay {
    pub total_ns: u64,
}

impl NoopDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
