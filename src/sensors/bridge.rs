//! Virtual-register bridge.
//!
//! The AS7265x does not map its configuration and data registers onto the
//! I2C bus directly.  A small controller inside the master chip serves them
//! and talks to us through three physical registers:
//!
//! ```text
//!   STATUS (0x00)  ── TX_VALID: WRITE not yet consumed
//!                  ── RX_VALID: READ holds a byte for us
//!   WRITE  (0x01)  ── virtual address (bit 7 = write) then payload
//!   READ   (0x02)  ── result of a virtual read
//!
//!   write(addr, v):  wait TX clear ─▶ WRITE ← addr|0x80 ─▶ wait TX clear ─▶ WRITE ← v
//!   read(addr):      wait TX clear ─▶ WRITE ← addr      ─▶ wait RX set   ─▶ v ← READ
//! ```
//!
//! Every wait is a bounded [`poll_until`]; running out of attempts is
//! [`BusError::Timeout`], a NAK or arbitration loss is
//! [`BusError::TransactionFailure`].  Neither is retried here.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::trace;

use super::registers::{
    I2C_ADDRESS, PHY_READ, PHY_STATUS, PHY_WRITE, STATUS_RX_VALID, STATUS_TX_VALID, WRITE_MARKER,
};
use crate::error::BusError;
use crate::retry::{RetryError, RetryPolicy, poll_until};

/// Poll budgets for the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTiming {
    /// Waiting for the master to consume WRITE (≈100 ms by default).
    pub tx_ready: RetryPolicy,
    /// Waiting for a read result to land in READ (≈200 ms by default).
    pub rx_ready: RetryPolicy,
}

impl Default for BridgeTiming {
    fn default() -> Self {
        Self {
            tx_ready: RetryPolicy::new(2, 50),
            rx_ready: RetryPolicy::new(2, 100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// One logical register access.  For reads, `value` is filled in once the
/// transaction completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTransaction {
    pub direction: Direction,
    pub address: u8,
    pub value: u8,
}

impl BridgeTransaction {
    pub const fn read(address: u8) -> Self {
        Self {
            direction: Direction::Read,
            address,
            value: 0,
        }
    }

    pub const fn write(address: u8, value: u8) -> Self {
        Self {
            direction: Direction::Write,
            address,
            value,
        }
    }
}

/// Synchronous access to the virtual register space over a physical bus.
pub struct VirtualRegisterBridge<I2C, D> {
    i2c: I2C,
    delay: D,
    timing: BridgeTiming,
}

impl<I2C: I2c, D: DelayNs> VirtualRegisterBridge<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_timing(i2c, delay, BridgeTiming::default())
    }

    pub fn with_timing(i2c: I2C, delay: D, timing: BridgeTiming) -> Self {
        Self { i2c, delay, timing }
    }

    /// Write one virtual register.
    pub fn write(&mut self, address: u8, value: u8) -> Result<(), BusError> {
        self.execute(BridgeTransaction::write(address, value))
            .map(|_| ())
    }

    /// Read one virtual register.
    pub fn read(&mut self, address: u8) -> Result<u8, BusError> {
        self.execute(BridgeTransaction::read(address))
            .map(|tx| tx.value)
    }

    /// Run a transaction to completion, returning it with `value` settled.
    pub fn execute(&mut self, mut tx: BridgeTransaction) -> Result<BridgeTransaction, BusError> {
        if tx.address & WRITE_MARKER != 0 {
            return Err(BusError::TransactionFailure);
        }

        self.wait_status(self.timing.tx_ready, STATUS_TX_VALID, false)?;
        match tx.direction {
            Direction::Write => {
                self.write_phy(PHY_WRITE, tx.address | WRITE_MARKER)?;
                self.wait_status(self.timing.tx_ready, STATUS_TX_VALID, false)?;
                self.write_phy(PHY_WRITE, tx.value)?;
            }
            Direction::Read => {
                self.write_phy(PHY_WRITE, tx.address)?;
                self.wait_status(self.timing.rx_ready, STATUS_RX_VALID, true)?;
                tx.value = self.read_phy(PHY_READ)?;
            }
        }

        trace!("AS7265x: {:?}", tx);
        Ok(tx)
    }

    /// Suspension point shared with the driver (settle and reset delays).
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    pub fn timing(&self) -> BridgeTiming {
        self.timing
    }

    /// Give back the bus and delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    // ── Physical layer ────────────────────────────────────────

    fn wait_status(&mut self, policy: RetryPolicy, flag: u8, want_set: bool) -> Result<(), BusError> {
        let i2c = &mut self.i2c;
        poll_until(policy, &mut self.delay, || -> Result<Option<()>, BusError> {
            let status = read_phy_reg(i2c, PHY_STATUS)?;
            Ok(((status & flag != 0) == want_set).then_some(()))
        })
        .map_err(|e| match e {
            RetryError::Exhausted => BusError::Timeout,
            RetryError::Aborted(bus) => bus,
        })
    }

    fn read_phy(&mut self, reg: u8) -> Result<u8, BusError> {
        read_phy_reg(&mut self.i2c, reg)
    }

    fn write_phy(&mut self, reg: u8, value: u8) -> Result<(), BusError> {
        self.i2c
            .write(I2C_ADDRESS, &[reg, value])
            .map_err(|_| BusError::TransactionFailure)
    }
}

fn read_phy_reg<I2C: I2c>(i2c: &mut I2C, reg: u8) -> Result<u8, BusError> {
    let mut buf = [0u8; 1];
    i2c.write_read(I2C_ADDRESS, &[reg], &mut buf)
        .map_err(|_| BusError::TransactionFailure)?;
    Ok(buf[0])
}
