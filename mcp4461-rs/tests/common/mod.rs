#![allow(dead_code)]

use std::{cell::Cell, rc::Rc};

use embedded_hal_mock::eh1::i2c::Transaction;

pub const ADDR: u8 = 0x2c;
pub const STATUS_OK: u16 = 0x0182;
pub const EEPROM_BUSY: u16 = 0x0192;

/// Read command bytes of wipers 0-7.
pub const WIPER_READ: [u8; 8] = [0x0c, 0x1c, 0x6c, 0x7c, 0x2c, 0x3c, 0x8c, 0x9c];
pub const TCON0_READ: u8 = 0x4c;
pub const TCON1_READ: u8 = 0xac;

/// Delay that only counts the time it was asked to wait.
#[derive(Clone, Default)]
pub struct TickDelay(Rc<Cell<u64>>);

impl TickDelay {
    pub fn elapsed_ms(&self) -> u64 {
        self.0.get() / 1_000_000
    }
}

impl embedded_hal::delay::DelayNs for TickDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + ns as u64);
    }
}

impl embedded_hal_async::delay::DelayNs for TickDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + ns as u64);
    }
}

pub fn probe() -> Transaction {
    Transaction::write(ADDR, vec![])
}

pub fn status(raw: u16) -> Transaction {
    read(0x5c, raw)
}

pub fn read(cmd: u8, value: u16) -> Transaction {
    Transaction::write_read(ADDR, vec![cmd], value.to_be_bytes().to_vec())
}

pub fn write(bytes: &[u8]) -> Transaction {
    Transaction::write(ADDR, bytes.to_vec())
}

/// Bus traffic of a default build: probe, status, every wiper and both
/// terminal control registers at their power-on value.
pub fn setup(status_raw: u16, levels: [u16; 8]) -> Vec<Transaction> {
    let mut t = vec![probe(), status(status_raw)];
    for (i, level) in levels.into_iter().enumerate() {
        if i >= 4 {
            t.push(status(status_raw));
        }
        t.push(read(WIPER_READ[i], level));
    }
    t.push(read(TCON0_READ, 0xff));
    t.push(read(TCON1_READ, 0xff));
    t
}

pub fn with(
    mut first: Vec<Transaction>,
    rest: impl IntoIterator<Item = Transaction>,
) -> Vec<Transaction> {
    first.extend(rest);
    first
}
