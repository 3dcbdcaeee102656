use core::cell::RefCell;

use crate::{Mcp4461, Mcp4461Error, Mcp4461Result, Wiper, registers::WIPER_MAX};
use embedded_float_output::{
    FloatOutput, LEVEL_MAX, LEVEL_MIN, OutputError, OutputResult, level_to_taps, taps_to_level,
};
use embedded_hal::{
    delay::DelayNs,
    i2c::{I2c, SevenBitAddress},
};
use log::warn;

/// A single wiper of a shared [`Mcp4461`], exposed as a [`FloatOutput`].
///
/// Levels in `[0.0, 1.0]` map linearly onto taps `0..=256`. Several wipers
/// can share one controller through the [`RefCell`]; changes are staged and
/// reach the device on the next [`Mcp4461::poll`].
pub struct Mcp4461Wiper<'a, I, D> {
    dev: &'a RefCell<Mcp4461<I, D>>,
    wiper: Wiper,
}

impl<'a, I, D> Mcp4461Wiper<'a, I, D> {
    /// Bind an output to one wiper of the controller.
    pub fn new(dev: &'a RefCell<Mcp4461<I, D>>, wiper: Wiper) -> Self {
        Self { dev, wiper }
    }

    /// The wiper driven by this output.
    pub fn wiper(&self) -> Wiper {
        self.wiper
    }
}

impl<I: I2c<SevenBitAddress>, D: DelayNs> Mcp4461Wiper<'_, I, D> {
    /// Connect the resistor network.
    pub fn enable(&mut self) -> Mcp4461Result<(), I::Error> {
        self.dev.borrow_mut().enable_wiper(self.wiper)
    }

    /// Disconnect the resistor network.
    pub fn disable(&mut self) -> Mcp4461Result<(), I::Error> {
        self.dev.borrow_mut().disable_wiper(self.wiper)
    }

    /// Move up by one tap.
    pub fn increase(&mut self) -> Mcp4461Result<(), I::Error> {
        self.dev.borrow_mut().increase_wiper(self.wiper)
    }

    /// Move down by one tap.
    pub fn decrease(&mut self) -> Mcp4461Result<(), I::Error> {
        self.dev.borrow_mut().decrease_wiper(self.wiper)
    }

    /// Connect terminal `a`, `b`, `w` or `h`.
    pub fn enable_terminal(&mut self, terminal: char) -> Mcp4461Result<(), I::Error> {
        self.dev.borrow_mut().enable_terminal(self.wiper, terminal)
    }

    /// Disconnect terminal `a`, `b`, `w` or `h`.
    pub fn disable_terminal(&mut self, terminal: char) -> Mcp4461Result<(), I::Error> {
        self.dev.borrow_mut().disable_terminal(self.wiper, terminal)
    }

    /// Stage the current level of a volatile wiper into its EEPROM-backed
    /// shadow, so the device powers up at this level.
    pub fn save_level(&mut self) -> Mcp4461Result<(), I::Error> {
        let mut dev = self.dev.borrow_mut();
        let Some(shadow) = self.wiper.shadow() else {
            return Err(dev.bank.refuse(Some(self.wiper), Mcp4461Error::VolatileOnly));
        };
        let value = dev.get_wiper_level(self.wiper)?;
        dev.set_wiper_level(shadow, value)
    }
}

impl<I: I2c<SevenBitAddress>, D: DelayNs> FloatOutput for Mcp4461Wiper<'_, I, D> {
    type Error = Mcp4461Error<I::Error>;

    fn write_level(&mut self, level: f32) -> OutputResult<(), Self::Error> {
        if level.is_nan() {
            return Err(OutputError::InvalidLevel);
        }
        if !(LEVEL_MIN..=LEVEL_MAX).contains(&level) {
            warn!("wiper {}: level {} clamped to [0, 1]", self.wiper.index(), level);
        }
        let taps = level_to_taps(level, WIPER_MAX);
        self.dev.borrow_mut().set_wiper_level(self.wiper, taps)?;
        Ok(())
    }

    fn read_level(&mut self) -> OutputResult<f32, Self::Error> {
        let taps = self.dev.borrow_mut().get_wiper_level(self.wiper)?;
        Ok(taps_to_level(taps, WIPER_MAX))
    }
}
