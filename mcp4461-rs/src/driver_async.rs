use crate::{
    EepromLocation, FailureCause, Mcp4461Builder, Mcp4461Error, Mcp4461Result, StatusRegister,
    TerminalConnector, TerminalControl, Wiper,
    bank::{WiperBank, WiperChannel},
    registers::{Command, EEPROM_MAX, STATUS_ADDR, WIPER_MAX, command_byte, encode_write},
    traits::Addressing,
};
use embedded_float_output::level_to_taps;
use embedded_hal_async::{
    delay::DelayNs,
    i2c::{I2c, SevenBitAddress},
};
use log::{debug, error, trace, warn};

/// A MCP4461 quad digital potentiometer.
///
/// Takes ownership of an I2C bus (implementing [`I2c`](embedded_hal_async::i2c::I2c) trait)
/// and a timer object implementing the [`DelayNs`](embedded_hal_async::delay::DelayNs) trait.
pub struct Mcp4461Async<I, D> {
    pub(crate) i2c: I,
    pub(crate) addr: u8,
    pub(crate) delay: D,
    pub(crate) eeprom_timeout_ms: u32,
    pub(crate) bank: WiperBank,
}

impl Mcp4461Builder {
    /// Builds a new `Mcp4461Async` instance and brings the device up.
    pub async fn build_async<I: I2c<SevenBitAddress>, D: DelayNs>(
        self,
        i2c: I,
        delay: D,
    ) -> Mcp4461Result<Mcp4461Async<I, D>, I::Error> {
        let mut dev = Mcp4461Async {
            i2c,
            addr: self.addr,
            delay,
            eeprom_timeout_ms: self.eeprom_timeout_ms,
            bank: WiperBank::new(self.channels),
        };
        debug!("setting up MCP4461 at address {:#04x}", dev.addr);
        dev.probe().await?;
        dev.begin().await?;
        Ok(dev)
    }
}

impl<I, D> Mcp4461Async<I, D> {
    /// Whether a bus fault or malformed status register disabled the driver.
    pub fn is_failed(&self) -> bool {
        self.bank.failure.is_some()
    }

    /// Why the driver was disabled, if it was.
    pub fn failure(&self) -> Option<FailureCause> {
        self.bank.failure
    }

    /// Whether an operation was refused since the last poll.
    pub fn has_warning(&self) -> bool {
        self.bank.warning
    }

    /// Whether the WP pin was asserted at the last status register read.
    pub fn is_write_protected(&self) -> bool {
        self.bank.write_protected
    }

    /// Whether staged changes are waiting for the next poll.
    pub fn is_dirty(&self) -> bool {
        self.bank.dirty
    }

    /// Cached state of a wiper.
    pub fn channel(&self, wiper: Wiper) -> &WiperChannel {
        self.bank.channel(wiper)
    }

    /// Release the bus and timer.
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}

impl<I: I2c<SevenBitAddress>, D: DelayNs> Mcp4461Async<I, D> {
    async fn probe(&mut self) -> Mcp4461Result<(), I::Error> {
        self.i2c
            .write(self.addr, &[])
            .await
            .map_err(|e| self.bank.bus_fault(e))
    }

    async fn begin(&mut self) -> Mcp4461Result<(), I::Error> {
        self.status_register().await?;
        for wiper in Wiper::ALL {
            if let Some(level) = self.bank.channel(wiper).initial_value {
                let taps = level_to_taps(level, WIPER_MAX);
                match self.write_wiper_level(wiper, taps).await {
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => warn!(
                        "wiper {}: initial value not applied: {}",
                        wiper.index(),
                        e.message()
                    ),
                    Ok(()) => {}
                }
            }
            if self.bank.channel(wiper).enabled {
                let value = self.read_wiper_level(wiper).await?;
                self.bank.record_read(wiper, value);
            } else if wiper.is_volatile() {
                self.bank.isolate(wiper);
            }
        }
        for connector in TerminalConnector::ALL {
            let byte = self.read_word(&connector).await?;
            self.bank
                .record_terminal(connector, TerminalControl::from_bits(byte as u8));
        }
        // terminals disconnected through the builder go out on the first poll
        if TerminalConnector::ALL
            .into_iter()
            .any(|connector| self.bank.pending_terminal(connector).is_some())
        {
            self.bank.dirty = true;
        }
        Ok(())
    }

    async fn read_raw(&mut self, address: u8) -> Mcp4461Result<u16, I::Error> {
        let mut buf = [0; 2];
        self.i2c
            .write_read(self.addr, &[command_byte(address, Command::Read)], &mut buf)
            .await
            .map_err(|e| self.bank.bus_fault(e))?;
        Ok(u16::from_be_bytes(buf))
    }

    async fn read_word<R: Addressing>(&mut self, reg: &R) -> Mcp4461Result<u16, I::Error> {
        self.bank.alive()?;
        if reg.non_volatile() && !self.is_eeprom_ready(true).await? {
            return Err(self.bank.refuse(None, Mcp4461Error::EepromBusy));
        }
        self.read_raw(reg.address()).await
    }

    async fn write_word<R: Addressing>(
        &mut self,
        reg: &R,
        data: u16,
    ) -> Mcp4461Result<(), I::Error> {
        self.bank.alive()?;
        if reg.non_volatile() {
            self.bank.check_write_protect(None)?;
            if !self.is_eeprom_ready(true).await? {
                return Err(self.bank.refuse(None, Mcp4461Error::EepromBusy));
            }
        }
        trace!("writing {} to address {:#04x}", data, reg.address());
        self.i2c
            .write(self.addr, &encode_write(reg.address(), data))
            .await
            .map_err(|e| self.bank.bus_fault(e))
    }

    async fn read_wiper_level(&mut self, wiper: Wiper) -> Mcp4461Result<u16, I::Error> {
        let value = self.read_word(&wiper).await? & EEPROM_MAX;
        self.bank.check_reading(value)
    }

    async fn write_wiper_level(&mut self, wiper: Wiper, value: u16) -> Mcp4461Result<(), I::Error> {
        self.write_word(&wiper, value).await?;
        self.bank.record_synced(wiper, value);
        Ok(())
    }

    /// Read and validate the status register.
    pub async fn status_register(&mut self) -> Mcp4461Result<StatusRegister, I::Error> {
        self.bank.alive()?;
        let raw = self.read_raw(STATUS_ADDR).await?;
        self.bank.apply_status(raw)
    }

    /// Whether the EEPROM can accept a new write, optionally waiting for the
    /// running write cycle to end.
    pub async fn is_eeprom_ready(&mut self, wait: bool) -> Mcp4461Result<bool, I::Error> {
        let mut writing = self.status_register().await?.eeprom_write_active();
        if !writing {
            return Ok(true);
        }
        if !wait || self.bank.eeprom_timed_out {
            return Ok(false);
        }
        let mut elapsed = 0;
        while writing && elapsed < self.eeprom_timeout_ms {
            self.delay.delay_ms(1).await;
            elapsed += 1;
            writing = self.status_register().await?.eeprom_write_active();
        }
        if writing {
            error!("EEPROM write timeout exceeded ({} ms)", self.eeprom_timeout_ms);
            self.bank.eeprom_timed_out = true;
            return Ok(false);
        }
        Ok(true)
    }

    /// Level of a wiper, cached for volatile wipers and read for non-volatile ones.
    pub async fn get_wiper_level(&mut self, wiper: Wiper) -> Mcp4461Result<u16, I::Error> {
        if wiper.is_volatile() {
            return self.bank.cached_level(wiper);
        }
        self.bank.check_readable(wiper)?;
        self.read_wiper_level(wiper).await
    }

    /// Read a wiper from the device and replace the cached level with it.
    pub async fn update_wiper_level(&mut self, wiper: Wiper) -> Mcp4461Result<u16, I::Error> {
        self.bank.check_readable(wiper)?;
        let value = self.read_wiper_level(wiper).await?;
        self.bank.record_read(wiper, value);
        Ok(value)
    }

    /// Stage a new tap count (0-256) for a wiper.
    pub fn set_wiper_level(&mut self, wiper: Wiper, value: u16) -> Mcp4461Result<(), I::Error> {
        self.bank.stage_level(wiper, value)
    }

    /// Connect the resistor network of a volatile wiper.
    pub fn enable_wiper(&mut self, wiper: Wiper) -> Mcp4461Result<(), I::Error> {
        self.bank.stage_connection(wiper, true)
    }

    /// Disconnect the resistor network of a volatile wiper.
    pub fn disable_wiper(&mut self, wiper: Wiper) -> Mcp4461Result<(), I::Error> {
        self.bank.stage_connection(wiper, false)
    }

    /// Move a volatile wiper up by one tap.
    pub async fn increase_wiper(&mut self, wiper: Wiper) -> Mcp4461Result<(), I::Error> {
        self.step_wiper(wiper, Command::Increment).await
    }

    /// Move a volatile wiper down by one tap.
    pub async fn decrease_wiper(&mut self, wiper: Wiper) -> Mcp4461Result<(), I::Error> {
        self.step_wiper(wiper, Command::Decrement).await
    }

    async fn step_wiper(&mut self, wiper: Wiper, command: Command) -> Mcp4461Result<(), I::Error> {
        self.bank.check_step(wiper)?;
        if self.bank.channel(wiper).is_pending() {
            let value = self.bank.channel(wiper).state;
            self.write_wiper_level(wiper, value).await?;
        }
        self.i2c
            .write(self.addr, &[command_byte(wiper.address(), command)])
            .await
            .map_err(|e| self.bank.bus_fault(e))?;
        self.bank.record_step(wiper, command == Command::Increment);
        Ok(())
    }

    /// Connect terminal `a`, `b`, `w` or `h` of a volatile wiper.
    pub fn enable_terminal(&mut self, wiper: Wiper, terminal: char) -> Mcp4461Result<(), I::Error> {
        self.bank.stage_terminal(wiper, terminal, true)
    }

    /// Disconnect terminal `a`, `b`, `w` or `h` of a volatile wiper.
    pub fn disable_terminal(
        &mut self,
        wiper: Wiper,
        terminal: char,
    ) -> Mcp4461Result<(), I::Error> {
        self.bank.stage_terminal(wiper, terminal, false)
    }

    /// Raw value of a terminal control register.
    pub async fn get_terminal_register(
        &mut self,
        connector: TerminalConnector,
    ) -> Mcp4461Result<u8, I::Error> {
        Ok((self.read_word(&connector).await? & 0xff) as u8)
    }

    /// Write a terminal control register and adopt it as the cached terminal state.
    pub async fn set_terminal_register(
        &mut self,
        connector: TerminalConnector,
        data: u8,
    ) -> Mcp4461Result<(), I::Error> {
        self.write_word(&connector, data as u16).await?;
        let byte = TerminalControl::from_bits(data);
        self.bank.record_terminal(connector, byte);
        self.bank.unpack_terminal_byte(connector, byte);
        Ok(())
    }

    /// Read a terminal control register into the cached terminal flags.
    pub async fn update_terminal_register(
        &mut self,
        connector: TerminalConnector,
    ) -> Mcp4461Result<TerminalControl, I::Error> {
        let byte = TerminalControl::from_bits(self.get_terminal_register(connector).await?);
        self.bank.record_terminal(connector, byte);
        self.bank.unpack_terminal_byte(connector, byte);
        Ok(byte)
    }

    /// Read a general purpose EEPROM cell.
    pub async fn get_eeprom_value(
        &mut self,
        location: EepromLocation,
    ) -> Mcp4461Result<u16, I::Error> {
        Ok(self.read_word(&location).await? & EEPROM_MAX)
    }

    /// Write a general purpose EEPROM cell (0-511).
    pub async fn set_eeprom_value(
        &mut self,
        location: EepromLocation,
        value: u16,
    ) -> Mcp4461Result<(), I::Error> {
        self.bank.alive()?;
        if value > EEPROM_MAX {
            return Err(self.bank.refuse(None, Mcp4461Error::ValueOutOfRange));
        }
        self.write_word(&location, value).await
    }

    /// Push staged changes to the device. See [`Mcp4461::poll`](crate::Mcp4461::poll).
    pub async fn poll(&mut self) -> Mcp4461Result<(), I::Error> {
        self.bank.alive()?;
        if self.bank.warning {
            self.status_register().await?;
            self.bank.warning = false;
        }
        if !self.bank.dirty {
            return Ok(());
        }
        for wiper in Wiper::ALL {
            let channel = self.bank.channel(wiper);
            if !channel.is_pending() {
                continue;
            }
            let value = channel.state;
            // WiperLock may have been set since the level was staged
            let flushed = match self.bank.check_mutable(wiper) {
                Ok(()) => self.write_wiper_level(wiper, value).await,
                Err(e) => Err(e),
            };
            if let Err(e) = flushed {
                warn!("wiper {}: writing level {} failed: {}", wiper.index(), value, e.message());
            }
        }
        for connector in TerminalConnector::ALL {
            let Some(byte) = self.bank.pending_terminal(connector) else {
                continue;
            };
            match self.write_word(&connector, byte.into_bits() as u16).await {
                Ok(()) => self.bank.record_terminal(connector, byte),
                Err(e) => warn!("terminal {:?}: write failed: {}", connector, e.message()),
            }
        }
        self.bank.dirty = false;
        self.bank.alive()
    }
}
