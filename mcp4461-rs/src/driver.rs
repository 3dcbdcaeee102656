use crate::{
    EepromLocation, FailureCause, Mcp4461Error, Mcp4461Result, StatusRegister, Terminal,
    TerminalConnector, TerminalControl, Wiper,
    bank::{WiperBank, WiperChannel},
    registers::{
        Command, DEFAULT_ADDRESS, EEPROM_MAX, STATUS_ADDR, WIPER_MAX, command_byte, encode_write,
    },
    traits::Addressing,
};
use embedded_float_output::level_to_taps;
use embedded_hal::{
    delay::DelayNs,
    i2c::{I2c, SevenBitAddress},
};
use log::{debug, error, trace, warn};

/// Default time allowed for an EEPROM write cycle to finish.
pub const EEPROM_WRITE_TIMEOUT_MS: u32 = 10;

/// A MCP4461 quad digital potentiometer.
///
/// Takes ownership of an I2C bus (implementing [`I2c`](embedded_hal::i2c::I2c) trait)
/// and a timer object implementing the [`DelayNs`](embedded_hal::delay::DelayNs) trait.
/// The timer paces the EEPROM busy wait.
///
/// Wiper changes are staged in memory and pushed to the device by [`Mcp4461::poll`].
pub struct Mcp4461<I, D> {
    pub(crate) i2c: I,
    pub(crate) addr: u8,
    pub(crate) delay: D,
    pub(crate) eeprom_timeout_ms: u32,
    pub(crate) bank: WiperBank,
}

/// Builder for creating a [`Mcp4461`] or [`Mcp4461Async`](crate::Mcp4461Async) instance.
pub struct Mcp4461Builder {
    pub(crate) addr: u8,
    pub(crate) eeprom_timeout_ms: u32,
    pub(crate) channels: [WiperChannel; 8],
}

impl Default for Mcp4461Builder {
    fn default() -> Self {
        Mcp4461Builder {
            addr: DEFAULT_ADDRESS,
            eeprom_timeout_ms: EEPROM_WRITE_TIMEOUT_MS,
            channels: Default::default(),
        }
    }
}

impl Mcp4461Builder {
    /// Sets the 7-bit I2C address, `0x2c` to `0x2f` depending on A1:A0.
    pub fn with_address(mut self, addr: u8) -> Self {
        self.addr = addr;
        self
    }

    /// Sets how long to wait for a running EEPROM write cycle before giving up.
    pub fn with_eeprom_timeout(mut self, ms: u32) -> Self {
        self.eeprom_timeout_ms = ms;
        self
    }

    /// Disables a volatile wiper.
    ///
    /// The resistor network is disconnected during setup and every later
    /// operation on the wiper is refused. Non-volatile wipers cannot be disabled.
    pub fn disable_wiper(mut self, wiper: Wiper) -> Self {
        if wiper.is_volatile() {
            self.channels[wiper.index()].enabled = false;
        } else {
            warn!("cannot disable nonvolatile wiper {}", wiper.index());
        }
        self
    }

    /// Sets a normalized level written to the wiper once during setup.
    pub fn with_initial_value(mut self, wiper: Wiper, level: f32) -> Self {
        self.channels[wiper.index()].initial_value = Some(level);
        self
    }

    /// Starts with one terminal of a volatile wiper disconnected.
    pub fn disable_terminal(mut self, wiper: Wiper, terminal: Terminal) -> Self {
        if !wiper.is_volatile() {
            warn!("cannot set terminals of nonvolatile wiper {}", wiper.index());
            return self;
        }
        let channel = &mut self.channels[wiper.index()];
        match terminal {
            Terminal::A => channel.terminal_a = false,
            Terminal::B => channel.terminal_b = false,
            Terminal::W => channel.terminal_w = false,
            Terminal::Hw => channel.terminal_hw = false,
        }
        self
    }

    /// Builds a new `Mcp4461` instance and brings the device up.
    ///
    /// Probes the bus, mirrors write protection and WiperLock state, applies
    /// initial values and seeds every enabled wiper from the device.
    pub fn build<I: I2c<SevenBitAddress>, D: DelayNs>(
        self,
        i2c: I,
        delay: D,
    ) -> Mcp4461Result<Mcp4461<I, D>, I::Error> {
        let mut dev = Mcp4461 {
            i2c,
            addr: self.addr,
            delay,
            eeprom_timeout_ms: self.eeprom_timeout_ms,
            bank: WiperBank::new(self.channels),
        };
        debug!("setting up MCP4461 at address {:#04x}", dev.addr);
        dev.probe()?;
        dev.begin()?;
        Ok(dev)
    }
}

impl<I, D> Mcp4461<I, D> {
    /// Whether a bus fault or malformed status register disabled the driver.
    pub fn is_failed(&self) -> bool {
        self.bank.failure.is_some()
    }

    /// Why the driver was disabled, if it was.
    pub fn failure(&self) -> Option<FailureCause> {
        self.bank.failure
    }

    /// Whether an operation was refused since the last [`poll`](Self::poll).
    pub fn has_warning(&self) -> bool {
        self.bank.warning
    }

    /// Whether the WP pin was asserted at the last status register read.
    pub fn is_write_protected(&self) -> bool {
        self.bank.write_protected
    }

    /// Whether staged changes are waiting for the next [`poll`](Self::poll).
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

impl<I: I2c<SevenBitAddress>, D: DelayNs> Mcp4461<I, D> {
    fn probe(&mut self) -> Mcp4461Result<(), I::Error> {
        self.i2c
            .write(self.addr, &[])
            .map_err(|e| self.bank.bus_fault(e))
    }

    fn begin(&mut self) -> Mcp4461Result<(), I::Error> {
        self.status_register()?;
        for wiper in Wiper::ALL {
            if let Some(level) = self.bank.channel(wiper).initial_value {
                let taps = level_to_taps(level, WIPER_MAX);
                match self.write_wiper_level(wiper, taps) {
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
                let value = self.read_wiper_level(wiper)?;
                self.bank.record_read(wiper, value);
            } else if wiper.is_volatile() {
                self.bank.isolate(wiper);
            }
        }
        for connector in TerminalConnector::ALL {
            let byte = self.read_word(&connector)?;
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

    fn read_raw(&mut self, address: u8) -> Mcp4461Result<u16, I::Error> {
        let mut buf = [0; 2];
        self.i2c
            .write_read(self.addr, &[command_byte(address, Command::Read)], &mut buf)
            .map_err(|e| self.bank.bus_fault(e))?;
        Ok(u16::from_be_bytes(buf))
    }

    fn read_word<R: Addressing>(&mut self, reg: &R) -> Mcp4461Result<u16, I::Error> {
        self.bank.alive()?;
        if reg.non_volatile() && !self.is_eeprom_ready(true)? {
            return Err(self.bank.refuse(None, Mcp4461Error::EepromBusy));
        }
        self.read_raw(reg.address())
    }

    fn write_word<R: Addressing>(&mut self, reg: &R, data: u16) -> Mcp4461Result<(), I::Error> {
        self.bank.alive()?;
        if reg.non_volatile() {
            self.bank.check_write_protect(None)?;
            if !self.is_eeprom_ready(true)? {
                return Err(self.bank.refuse(None, Mcp4461Error::EepromBusy));
            }
        }
        trace!("writing {} to address {:#04x}", data, reg.address());
        self.i2c
            .write(self.addr, &encode_write(reg.address(), data))
            .map_err(|e| self.bank.bus_fault(e))
    }

    fn read_wiper_level(&mut self, wiper: Wiper) -> Mcp4461Result<u16, I::Error> {
        let value = self.read_word(&wiper)? & EEPROM_MAX;
        self.bank.check_reading(value)
    }

    fn write_wiper_level(&mut self, wiper: Wiper, value: u16) -> Mcp4461Result<(), I::Error> {
        self.write_word(&wiper, value)?;
        self.bank.record_synced(wiper, value);
        Ok(())
    }

    /// Read and validate the status register.
    ///
    /// Refreshes the cached write protection and WiperLock flags. A reading
    /// with R1, D7 or D8 cleared marks the device failed.
    pub fn status_register(&mut self) -> Mcp4461Result<StatusRegister, I::Error> {
        self.bank.alive()?;
        let raw = self.read_raw(STATUS_ADDR)?;
        self.bank.apply_status(raw)
    }

    /// Whether the EEPROM can accept a new write.
    ///
    /// With `wait` set, polls the status register once per millisecond until
    /// the write cycle ends or the EEPROM timeout elapses. A timeout is
    /// remembered: later calls report "not ready" without waiting until a
    /// status read shows the cycle has finished.
    pub fn is_eeprom_ready(&mut self, wait: bool) -> Mcp4461Result<bool, I::Error> {
        let mut writing = self.status_register()?.eeprom_write_active();
        if !writing {
            return Ok(true);
        }
        if !wait || self.bank.eeprom_timed_out {
            return Ok(false);
        }
        trace!("waiting for EEPROM write cycle");
        let mut elapsed = 0;
        while writing && elapsed < self.eeprom_timeout_ms {
            self.delay.delay_ms(1);
            elapsed += 1;
            writing = self.status_register()?.eeprom_write_active();
        }
        if writing {
            error!("EEPROM write timeout exceeded ({} ms)", self.eeprom_timeout_ms);
            self.bank.eeprom_timed_out = true;
            return Ok(false);
        }
        trace!("EEPROM ready after {} ms", elapsed);
        Ok(true)
    }

    /// Level of a wiper.
    ///
    /// Volatile wipers answer from the cache, non-volatile wipers are read
    /// from the device once no EEPROM write cycle is running.
    pub fn get_wiper_level(&mut self, wiper: Wiper) -> Mcp4461Result<u16, I::Error> {
        if wiper.is_volatile() {
            return self.bank.cached_level(wiper);
        }
        self.bank.check_readable(wiper)?;
        self.read_wiper_level(wiper)
    }

    /// Read a wiper from the device and replace the cached level with it.
    pub fn update_wiper_level(&mut self, wiper: Wiper) -> Mcp4461Result<u16, I::Error> {
        self.bank.check_readable(wiper)?;
        let value = self.read_wiper_level(wiper)?;
        trace!("got value {} from wiper {}", value, wiper.index());
        self.bank.record_read(wiper, value);
        Ok(value)
    }

    /// Stage a new tap count (0-256) for a wiper.
    ///
    /// Nothing is sent until the next [`poll`](Self::poll), so several wipers
    /// changed within one cycle are flushed together.
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
    pub fn increase_wiper(&mut self, wiper: Wiper) -> Mcp4461Result<(), I::Error> {
        self.step_wiper(wiper, Command::Increment)
    }

    /// Move a volatile wiper down by one tap.
    pub fn decrease_wiper(&mut self, wiper: Wiper) -> Mcp4461Result<(), I::Error> {
        self.step_wiper(wiper, Command::Decrement)
    }

    fn step_wiper(&mut self, wiper: Wiper, command: Command) -> Mcp4461Result<(), I::Error> {
        self.bank.check_step(wiper)?;
        // a staged level has to land first, the step is relative to the device
        if self.bank.channel(wiper).is_pending() {
            let value = self.bank.channel(wiper).state;
            self.write_wiper_level(wiper, value)?;
        }
        trace!("{:?} wiper {}", command, wiper.index());
        self.i2c
            .write(self.addr, &[command_byte(wiper.address(), command)])
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
    pub fn get_terminal_register(
        &mut self,
        connector: TerminalConnector,
    ) -> Mcp4461Result<u8, I::Error> {
        Ok((self.read_word(&connector)? & 0xff) as u8)
    }

    /// Write a terminal control register and adopt it as the cached terminal state.
    pub fn set_terminal_register(
        &mut self,
        connector: TerminalConnector,
        data: u8,
    ) -> Mcp4461Result<(), I::Error> {
        self.write_word(&connector, data as u16)?;
        let byte = TerminalControl::from_bits(data);
        self.bank.record_terminal(connector, byte);
        self.bank.unpack_terminal_byte(connector, byte);
        Ok(())
    }

    /// Read a terminal control register into the cached terminal flags.
    pub fn update_terminal_register(
        &mut self,
        connector: TerminalConnector,
    ) -> Mcp4461Result<TerminalControl, I::Error> {
        let byte = TerminalControl::from_bits(self.get_terminal_register(connector)?);
        trace!("got terminal register {:?} data {:#04x}", connector, byte.into_bits());
        self.bank.record_terminal(connector, byte);
        self.bank.unpack_terminal_byte(connector, byte);
        Ok(byte)
    }

    /// Read a general purpose EEPROM cell.
    pub fn get_eeprom_value(&mut self, location: EepromLocation) -> Mcp4461Result<u16, I::Error> {
        Ok(self.read_word(&location)? & EEPROM_MAX)
    }

    /// Write a general purpose EEPROM cell (0-511).
    pub fn set_eeprom_value(
        &mut self,
        location: EepromLocation,
        value: u16,
    ) -> Mcp4461Result<(), I::Error> {
        self.bank.alive()?;
        if value > EEPROM_MAX {
            return Err(self.bank.refuse(None, Mcp4461Error::ValueOutOfRange));
        }
        self.write_word(&location, value)
    }

    /// Push staged changes to the device.
    ///
    /// Call once per control cycle. Writes every enabled wiper whose cached
    /// level differs from the device, in index order, then each terminal
    /// control register whose packed value changed. A refused or failed write
    /// is logged and the pass carries on. If an operation was refused since the
    /// last pass, the status register is read first and the warning cleared.
    pub fn poll(&mut self) -> Mcp4461Result<(), I::Error> {
        self.bank.alive()?;
        if self.bank.warning {
            self.status_register()?;
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
                Ok(()) => self.write_wiper_level(wiper, value),
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
            trace!("updating terminal {:?} to {:#04x}", connector, byte.into_bits());
            match self.write_word(&connector, byte.into_bits() as u16) {
                Ok(()) => self.bank.record_terminal(connector, byte),
                Err(e) => warn!("terminal {:?}: write failed: {}", connector, e.message()),
            }
        }
        self.bank.dirty = false;
        self.bank.alive()
    }
}
