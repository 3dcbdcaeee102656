use crate::{
    FailureCause, Mcp4461Error, StatusRegister, Terminal, TerminalConnector, TerminalControl, Wiper,
    registers::WIPER_MAX,
};
use log::{debug, error, trace, warn};

/// Cached state of one wiper.
///
/// Terminal flags are only meaningful for the volatile wipers 0-3 and are
/// never touched for 4-7.
#[derive(Debug, Clone, PartialEq)]
pub struct WiperChannel {
    /// Tap count, 0-256.
    pub state: u16,
    /// Whether the wiper accepts reads and writes. Only volatile wipers can be disabled.
    pub enabled: bool,
    /// WiperLock of the resistor network, mirrored from the status register.
    pub wiper_lock_active: bool,
    /// Terminal A connected.
    pub terminal_a: bool,
    /// Terminal B connected.
    pub terminal_b: bool,
    /// Wiper terminal connected.
    pub terminal_w: bool,
    /// Resistor network connected (hardware configuration bit).
    pub terminal_hw: bool,
    /// Normalized level written once during setup.
    pub initial_value: Option<f32>,
    pub(crate) synced: Option<u16>,
}

impl Default for WiperChannel {
    fn default() -> Self {
        WiperChannel {
            state: 0,
            enabled: true,
            wiper_lock_active: false,
            terminal_a: true,
            terminal_b: true,
            terminal_w: true,
            terminal_hw: true,
            initial_value: None,
            synced: None,
        }
    }
}

impl WiperChannel {
    /// Whether the cached tap count differs from the last value seen on the device.
    pub fn is_pending(&self) -> bool {
        self.enabled && self.synced != Some(self.state)
    }

    fn terminal_mut(&mut self, terminal: Terminal) -> &mut bool {
        match terminal {
            Terminal::A => &mut self.terminal_a,
            Terminal::B => &mut self.terminal_b,
            Terminal::W => &mut self.terminal_w,
            Terminal::Hw => &mut self.terminal_hw,
        }
    }
}

/// Device-side state shared by [`Mcp4461`](crate::Mcp4461) and
/// [`Mcp4461Async`](crate::Mcp4461Async).
///
/// Holds every guard the controller checks before touching the bus, so the
/// blocking and async drivers only differ in how they move bytes.
#[derive(Debug, Default)]
pub(crate) struct WiperBank {
    pub(crate) channels: [WiperChannel; 8],
    pub(crate) write_protected: bool,
    pub(crate) dirty: bool,
    pub(crate) warning: bool,
    pub(crate) failure: Option<FailureCause>,
    pub(crate) eeprom_timed_out: bool,
    pub(crate) tcon_synced: [Option<TerminalControl>; 2],
}

impl WiperBank {
    pub(crate) fn new(channels: [WiperChannel; 8]) -> Self {
        WiperBank {
            channels,
            ..Default::default()
        }
    }

    #[inline]
    pub(crate) fn channel(&self, wiper: Wiper) -> &WiperChannel {
        &self.channels[wiper.index()]
    }

    #[inline]
    fn channel_mut(&mut self, wiper: Wiper) -> &mut WiperChannel {
        &mut self.channels[wiper.index()]
    }

    pub(crate) fn alive<E>(&self) -> Result<(), Mcp4461Error<E>> {
        match self.failure {
            None => Ok(()),
            Some(cause) => {
                let err = Mcp4461Error::Failed(cause);
                error!("{}", err.message());
                Err(err)
            }
        }
    }

    /// Mark the device permanently failed.
    pub(crate) fn fail<E>(&mut self, err: Mcp4461Error<E>) -> Mcp4461Error<E> {
        let cause = match &err {
            Mcp4461Error::InvalidStatus(_) => FailureCause::InvalidStatus,
            Mcp4461Error::InvalidReading(_) => FailureCause::InvalidReading,
            Mcp4461Error::Failed(cause) => *cause,
            _ => FailureCause::Bus,
        };
        if self.failure.is_none() {
            error!("{}", err.message());
            self.failure = Some(cause);
        }
        err
    }

    #[inline]
    pub(crate) fn bus_fault<E>(&mut self, err: E) -> Mcp4461Error<E> {
        self.fail(Mcp4461Error::I2c(err))
    }

    /// Refuse an operation without touching state, raising the warning flag.
    pub(crate) fn refuse<E>(
        &mut self,
        wiper: Option<Wiper>,
        err: Mcp4461Error<E>,
    ) -> Mcp4461Error<E> {
        match wiper {
            Some(wiper) => warn!("wiper {}: {}", wiper.index(), err.message()),
            None => warn!("{}", err.message()),
        }
        self.warning = true;
        err
    }

    /// Validate a status register reading and mirror WP and WiperLock bits.
    pub(crate) fn apply_status<E>(&mut self, raw: u16) -> Result<StatusRegister, Mcp4461Error<E>> {
        let status = StatusRegister::from_bits(raw);
        if !status.is_valid() {
            return Err(self.fail(Mcp4461Error::InvalidStatus(raw)));
        }
        self.write_protected = status.write_protect();
        for wiper in Wiper::ALL {
            self.channel_mut(wiper).wiper_lock_active = status.wiper_lock(wiper);
        }
        self.observe_eeprom(status.eeprom_write_active());
        Ok(status)
    }

    /// Record an EEWA observation, a finished write cycle releases the sticky timeout.
    pub(crate) fn observe_eeprom(&mut self, writing: bool) {
        if !writing {
            self.eeprom_timed_out = false;
        }
    }

    pub(crate) fn check_readable<E>(&mut self, wiper: Wiper) -> Result<(), Mcp4461Error<E>> {
        self.alive()?;
        if !self.channel(wiper).enabled {
            return Err(self.refuse(Some(wiper), Mcp4461Error::WiperDisabled));
        }
        Ok(())
    }

    fn check_volatile<E>(&mut self, wiper: Wiper) -> Result<(), Mcp4461Error<E>> {
        if !wiper.is_volatile() {
            return Err(self.refuse(Some(wiper), Mcp4461Error::VolatileOnly));
        }
        Ok(())
    }

    pub(crate) fn check_mutable<E>(&mut self, wiper: Wiper) -> Result<(), Mcp4461Error<E>> {
        self.check_readable(wiper)?;
        if self.channel(wiper).wiper_lock_active {
            return Err(self.refuse(Some(wiper), Mcp4461Error::WiperLocked));
        }
        Ok(())
    }

    /// Refuse writes to EEPROM-backed cells while WP is asserted.
    pub(crate) fn check_write_protect<E>(
        &mut self,
        wiper: Option<Wiper>,
    ) -> Result<(), Mcp4461Error<E>> {
        if self.write_protected {
            return Err(self.refuse(wiper, Mcp4461Error::WriteProtected));
        }
        Ok(())
    }

    pub(crate) fn stage_level<E>(
        &mut self,
        wiper: Wiper,
        value: u16,
    ) -> Result<(), Mcp4461Error<E>> {
        self.check_mutable(wiper)?;
        if value > WIPER_MAX {
            return Err(self.refuse(Some(wiper), Mcp4461Error::ValueOutOfRange));
        }
        if !wiper.is_volatile() {
            self.check_write_protect(Some(wiper))?;
        }
        trace!("staging wiper {} level {}", wiper.index(), value);
        self.channel_mut(wiper).state = value;
        self.dirty = true;
        Ok(())
    }

    /// Cached level of a volatile wiper.
    pub(crate) fn cached_level<E>(&mut self, wiper: Wiper) -> Result<u16, Mcp4461Error<E>> {
        self.check_readable(wiper)?;
        Ok(self.channel(wiper).state)
    }

    pub(crate) fn check_step<E>(&mut self, wiper: Wiper) -> Result<(), Mcp4461Error<E>> {
        self.alive()?;
        self.check_volatile(wiper)?;
        self.check_mutable(wiper)
    }

    /// Apply an acknowledged increment or decrement to the cache.
    pub(crate) fn record_step(&mut self, wiper: Wiper, up: bool) {
        let channel = self.channel_mut(wiper);
        channel.state = if up {
            (channel.state + 1).min(WIPER_MAX)
        } else {
            channel.state.saturating_sub(1)
        };
        channel.synced = Some(channel.state);
    }

    pub(crate) fn record_synced(&mut self, wiper: Wiper, value: u16) {
        self.channel_mut(wiper).synced = Some(value);
    }

    /// A wiper register never holds more than full scale, anything above is corrupt.
    pub(crate) fn check_reading<E>(&mut self, value: u16) -> Result<u16, Mcp4461Error<E>> {
        if value > WIPER_MAX {
            return Err(self.fail(Mcp4461Error::InvalidReading(value)));
        }
        Ok(value)
    }

    pub(crate) fn record_read(&mut self, wiper: Wiper, value: u16) {
        let channel = self.channel_mut(wiper);
        channel.state = value;
        channel.synced = Some(value);
    }

    pub(crate) fn stage_connection<E>(
        &mut self,
        wiper: Wiper,
        connect: bool,
    ) -> Result<(), Mcp4461Error<E>> {
        self.alive()?;
        self.check_volatile(wiper)?;
        self.check_mutable(wiper)?;
        let channel = self.channel_mut(wiper);
        if channel.terminal_hw == connect {
            debug!(
                "wiper {} already {}, ignoring",
                wiper.index(),
                if connect { "enabled" } else { "disabled" }
            );
            return Ok(());
        }
        trace!("{} wiper {}", if connect { "enabling" } else { "disabling" }, wiper.index());
        channel.terminal_hw = connect;
        self.dirty = true;
        Ok(())
    }

    pub(crate) fn stage_terminal<E>(
        &mut self,
        wiper: Wiper,
        terminal: char,
        connect: bool,
    ) -> Result<(), Mcp4461Error<E>> {
        self.alive()?;
        self.check_volatile(wiper)?;
        let Ok(id) = Terminal::try_from(terminal) else {
            return Err(self.refuse(Some(wiper), Mcp4461Error::InvalidTerminal(terminal)));
        };
        self.check_mutable(wiper)?;
        trace!(
            "{} terminal {} of wiper {}",
            if connect { "enabling" } else { "disabling" },
            terminal,
            wiper.index()
        );
        *self.channel_mut(wiper).terminal_mut(id) = connect;
        self.dirty = true;
        Ok(())
    }

    /// Disconnect a wiper that was disabled at construction time.
    pub(crate) fn isolate(&mut self, wiper: Wiper) {
        let channel = self.channel_mut(wiper);
        channel.state = 0;
        channel.terminal_hw = false;
        self.dirty = true;
    }

    /// Terminal control byte computed from the cached flags of a wiper pair.
    pub(crate) fn terminal_connector_byte(&self, connector: TerminalConnector) -> TerminalControl {
        let (low, high) = connector.wipers();
        TerminalControl::pack(self.channel(low), self.channel(high))
    }

    /// Spread a terminal control byte onto the cached flags of a wiper pair.
    pub(crate) fn unpack_terminal_byte(
        &mut self,
        connector: TerminalConnector,
        byte: TerminalControl,
    ) {
        let (low, high) = connector.wipers();
        let (head, tail) = self.channels.split_at_mut(high.index());
        byte.unpack(&mut head[low.index()], &mut tail[0]);
    }

    /// Terminal byte to write during reconciliation, if it differs from the device.
    pub(crate) fn pending_terminal(&self, connector: TerminalConnector) -> Option<TerminalControl> {
        let packed = self.terminal_connector_byte(connector);
        if self.tcon_synced[connector.index()] == Some(packed) {
            None
        } else {
            Some(packed)
        }
    }

    pub(crate) fn record_terminal(&mut self, connector: TerminalConnector, byte: TerminalControl) {
        self.tcon_synced[connector.index()] = Some(byte);
    }
}
