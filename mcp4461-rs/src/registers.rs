use crate::{bank::WiperChannel, traits::Addressing};
use bitfield_struct::bitfield;

pub(crate) const VOLATILE_WIPER_ADDR: [u8; 4] = [0x00, 0x10, 0x60, 0x70];
pub(crate) const NON_VOLATILE_OFFSET: u8 = 0x20;
pub(crate) const TCON0_ADDR: u8 = 0x40;
pub(crate) const STATUS_ADDR: u8 = 0x50;
pub(crate) const TCON1_ADDR: u8 = 0xa0;
pub(crate) const EEPROM_BASE_ADDR: u8 = 0xb0;
pub(crate) const EEPROM_STRIDE: u8 = 0x10;

/// Default 7-bit I2C address (A1 = A0 = 0).
pub const DEFAULT_ADDRESS: u8 = 0x2c;
/// Highest tap count of a wiper (257 taps).
pub const WIPER_MAX: u16 = 0x100;
/// Highest value of a general purpose EEPROM cell (9 bits).
pub const EEPROM_MAX: u16 = 0x1ff;

/// Command selector, bits C1:C0 of the command byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Write data to the addressed memory location.
    Write = 0x00,
    /// Increment the addressed volatile wiper by one tap.
    Increment = 0x04,
    /// Decrement the addressed volatile wiper by one tap.
    Decrement = 0x08,
    /// Read data from the addressed memory location.
    Read = 0x0c,
}

/// Build the command byte for a memory address and command.
#[inline]
pub const fn command_byte(address: u8, command: Command) -> u8 {
    address | command as u8
}

/// Split a 9-bit data word into a write command byte (carrying D8) and the data byte.
#[inline]
pub const fn encode_write(address: u8, data: u16) -> [u8; 2] {
    [
        command_byte(address, Command::Write) | ((data >> 8) as u8 & 0x01),
        (data & 0xff) as u8,
    ]
}

/// Memory address of the wiper with the given index.
///
/// Wipers 0-3 are the volatile wiper registers, 4-7 their non-volatile
/// counterparts. Returns `None` for any other index.
pub fn wiper_address(index: u8) -> Option<u8> {
    Wiper::try_from(index).ok().map(|w| w.address())
}

/// One of the eight wiper registers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Wiper {
    /// Volatile wiper of resistor network 0.
    Wiper0 = 0,
    /// Volatile wiper of resistor network 1.
    Wiper1 = 1,
    /// Volatile wiper of resistor network 2.
    Wiper2 = 2,
    /// Volatile wiper of resistor network 3.
    Wiper3 = 3,
    /// Non-volatile wiper of resistor network 0.
    Wiper4 = 4,
    /// Non-volatile wiper of resistor network 1.
    Wiper5 = 5,
    /// Non-volatile wiper of resistor network 2.
    Wiper6 = 6,
    /// Non-volatile wiper of resistor network 3.
    Wiper7 = 7,
}

impl Wiper {
    /// All wipers in index order.
    pub const ALL: [Wiper; 8] = [
        Wiper::Wiper0,
        Wiper::Wiper1,
        Wiper::Wiper2,
        Wiper::Wiper3,
        Wiper::Wiper4,
        Wiper::Wiper5,
        Wiper::Wiper6,
        Wiper::Wiper7,
    ];

    /// Index of the wiper, 0-7.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether this is one of the volatile wipers 0-3.
    #[inline]
    pub const fn is_volatile(self) -> bool {
        (self as u8) < 4
    }

    /// Resistor network (0-3) this wiper belongs to.
    #[inline]
    pub const fn network(self) -> u8 {
        self as u8 & 0x03
    }

    /// The EEPROM-backed wiper shadowing this volatile wiper.
    pub fn shadow(self) -> Option<Wiper> {
        if self.is_volatile() {
            Wiper::try_from(self as u8 + 4).ok()
        } else {
            None
        }
    }

    /// The terminal control register holding this wiper's terminal bits.
    pub fn connector(self) -> Option<TerminalConnector> {
        match self {
            Wiper::Wiper0 | Wiper::Wiper1 => Some(TerminalConnector::Tcon0),
            Wiper::Wiper2 | Wiper::Wiper3 => Some(TerminalConnector::Tcon1),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Wiper {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Wiper::ALL
            .get(value as usize)
            .copied()
            .ok_or("Invalid wiper index")
    }
}

impl Addressing for Wiper {
    fn address(&self) -> u8 {
        let base = VOLATILE_WIPER_ADDR[self.network() as usize];
        if self.is_volatile() {
            base
        } else {
            base + NON_VOLATILE_OFFSET
        }
    }

    fn non_volatile(&self) -> bool {
        !self.is_volatile()
    }
}

/// Terminal control register, each covering a pair of volatile wipers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalConnector {
    /// TCON0, resistor networks 0 and 1.
    Tcon0 = 0,
    /// TCON1, resistor networks 2 and 3.
    Tcon1 = 1,
}

impl TerminalConnector {
    /// Both terminal control registers.
    pub const ALL: [TerminalConnector; 2] = [TerminalConnector::Tcon0, TerminalConnector::Tcon1];

    /// The (low, high) wiper pair stored in this register.
    pub const fn wipers(self) -> (Wiper, Wiper) {
        match self {
            TerminalConnector::Tcon0 => (Wiper::Wiper0, Wiper::Wiper1),
            TerminalConnector::Tcon1 => (Wiper::Wiper2, Wiper::Wiper3),
        }
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for TerminalConnector {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TerminalConnector::Tcon0),
            1 => Ok(TerminalConnector::Tcon1),
            _ => Err("Invalid terminal connector"),
        }
    }
}

impl Addressing for TerminalConnector {
    fn address(&self) -> u8 {
        match self {
            TerminalConnector::Tcon0 => TCON0_ADDR,
            TerminalConnector::Tcon1 => TCON1_ADDR,
        }
    }
}

/// General purpose EEPROM cell.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromLocation {
    /// EEPROM cell at 0x0B.
    Eeprom0 = 0,
    /// EEPROM cell at 0x0C.
    Eeprom1 = 1,
    /// EEPROM cell at 0x0D.
    Eeprom2 = 2,
    /// EEPROM cell at 0x0E.
    Eeprom3 = 3,
    /// EEPROM cell at 0x0F.
    Eeprom4 = 4,
}

impl TryFrom<u8> for EepromLocation {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use EepromLocation::*;
        match value {
            0 => Ok(Eeprom0),
            1 => Ok(Eeprom1),
            2 => Ok(Eeprom2),
            3 => Ok(Eeprom3),
            4 => Ok(Eeprom4),
            _ => Err("Invalid EEPROM location"),
        }
    }
}

impl Addressing for EepromLocation {
    fn address(&self) -> u8 {
        EEPROM_BASE_ADDR + (*self as u8) * EEPROM_STRIDE
    }

    fn non_volatile(&self) -> bool {
        true
    }
}

/// Terminal of a resistor network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Terminal A.
    A,
    /// Terminal B.
    B,
    /// Wiper terminal W.
    W,
    /// Hardware configuration bit, disconnects the whole network when cleared.
    Hw,
}

impl TryFrom<char> for Terminal {
    type Error = &'static str;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            'a' => Ok(Terminal::A),
            'b' => Ok(Terminal::B),
            'w' => Ok(Terminal::W),
            'h' => Ok(Terminal::Hw),
            _ => Err("Invalid terminal"),
        }
    }
}

/// Status register of the MCP4461.
///
/// Reads `0x182` when no WiperLock or write protection is active and no
/// EEPROM write cycle is running. R1, D7 and D8 are hard-wired to 1; any
/// other reading of them points at a communication fault.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct StatusRegister {
    /// WP: the write protect pin is asserted, non-volatile memory is read only.
    pub write_protect: bool,
    pub(crate) reserved_r1: bool,
    /// WL0: resistor network 0 is locked.
    pub wiper_lock_0: bool,
    /// WL1: resistor network 1 is locked.
    pub wiper_lock_1: bool,
    /// EEWA: an EEPROM write cycle is active.
    pub eeprom_write_active: bool,
    /// WL2: resistor network 2 is locked.
    pub wiper_lock_2: bool,
    /// WL3: resistor network 3 is locked.
    pub wiper_lock_3: bool,
    pub(crate) d7: bool,
    pub(crate) d8: bool,
    #[bits(7)]
    __: u8,
}

impl StatusRegister {
    /// Whether the hard-wired bits read back as expected.
    pub fn is_valid(&self) -> bool {
        self.reserved_r1() && self.d7() && self.d8() && self.into_bits() >> 9 == 0
    }

    /// WiperLock state of the resistor network a wiper belongs to.
    pub fn wiper_lock(&self, wiper: Wiper) -> bool {
        match wiper.network() {
            0 => self.wiper_lock_0(),
            1 => self.wiper_lock_1(),
            2 => self.wiper_lock_2(),
            _ => self.wiper_lock_3(),
        }
    }
}

/// Terminal control register image for one pair of resistor networks.
///
/// The low nibble belongs to the even network, the high nibble to the odd one.
/// A set bit connects the terminal. Power-on default is `0xff`.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct TerminalControl {
    /// R0B / R2B
    pub low_b: bool,
    /// R0W / R2W
    pub low_w: bool,
    /// R0A / R2A
    pub low_a: bool,
    /// R0HW / R2HW
    pub low_hw: bool,
    /// R1B / R3B
    pub high_b: bool,
    /// R1W / R3W
    pub high_w: bool,
    /// R1A / R3A
    pub high_a: bool,
    /// R1HW / R3HW
    pub high_hw: bool,
}

impl TerminalControl {
    /// Register value after power-on: every terminal connected.
    pub const POWER_ON: Self = Self::from_bits(0xff);

    /// Pack the terminal flags of a wiper pair.
    pub(crate) fn pack(low: &WiperChannel, high: &WiperChannel) -> Self {
        Self::from_bits(0)
            .with_low_b(low.terminal_b)
            .with_low_w(low.terminal_w)
            .with_low_a(low.terminal_a)
            .with_low_hw(low.terminal_hw)
            .with_high_b(high.terminal_b)
            .with_high_w(high.terminal_w)
            .with_high_a(high.terminal_a)
            .with_high_hw(high.terminal_hw)
    }

    /// Spread the register bits back onto a wiper pair.
    pub(crate) fn unpack(self, low: &mut WiperChannel, high: &mut WiperChannel) {
        low.terminal_b = self.low_b();
        low.terminal_w = self.low_w();
        low.terminal_a = self.low_a();
        low.terminal_hw = self.low_hw();
        high.terminal_b = self.high_b();
        high.terminal_w = self.high_w();
        high.terminal_a = self.high_a();
        high.terminal_hw = self.high_hw();
    }
}
