#![no_std]
#![deny(missing_docs)]

/*! # MCP4461
 *
 * Driver for the Microchip MCP4461 quad 8-bit digital potentiometer with
 * EEPROM-backed wipers, over I2C.
 *
 * Volatile wiper levels and terminal connections are cached and staged;
 * [Mcp4461::poll] pushes whatever changed since the last pass. Non-volatile
 * wipers and the general purpose EEPROM are accessed directly, after waiting
 * out any running EEPROM write cycle. A bus fault or a malformed status
 * register disables the driver for good.
 *
 * Each wiper can be handed out as a [FloatOutput] through [Mcp4461Wiper].
 */

pub use embedded_float_output::{FloatOutput, OutputError, OutputResult};
mod bank;
mod driver;
mod driver_async;
mod error;
mod registers;
mod traits;
mod wiper;

pub use bank::WiperChannel;
pub use driver::{EEPROM_WRITE_TIMEOUT_MS, Mcp4461, Mcp4461Builder};
pub use driver_async::Mcp4461Async;
pub use error::{FailureCause, Mcp4461Error};
pub use registers::{
    Command, DEFAULT_ADDRESS, EEPROM_MAX, EepromLocation, StatusRegister, Terminal,
    TerminalConnector, TerminalControl, WIPER_MAX, Wiper, command_byte, encode_write,
    wiper_address,
};
pub use traits::Addressing;
pub use wiper::Mcp4461Wiper;

/// Results of MCP4461-specific function calls.
pub type Mcp4461Result<T, E> = Result<T, Mcp4461Error<E>>;
