/// Location of a readable/writable memory cell in the MCP4461.
///
/// The address is the upper nibble of the command byte, already shifted into place.
pub trait Addressing {
    /// Memory address, bits AD3:AD0 of the command byte.
    fn address(&self) -> u8;

    /// Whether the cell is backed by EEPROM.
    ///
    /// Writes to EEPROM-backed cells are refused while the device is write
    /// protected, and any access waits for a running EEPROM write cycle.
    fn non_volatile(&self) -> bool {
        false
    }
}
