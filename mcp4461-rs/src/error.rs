/// Reason the device was marked as permanently failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// A bus transaction was not acknowledged or otherwise failed.
    Bus,
    /// The status register read back with its hard-wired bits cleared.
    InvalidStatus,
    /// A wiper register read back above full scale.
    InvalidReading,
}

#[derive(Debug, PartialEq)]
/// MCP4461 errors
pub enum Mcp4461Error<E> {
    /// I2C bus errors. The device is marked failed when this is returned.
    I2c(E),
    /// Status register read with R1, D7 or D8 not set. The device is marked failed.
    InvalidStatus(u16),
    /// Wiper register read above 256. The device is marked failed.
    InvalidReading(u16),
    /// The device failed earlier; no further bus traffic is issued.
    Failed(FailureCause),
    /// The wiper was disabled at construction time.
    WiperDisabled,
    /// The resistor network is frozen by WiperLock.
    WiperLocked,
    /// The WP pin is asserted, non-volatile memory cannot be written.
    WriteProtected,
    /// Wiper value above 256 or EEPROM value above 511.
    ValueOutOfRange,
    /// The operation only applies to the volatile wipers 0-3.
    VolatileOnly,
    /// Terminal identifier other than `a`, `b`, `w` or `h`.
    InvalidTerminal(char),
    /// An EEPROM write cycle is still active.
    EepromBusy,
}

impl<E> Mcp4461Error<E> {
    /// Whether this error left the device in the failed state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::I2c(_) | Self::InvalidStatus(_) | Self::InvalidReading(_) | Self::Failed(_)
        )
    }

    pub(crate) fn message(&self) -> &'static str {
        match self {
            Self::I2c(_) => "I2C error, communication with MCP4461 failed",
            Self::InvalidStatus(_) => "invalid status register value, bits R1, D7 or D8 are 0",
            Self::InvalidReading(_) => "wiper register read above full scale",
            Self::Failed(FailureCause::Bus) => "device failed after an I2C error",
            Self::Failed(FailureCause::InvalidStatus) => {
                "device failed after an invalid status register read"
            }
            Self::Failed(FailureCause::InvalidReading) => {
                "device failed after an out of range wiper read"
            }
            Self::WiperDisabled => "wiper is disabled, all actions on this wiper are prohibited",
            Self::WiperLocked => {
                "wiper is locked using WiperLock, all actions on this wiper are prohibited"
            }
            Self::WriteProtected => {
                "device is write protected, non-volatile wipers and EEPROM cannot be set"
            }
            Self::ValueOutOfRange => "value out of range",
            Self::VolatileOnly => "operation only applies to volatile wipers 0-3",
            Self::InvalidTerminal(_) => "unknown terminal, expected one of a, b, w, h",
            Self::EepromBusy => "EEPROM write cycle still active",
        }
    }
}
