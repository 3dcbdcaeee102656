use crate::OutputResult;

/// Trait for actuators driven by a normalized float level.
///
/// A level of [`LEVEL_MIN`](crate::LEVEL_MIN) is fully off and
/// [`LEVEL_MAX`](crate::LEVEL_MAX) is fully on. How the level maps onto the
/// hardware (taps, steps, duty cycle) is up to the implementation.
pub trait FloatOutput {
    /// The error type of the device driving this output.
    type Error;

    /// Drive the output to the given level.
    ///
    /// # Arguments
    /// * `level` - Normalized level. Implementations clamp values outside
    ///   `[0.0, 1.0]` and reject `NaN` with
    ///   [`OutputError::InvalidLevel`](crate::OutputError::InvalidLevel).
    ///
    /// # Errors
    /// This method returns an error if the device refuses or fails the write.
    fn write_level(&mut self, level: f32) -> OutputResult<(), Self::Error>;

    /// Read the level the output is currently set to.
    ///
    /// # Errors
    /// Returns [`OutputError::Unsupported`](crate::OutputError::Unsupported)
    /// for outputs that cannot report their level.
    fn read_level(&mut self) -> OutputResult<f32, Self::Error> {
        Err(crate::OutputError::Unsupported)
    }
}
