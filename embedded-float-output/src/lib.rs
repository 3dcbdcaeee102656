#![no_std]
#![deny(missing_docs)]
//! # embedded-float-output
//! A no-std definition of a float-valued actuator sink.
//!
//! The [FloatOutput] trait is the single capability shared by otherwise unrelated
//! output peripherals (dimmers, digital potentiometers, DACs): accept a normalized
//! level in `[0.0, 1.0]` and, where the hardware allows it, report the level back.
//!
//! The crate also provides helpers to quantize a normalized level onto an integer
//! tap/step range and back, see [level_to_taps] and [taps_to_level].

mod error;
mod traits;
mod utils;
pub use error::OutputError;
pub use traits::FloatOutput;
pub use utils::{level_to_taps, taps_to_level};

/// Result type for float output operations.
pub type OutputResult<T, E> = Result<T, OutputError<E>>;

/// Lowest accepted normalized level.
pub const LEVEL_MIN: f32 = 0.0;

/// Highest accepted normalized level.
pub const LEVEL_MAX: f32 = 1.0;
