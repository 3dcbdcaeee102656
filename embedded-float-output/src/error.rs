/// Float output error type.
#[derive(Debug, PartialEq)]
pub enum OutputError<E> {
    /// Encapsulates the error type from the underlying device driver.
    Other(E),
    /// The requested level is not a number.
    InvalidLevel,
    /// The operation is not supported by this output, such as reading back a write-only sink.
    Unsupported,
}

impl<E> From<E> for OutputError<E> {
    fn from(other: E) -> Self {
        Self::Other(other)
    }
}
