/// Trait for the byte link to the instrument's admin port.
/// Implement this trait for different backends (serial port, test doubles, etc.)
pub trait InstrumentTransport {
    /// Error type for transport operations
    type Error: std::fmt::Debug;

    /// Write data to the transport, returning how many bytes were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read data with a timeout in milliseconds.
    ///
    /// Returns `Ok(0)` when the timeout elapsed without any byte arriving.
    /// `Err` is reserved for real link failures.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Clear the input buffer
    fn clear_input(&mut self) -> Result<(), Self::Error>;
}
