use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A credential string contained something other than hex digits
    InvalidHex,
    /// A credential string decoded to the wrong number of bytes
    InvalidLength { expected: usize, found: usize },
    /// The MAC command queue has no room left
    QueueFull,
    /// Uplink payload exceeds what a single frame can carry
    PayloadTooLarge,
    /// The position could not be serialized into the uplink buffer
    Encode,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHex => f.write_str("invalid hex digit"),
            Error::InvalidLength { expected, found } => {
                write!(f, "expected {} bytes, found {}", expected, found)
            }
            Error::QueueFull => f.write_str("mac command queue full"),
            Error::PayloadTooLarge => f.write_str("payload too large"),
            Error::Encode => f.write_str("payload encoding failed"),
        }
    }
}

impl From<postcard::Error> for Error {
    fn from(_: postcard::Error) -> Self {
        Error::Encode
    }
}
