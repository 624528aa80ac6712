//! Error types for the divecomputer crate.

use std::fmt;

use crate::status::Status;

/// The main error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum LibError {
    /// A status failure, optionally annotated with where it happened.
    #[error("{1:?}: {0:?}")]
    Status(Status, Option<String>),

    /// Invalid arguments provided by the caller.
    #[error("invalid argument: {0}")]
    InvalidArguments(String),

    /// The device responded in a way the driver doesn't know how to handle.
    #[error("device error: {0}")]
    DeviceError(String),

    /// A dive record could not be decoded.
    #[error("parse error: {0}")]
    ParseError(String),

    /// I/O error bubbled up from an [`IoStream`](crate::iostream::IoStream).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Integer parsing error, surfaced while decoding a textual field.
    #[error("parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// The descriptor's declared transports don't include the one used.
    #[error("unsupported transport for this device")]
    UnsupportedTransport,

    /// UTF-8 conversion error.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),

    /// Datetime construction/conversion error.
    #[error(transparent)]
    Jiff(#[from] jiff::Error),

    /// Generic error with message, used sparingly for conditions that don't
    /// fit an existing variant.
    #[error("unknown error: {0}")]
    Other(String),

    #[error("cancelled")]
    Cancelled,
}

impl LibError {
    pub fn status<T>(rc: T) -> Self
    where
        T: TryInto<Status>,
        <T as TryInto<Status>>::Error: fmt::Debug,
    {
        Self::Status(rc.try_into().unwrap(), None)
    }

    pub fn status_with_context<T>(rc: T, context: impl ToString) -> Self
    where
        T: TryInto<Status>,
        <T as TryInto<Status>>::Error: fmt::Debug,
    {
        Self::Status(rc.try_into().unwrap(), Some(context.to_string()))
    }
}

impl From<Status> for LibError {
    fn from(status: Status) -> Self {
        Self::Status(status, None)
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, LibError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_conversion() {
        let error = LibError::from(Status::NoDevice);
        match error {
            LibError::Status(Status::NoDevice, None) => {}
            _ => panic!("expected Status error"),
        }
    }

    #[test]
    fn io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let error = LibError::from(io_error);
        match error {
            LibError::Io(_) => {}
            _ => panic!("expected Io error"),
        }
    }

    #[test]
    fn display_is_message_only_for_device_error() {
        let error = LibError::DeviceError("no ack".to_string());
        assert_eq!(error.to_string(), "device error: no ack");
    }
}
