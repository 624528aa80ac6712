//! The result taxonomy shared by every driver, parser and stream operation.

/// Outcome of a single library operation.
///
/// `Success` and `Done` are both "no error" outcomes but mean different
/// things to an iterator-style caller: `Done` signals exhaustion (stop
/// asking), `Success` signals "this call completed, there may be more".
#[repr(i32)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Status {
    Success = 0,
    Done = 1,
    Unsupported = -1,
    InvalidArgs = -2,
    NoMemory = -3,
    NoDevice = -4,
    NoAccess = -5,
    Io = -6,
    Timeout = -7,
    Protocol = -8,
    DataFormat = -9,
    Cancelled = -10,
}

impl Status {
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success | Status::Done)
    }
}

impl TryFrom<i32> for Status {
    type Error = String;

    fn try_from(value: i32) -> Result<Status, Self::Error> {
        let result = match value {
            0 => Self::Success,
            1 => Self::Done,
            -1 => Self::Unsupported,
            -2 => Self::InvalidArgs,
            -3 => Self::NoMemory,
            -4 => Self::NoDevice,
            -5 => Self::NoAccess,
            -6 => Self::Io,
            -7 => Self::Timeout,
            -8 => Self::Protocol,
            -9 => Self::DataFormat,
            -10 => Self::Cancelled,
            _ => return Err(format!("invalid status: {value}")),
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_done_are_both_non_error() {
        assert!(Status::Success.is_success());
        assert!(Status::Done.is_success());
        assert!(!Status::Protocol.is_success());
    }

    #[test]
    fn roundtrips_through_i32() {
        for s in [
            Status::Success,
            Status::Done,
            Status::Unsupported,
            Status::InvalidArgs,
            Status::NoMemory,
            Status::NoDevice,
            Status::NoAccess,
            Status::Io,
            Status::Timeout,
            Status::Protocol,
            Status::DataFormat,
            Status::Cancelled,
        ] {
            assert_eq!(Status::try_from(s as i32), Ok(s));
        }
    }
}
