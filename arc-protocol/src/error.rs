use std::{error::Error, fmt::Display, time::Duration};

/// The operation and source line that raised an error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Location {
    pub operation: &'static str,
    pub line: u32,
}

impl Location {
    pub const fn new(operation: &'static str, line: u32) -> Location {
        Location { operation, line }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Trace: ( {}() line: {} )", self.operation, self.line)
    }
}

/// Captures a [`Location`] for the named operation at the current line.
///
/// ```
/// use arc_protocol::location;
///
/// let loc = location!("read_bar");
/// assert_eq!(loc.operation, "read_bar");
/// ```
#[macro_export]
macro_rules! location {
    ($operation:expr) => {
        $crate::error::Location::new($operation, line!())
    };
}

/// Errors raised by the command codec, the register decoder and the device driver.
///
/// Every variant carries the [`Location`] it originated from, which is appended
/// to the rendered message.
#[derive(Debug, Clone, PartialEq)]
pub enum ArcError {
    /// A malformed argument, such as a mnemonic with illegal characters.
    InvalidArgument {
        location: Location,
        message: String,
    },
    /// An index beyond the current snapshot. Valid indices are `0..count`.
    OutOfRange {
        location: Location,
        index: usize,
        count: usize,
    },
    Runtime {
        location: Location,
        message: String,
    },
    /// A device level operation failed. The OS layer only reports success or failure,
    /// so the message is all there is.
    Device {
        location: Location,
        message: String,
    },
    /// Waiting for a status change took longer than allowed.
    Timeout {
        location: Location,
        elapsed: Duration,
        status: u32,
    },
}

impl ArcError {
    pub fn invalid_argument(location: Location, message: impl Into<String>) -> ArcError {
        ArcError::InvalidArgument {
            location,
            message: message.into(),
        }
    }

    pub fn out_of_range(location: Location, index: usize, count: usize) -> ArcError {
        ArcError::OutOfRange {
            location,
            index,
            count,
        }
    }

    pub fn runtime(location: Location, message: impl Into<String>) -> ArcError {
        ArcError::Runtime {
            location,
            message: message.into(),
        }
    }

    pub fn device(location: Location, message: impl Into<String>) -> ArcError {
        ArcError::Device {
            location,
            message: message.into(),
        }
    }

    /// Where the error was raised
    pub fn location(&self) -> Location {
        match self {
            ArcError::InvalidArgument { location, .. }
            | ArcError::OutOfRange { location, .. }
            | ArcError::Runtime { location, .. }
            | ArcError::Device { location, .. }
            | ArcError::Timeout { location, .. } => *location,
        }
    }
}

impl Display for ArcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArcError::InvalidArgument { message, .. } => {
                write!(f, "Invalid argument: {}", message)?
            }
            ArcError::OutOfRange { index, count, .. } => {
                write!(f, "Element [ {} ] out of range [ 0 - {} )", index, count)?
            }
            ArcError::Runtime { message, .. } => write!(f, "{}", message)?,
            ArcError::Device { message, .. } => write!(f, "{}", message)?,
            ArcError::Timeout {
                elapsed, status, ..
            } => write!(
                f,
                "Time Out [ {:.3} sec ] while waiting for status [ 0x{:X} ]!",
                elapsed.as_secs_f64(),
                status
            )?,
        }
        write!(f, "\n{}", self.location())
    }
}

impl Error for ArcError {}

pub type Result<T> = std::result::Result<T, ArcError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn out_of_range_message_cites_valid_range() {
        let err = ArcError::out_of_range(Location::new("cfg_addr", 42), 16, 16);
        assert_eq!(
            err.to_string(),
            "Element [ 16 ] out of range [ 0 - 16 )\nTrace: ( cfg_addr() line: 42 )"
        );
    }

    #[test]
    fn location_macro_captures_line() {
        let loc = location!("encode_command");
        assert_eq!(loc.operation, "encode_command");
        assert_eq!(loc.line, line!() - 2);
    }

    #[test]
    fn timeout_message() {
        let err = ArcError::Timeout {
            location: Location::new("read_reply", 1),
            elapsed: Duration::from_millis(1500),
            status: 0x1,
        };
        assert!(
            err.to_string()
                .starts_with("Time Out [ 1.500 sec ] while waiting for status [ 0x1 ]!")
        );
    }
}
