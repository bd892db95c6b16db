//! # Errors

use std::fmt::{self, Display, Formatter};

/// `CCode` error type.
#[derive(Debug)]
pub enum Error {
    /// Wrapper around `std::io::Error`
    Io(std::io::Error),
    /// Wrapper around `fmt::Error`, returned when writing to the in-memory draw buffer fails.
    Fmt(fmt::Error),
    /// Too many arguments given on the command line. The attribute is the full argument list.
    TooManyArguments(Vec<String>),
    /// An unrecognized `-`-prefixed option was given on the command line.
    UnrecognizedOption(String),
    /// Error returned when the window size obtained through a system call is invalid.
    InvalidWindowSize,
    /// Error setting or retrieving the cursor position.
    CursorPosition,
}

impl From<std::io::Error> for Error {
    /// Convert an IO Error into a `CCode` Error.
    fn from(err: std::io::Error) -> Self { Self::Io(err) }
}

impl From<fmt::Error> for Error {
    /// Convert a formatting Error into a `CCode` Error.
    fn from(err: fmt::Error) -> Self { Self::Fmt(err) }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Fmt(err) => write!(f, "formatting error: {err}"),
            Self::TooManyArguments(args) => write!(f, "too many arguments: {}", args.join(" ")),
            Self::UnrecognizedOption(opt) => write!(f, "unrecognized option: {opt}"),
            Self::InvalidWindowSize => write!(f, "could not determine the terminal window size"),
            Self::CursorPosition => write!(f, "could not determine the cursor position"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Fmt(err) => Some(err),
            Self::TooManyArguments(_)
            | Self::UnrecognizedOption(_)
            | Self::InvalidWindowSize
            | Self::CursorPosition => None,
        }
    }
}
