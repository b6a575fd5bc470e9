use std::fmt;

use failure::Backtrace;
use failure::Context;
use failure::Fail;

/// Error information returned by this crate in case of errors.
#[derive(Debug)]
pub struct Error(Context<ErrorKind>);

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.0.get_context().clone()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error(Context::new(kind))
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Error {
        Error(inner)
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.0.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.0.backtrace()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Exhaustive list of possible errors emitted by this crate.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "connection to the zookeeper ensemble failed")]
    BackendConnect,

    #[fail(display = "{} failed due to a zookeeper error", _0)]
    Backend(&'static str),

    #[fail(display = "failed to decode {}", _0)]
    Decode(&'static str),

    #[fail(display = "failed to encode {}", _0)]
    Encode(&'static str),

    #[fail(display = "configuration is invalid: {}", _0)]
    ConfigInvalid(String),

    #[fail(display = "unable to read configuration file '{}'", _0)]
    ConfigLoad(String),

    #[fail(display = "route is missing a mandatory field: {}", _0)]
    InvalidRoute(&'static str),

    #[fail(display = "failed to write BGP command to stdout")]
    EmitterWrite,

    #[fail(display = "unable to spawn new thread for '{}'", _0)]
    SpawnThread(&'static str),

    #[fail(display = "unable to register signal handler")]
    SignalInit,
}

/// Short form alias for functions returning `Error`s.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Render a `Fail`'s causal chain onto one human-readable, multi-line string.
///
/// Mirrors the convenience the teacher crate gets from `replicante_util_failure::format_fail`,
/// whose source is not vendored in this workspace.
pub fn format_fail(fail: &dyn Fail) -> String {
    let mut message = format!("Error: {}", fail);
    let mut cause = fail.cause();
    while let Some(error) = cause {
        message.push_str(&format!("\nCaused by: {}", error));
        cause = error.cause();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::ErrorKind;
    use failure::Fail;

    #[test]
    fn display_invalid_route() {
        let kind = ErrorKind::InvalidRoute("metric");
        assert_eq!(format!("{}", kind), "route is missing a mandatory field: metric");
    }

    #[test]
    fn format_fail_no_cause() {
        let kind = ErrorKind::BackendConnect;
        let rendered = super::format_fail(&kind);
        assert_eq!(rendered, "Error: connection to the zookeeper ensemble failed");
    }
}
