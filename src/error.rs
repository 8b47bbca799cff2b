use crate::Method;

#[derive(Debug)]
/// The error type for gamemode-client.
///
/// Every failure of a request is reported as a value; the integer façade
/// maps all of them to `-1` and keeps the message around for
/// [`GameMode::last_error`](crate::GameMode::last_error).
pub enum Error {
    /// A zbus specific error.
    Zbus(zbus::Error),
    /// An IO error, typically while creating the portal socket pairs.
    IO(std::io::Error),
    /// Sending the method name over the portal side channel failed.
    SideChannel(nix::Error),
    /// The method call was answered with an error message.
    MethodReply {
        /// The method that was called.
        method: Method,
        /// The interface the call was addressed to.
        interface: &'static str,
        /// The D-Bus error name.
        name: String,
        /// The error description, if the peer provided one.
        message: Option<String>,
    },
    /// The reply didn't carry exactly one 32-bit signed integer.
    MalformedReply(Method, zbus::Error),
    /// The reply carried a code that has no known meaning.
    UnknownCode(i32),
    /// Neither the versioned nor the unversioned library could be opened.
    LibraryNotFound(String),
    /// A required symbol is missing from the loaded library.
    MissingSymbol(String, String),
    /// No implementation is available to handle the request.
    Unavailable,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zbus(e) => write!(f, "zbus error: {e}"),
            Self::IO(e) => write!(f, "IO: {e}"),
            Self::SideChannel(e) => write!(f, "Could not send on the portal side channel: {e}"),
            Self::MethodReply {
                method,
                interface,
                name,
                message,
            } => {
                write!(f, "Could not call method '{method}' on '{interface}': {name}")?;
                if let Some(message) = message {
                    write!(f, ": {message}")?;
                }
                Ok(())
            }
            Self::MalformedReply(method, e) => {
                write!(f, "Could not unmarshal the reply of '{method}': {e}")
            }
            Self::UnknownCode(code) => write!(f, "Unknown result code {code}"),
            Self::LibraryNotFound(e) => write!(f, "Could not load the GameMode library: {e}"),
            Self::MissingSymbol(symbol, e) => write!(f, "failed to load symbol '{symbol}': {e}"),
            Self::Unavailable => f.write_str("GameMode is not available"),
        }
    }
}

impl From<zbus::Error> for Error {
    fn from(e: zbus::Error) -> Self {
        Self::Zbus(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IO(e)
    }
}

impl From<nix::Error> for Error {
    fn from(e: nix::Error) -> Self {
        Self::SideChannel(e)
    }
}
