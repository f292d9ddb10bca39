use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Rejected while building scheme options, never reaches request handling.
    Configuration(String),
    /// A challenge was requested over a plain-text connection without opt-in.
    InsecureTransport { scheme: String },
    /// A validator faulted and the failure hook did not fail the request.
    Fault { scheme: String, message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Configuration(msg) => write!(f, "Authentication configuration error: {msg}"),
            Error::InsecureTransport { scheme } => write!(
                f,
                "Scheme '{scheme}' refuses to challenge over an insecure transport"
            ),
            Error::Fault { scheme, message } => {
                write!(f, "Scheme '{scheme}' validation fault: {message}")
            }
        }
    }
}

impl std::error::Error for Error {}
