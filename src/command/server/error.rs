use std::fmt;

use hyper::StatusCode;
use serde_json::json;
use tracing::debug;

use crate::authentication;

#[derive(Debug, PartialEq)]
pub enum Error {
    Initialization(String),
    Execution(String),
    NotFound(String),
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Initialization(err) | Error::Execution(err) => write!(f, "{err}"),
            Error::NotFound(err) => write!(f, "Not Found: {err}"),
            Error::Internal(err) => write!(f, "Internal Server Error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<authentication::Error> for Error {
    fn from(error: authentication::Error) -> Self {
        debug!("Authentication error: {error}");
        match error {
            authentication::Error::Configuration(msg) => Error::Initialization(msg),
            error @ (authentication::Error::InsecureTransport { .. }
            | authentication::Error::Fault { .. }) => Error::Internal(error.to_string()),
        }
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Initialization(_) | Error::Execution(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn as_json(&self, request_id: Option<&String>) -> serde_json::Value {
        let (code, message) = match self {
            Error::NotFound(msg) => ("NOT_FOUND", msg.as_str()),
            Error::Initialization(msg) | Error::Execution(msg) | Error::Internal(msg) => {
                ("INTERNAL_SERVER_ERROR", msg.as_str())
            }
        };

        if let Some(request_id) = request_id {
            json!({
                "errors": [{
                    "code": code,
                    "message": message,
                    "detail": { "request_id": request_id }
                }]
            })
        } else {
            json!({
                "errors": [{
                    "code": code,
                    "message": message,
                }]
            })
        }
    }
}
