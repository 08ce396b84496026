//! Response definitions
//!
//! Represents responses to clients. On the wire a response is its
//! [`Display`](std::fmt::Display) text.

use std::fmt;

use crate::error::TideError;

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Value of a GET
    Value(String),

    /// Write or transaction control succeeded
    Ok,

    /// GET found nothing
    Nil,

    /// Failure reason
    Error(String),
}

impl Response {
    /// Create an ERROR response from an error
    pub fn error(err: &TideError) -> Self {
        Response::Error(err.to_string())
    }

    /// Parse response text received from a server
    pub fn parse(text: &str) -> Self {
        match text {
            "OK" => Response::Ok,
            "NIL" => Response::Nil,
            _ => match text
                .strip_prefix("ERROR(")
                .and_then(|rest| rest.strip_suffix(')'))
            {
                Some(reason) => Response::Error(reason.to_string()),
                None => Response::Value(text.to_string()),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

impl From<Option<String>> for Response {
    fn from(value: Option<String>) -> Self {
        value.map_or(Response::Nil, Response::Value)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Value(value) => f.write_str(value),
            Response::Ok => f.write_str("OK"),
            Response::Nil => f.write_str("NIL"),
            Response::Error(reason) => write!(f, "ERROR({})", reason),
        }
    }
}
