// Copyright 2019 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error and result implementations.

use std::fmt;

use http::header::{InvalidHeaderName, InvalidHeaderValue};
use http::StatusCode;

/// Kind of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Authentication failed.
    ///
    /// Either the credential renewal call failed or a request was still rejected with
    /// 401 after a successful renewal.
    AuthenticationFailed,

    /// Transport-level failure: connection refused, reset, TLS error, etc.
    Network,

    /// The request did not complete before its deadline.
    Timeout,

    /// The response status code is not one of the expected codes.
    UnexpectedStatus,

    /// Malformed JSON or JSON that does not match the requested structure.
    Decode,

    /// Malformed or cyclic continuation link or marker.
    Pagination,

    /// Invalid client configuration.
    InvalidConfig,

    /// Invalid value passed to one of the calls.
    InvalidInput,

    /// A response from a service violates the protocol.
    InvalidResponse,

    /// The requested endpoint is not present in the service catalog.
    EndpointNotFound,
}

/// Error from an OpenStack call.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: Option<StatusCode>,
    body: Option<String>,
    expected: Vec<StatusCode>,
}

impl ErrorKind {
    /// Short description of the error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::AuthenticationFailed => "Failed to authenticate",
            ErrorKind::Network => "Network error",
            ErrorKind::Timeout => "Request timed out",
            ErrorKind::UnexpectedStatus => "Unexpected HTTP status",
            ErrorKind::Decode => "Failed to decode a response",
            ErrorKind::Pagination => "Pagination error",
            ErrorKind::InvalidConfig => "Invalid configuration",
            ErrorKind::InvalidInput => "Input value(s) are invalid or missing",
            ErrorKind::InvalidResponse => "Invalid response received",
            ErrorKind::EndpointNotFound => "Requested endpoint was not found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl Error {
    /// Create a new error of the provided kind.
    #[inline]
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Error {
        Error {
            kind,
            message: message.into(),
            status: None,
            body: None,
            expected: Vec::new(),
        }
    }

    /// Create an error for a response with an unexpected status code.
    ///
    /// The message is extracted from the OpenStack error body when possible, the raw body
    /// is kept verbatim for diagnostics.
    pub fn unexpected_status<S: Into<String>>(
        status: StatusCode,
        message: S,
        body: String,
        expected: Vec<StatusCode>,
    ) -> Error {
        Error {
            kind: ErrorKind::UnexpectedStatus,
            message: message.into(),
            status: Some(status),
            body: Some(body),
            expected,
        }
    }

    /// Error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status code (if present).
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Raw body of the failed response (if present).
    #[inline]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Status codes that would have been accepted (empty means any 2xx).
    #[inline]
    pub fn expected(&self) -> &[StatusCode] {
        &self.expected
    }

    /// Whether the error was caused by a 404 response.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.status == Some(StatusCode::NOT_FOUND)
    }

    /// Add an HTTP status code to the error.
    #[inline]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Convert into an error of another kind, prefixing the message.
    ///
    /// The status code and the body are preserved.
    pub(crate) fn wrap<S: AsRef<str>>(self, kind: ErrorKind, prefix: S) -> Error {
        Error {
            kind,
            message: format!("{}: {}", prefix.as_ref(), self.message),
            ..self
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl ::std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Error {
        let kind = if value.is_timeout() {
            ErrorKind::Timeout
        } else if value.is_decode() {
            ErrorKind::Decode
        } else if value.is_builder() {
            ErrorKind::InvalidInput
        } else {
            ErrorKind::Network
        };

        let error = Error::new(kind, value.to_string());
        match value.status() {
            Some(status) => error.with_status(status),
            None => error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Error {
        Error::new(ErrorKind::Decode, value.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Error {
        Error::new(ErrorKind::InvalidInput, format!("Invalid URL: {}", value))
    }
}

impl From<InvalidHeaderValue> for Error {
    fn from(value: InvalidHeaderValue) -> Error {
        Error::new(ErrorKind::InvalidInput, value.to_string())
    }
}

impl From<InvalidHeaderName> for Error {
    fn from(value: InvalidHeaderName) -> Error {
        Error::new(ErrorKind::InvalidInput, value.to_string())
    }
}

#[cfg(test)]
pub mod test {
    use http::StatusCode;

    use super::{Error, ErrorKind};

    #[test]
    fn test_display() {
        let err = Error::new(ErrorKind::Pagination, "cycle detected");
        assert_eq!(err.to_string(), "Pagination error: cycle detected");
    }

    #[test]
    fn test_unexpected_status() {
        let err = Error::unexpected_status(
            StatusCode::NOT_FOUND,
            "Server abcd could not be found",
            "{\"itemNotFound\": {}}".to_string(),
            vec![StatusCode::OK],
        );
        assert_eq!(err.kind(), ErrorKind::UnexpectedStatus);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.body(), Some("{\"itemNotFound\": {}}"));
        assert_eq!(err.expected(), &[StatusCode::OK]);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_wrap_keeps_status() {
        let err = Error::new(ErrorKind::UnexpectedStatus, "denied")
            .with_status(StatusCode::UNAUTHORIZED)
            .wrap(ErrorKind::AuthenticationFailed, "Unable to re-authenticate");
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(err.message(), "Unable to re-authenticate: denied");
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{\"a\":").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
