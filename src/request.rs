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

//! Request options and raw responses.

use std::collections::HashMap;
use std::time::Duration;

use log::trace;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{extract, Error};

/// Body of a request.
#[derive(Debug, Clone)]
pub(crate) enum RequestBody {
    Json(Value),
    Raw { data: Vec<u8>, content_type: String },
}

/// A typed request body that is sent wrapped into an envelope.
///
/// ```rust
/// use osclient::request::ToRequestBody;
///
/// #[derive(serde::Serialize)]
/// struct NewQueue {
///     name: String,
/// }
///
/// impl ToRequestBody for NewQueue {
///     const ENVELOPE_KEY: &'static str = "queue";
/// }
/// ```
pub trait ToRequestBody: Serialize {
    /// Key to wrap the body into, an empty string sends the body as it is.
    const ENVELOPE_KEY: &'static str;
}

/// Options of a single request.
///
/// Options are cloned for every attempt, so they must not contain anything that can only be
/// sent once. By default any 2xx status is accepted, the client's default timeout is used and
/// the request is retried once after re-authentication.
///
/// ```rust
/// use osclient::RequestOpts;
/// use reqwest::StatusCode;
///
/// # fn example() -> Result<(), osclient::Error> {
/// let opts = RequestOpts::new()
///     .enveloped("server", &serde_json::json!({"name": "web"}))?
///     .with_ok_codes(vec![StatusCode::ACCEPTED]);
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct RequestOpts {
    ok_codes: Vec<StatusCode>,
    headers: HeaderMap,
    body: Option<RequestBody>,
    timeout: Option<Duration>,
    reauthenticate: bool,
}

impl Default for RequestOpts {
    fn default() -> RequestOpts {
        RequestOpts {
            ok_codes: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            reauthenticate: true,
        }
    }
}

impl RequestOpts {
    /// Default options.
    #[inline]
    pub fn new() -> RequestOpts {
        RequestOpts::default()
    }

    /// Send a JSON body.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<RequestOpts, Error> {
        self.enveloped("", body)
    }

    /// Send a JSON body wrapped into an envelope `{key: body}`.
    pub fn enveloped<T: Serialize + ?Sized>(
        mut self,
        key: &str,
        body: &T,
    ) -> Result<RequestOpts, Error> {
        self.body = Some(RequestBody::Json(extract::envelope(key, body)?));
        Ok(self)
    }

    /// Send a typed body using its envelope key.
    #[inline]
    pub fn with_body<T: ToRequestBody>(self, body: &T) -> Result<RequestOpts, Error> {
        self.enveloped(T::ENVELOPE_KEY, body)
    }

    /// Send a raw body with the provided content type.
    pub fn with_raw_body<S: Into<String>>(mut self, data: Vec<u8>, content_type: S) -> Self {
        self.body = Some(RequestBody::Raw {
            data,
            content_type: content_type.into(),
        });
        self
    }

    /// Status codes to accept (an empty list means any 2xx).
    pub fn with_ok_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = StatusCode>,
    {
        self.ok_codes = codes.into_iter().collect();
        self
    }

    /// Add a header. Headers set here override the default ones.
    #[inline]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        let _ = self.headers.insert(name, value);
        self
    }

    /// Add several headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            let _ = self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Deadline for the whole call, including token renewal and the retry after 401.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Do not re-authenticate on 401 (the status is handled as any other).
    #[inline]
    pub fn without_reauthentication(mut self) -> Self {
        self.reauthenticate = false;
        self
    }

    /// Accepted status codes.
    #[inline]
    pub fn ok_codes(&self) -> &[StatusCode] {
        &self.ok_codes
    }

    /// Extra headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Deadline for the whole call.
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether re-authentication on 401 is allowed.
    #[inline]
    pub fn reauthenticate(&self) -> bool {
        self.reauthenticate
    }

    /// Whether the status code is acceptable.
    pub fn is_ok(&self, status: StatusCode) -> bool {
        if self.ok_codes.is_empty() {
            status.is_success()
        } else {
            self.ok_codes.contains(&status)
        }
    }

    #[inline]
    pub(crate) fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct Response {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    pub(crate) fn new(url: Url, status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Response {
            url,
            status,
            headers,
            body,
        }
    }

    /// Final URL of the response.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response, returning the raw body.
    #[inline]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body as text (invalid UTF-8 is replaced).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body, optionally unwrapping it from an envelope (empty key for none).
    #[inline]
    pub fn extract<T: DeserializeOwned>(&self, key: &str) -> Result<T, Error> {
        extract::extract(&self.body, key)
    }

    /// Decode the body into an existing value.
    #[inline]
    pub fn extract_into<T: DeserializeOwned>(&self, target: &mut T, key: &str) -> Result<(), Error> {
        extract::extract_into(&self.body, target, key)
    }

    /// Build an error for a response with an unexpected status.
    pub(crate) fn into_error(self, method: &Method, expected: &[StatusCode]) -> Error {
        let text = String::from_utf8_lossy(&self.body).into_owned();
        let details = extract_message(&text).unwrap_or_else(|| text.clone());
        let expected_str = if expected.is_empty() {
            "2xx".to_string()
        } else {
            expected
                .iter()
                .map(|s| s.as_u16().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut message = format!(
            "Expected HTTP status {} when accessing [{} {}], but got {}",
            expected_str, method, self.url, self.status
        );
        if !details.is_empty() {
            message.push_str(": ");
            message.push_str(&details);
        }
        trace!("HTTP request returned {}; error: {}", self.status, message);
        Error::unexpected_status(self.status, message, text, expected.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct Message {
    message: Option<String>,
    faultstring: Option<String>,
    title: Option<String>,
    // Ironic legacy format: JSON inside JSON
    error_message: Option<String>,
}

impl Message {
    fn convert(self, recursive: bool) -> Option<String> {
        if let Some(value) = self.message.or(self.faultstring).or(self.title) {
            Some(value)
        } else if recursive {
            self.error_message.and_then(|json| {
                serde_json::from_str::<Message>(&json)
                    .ok()
                    .and_then(|msg| msg.convert(false))
            })
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorResponse {
    Map(HashMap<String, Message>),
    Message(Message),
}

/// Extract a human-readable message from an OpenStack error body.
pub(crate) fn extract_message(text: &str) -> Option<String> {
    serde_json::from_str::<ErrorResponse>(text)
        .ok()
        .and_then(|body| match body {
            ErrorResponse::Map(map) => map.into_iter().find_map(|(_k, v)| v.convert(true)),
            ErrorResponse::Message(msg) => msg.convert(true),
        })
}
