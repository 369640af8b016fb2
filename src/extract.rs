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

//! Decoding JSON responses into typed values.
//!
//! OpenStack services usually wrap resources in an envelope object, e.g. `{"server": {...}}`
//! or `{"servers": [...]}`. The functions here decode either the whole body (empty key) or
//! only the value stored under the envelope key.

use log::trace;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{Error, ErrorKind};

fn missing_key(key: &str) -> Error {
    Error::new(
        ErrorKind::Decode,
        format!("Missing key {} in the response body", key),
    )
}

/// Decode a JSON body, optionally unwrapping it from an envelope.
///
/// An empty `key` means the whole body is decoded.
pub fn extract<T: DeserializeOwned>(body: &[u8], key: &str) -> Result<T, Error> {
    if key.is_empty() {
        return Ok(serde_json::from_slice(body)?);
    }

    let mut root: Map<String, Value> = serde_json::from_slice(body)?;
    let value = root.remove(key).ok_or_else(|| missing_key(key))?;
    trace!("Extracting key {} from the response", key);
    Ok(serde_json::from_value(value)?)
}

/// Decode a JSON body into an existing value, optionally unwrapping it from an envelope.
///
/// The target is only overwritten on success.
pub fn extract_into<T: DeserializeOwned>(
    body: &[u8],
    target: &mut T,
    key: &str,
) -> Result<(), Error> {
    *target = extract(body, key)?;
    Ok(())
}

/// Same as [extract](fn.extract.html), but for an already parsed JSON value.
pub fn extract_value<T: DeserializeOwned>(value: &Value, key: &str) -> Result<T, Error> {
    let inner = if key.is_empty() {
        value
    } else {
        value.get(key).ok_or_else(|| missing_key(key))?
    };
    Ok(<T as serde::Deserialize>::deserialize(inner)?)
}

/// Wrap a serializable value into an envelope `{key: value}`.
///
/// An empty `key` returns the serialized value as it is.
pub fn envelope<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Value, Error> {
    let value = serde_json::to_value(value).map_err(|e| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("Cannot serialize request body: {}", e),
        )
    })?;

    if key.is_empty() {
        return Ok(value);
    }

    let mut root = Map::with_capacity(1);
    let _ = root.insert(key.to_string(), value);
    Ok(Value::Object(root))
}
