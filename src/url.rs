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

//! Handy primitives for working with URLs.

use reqwest::Url;

use crate::{Error, ErrorKind};

fn cannot_be_a_base(url: &Url) -> Error {
    Error::new(
        ErrorKind::InvalidInput,
        format!("URL {} cannot be used as a base", url),
    )
}

/// Append path segments, dropping a trailing slash first.
pub fn extend<I>(mut url: Url, segments: I) -> Result<Url, Error>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if url.cannot_be_a_base() {
        return Err(cannot_be_a_base(&url));
    }

    if let Ok(mut parts) = url.path_segments_mut() {
        let _ = parts.pop_if_empty().extend(segments);
    }
    Ok(url)
}

/// The last non-empty path segment.
pub fn last_segment(url: &Url) -> Option<&str> {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
}

/// Replace all values of a query parameter with a single value.
pub fn set_query_param(mut url: Url, key: &str, value: &str) -> Url {
    let others: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        let _ = pairs.clear();
        for (k, v) in &others {
            let _ = pairs.append_pair(k, v);
        }
        let _ = pairs.append_pair(key, value);
    }
    url
}

/// Append an already encoded query string.
pub fn append_query(mut url: Url, query: &str) -> Url {
    if query.is_empty() {
        return url;
    }

    let new_query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{}&{}", existing, query),
        _ => query.to_string(),
    };
    url.set_query(Some(&new_query));
    url
}
