// Copyright 2021 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Pages of paginated collections.

use log::trace;
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{LinkSource, Pagination};
use crate::common::Link;
use crate::{extract, url, Error, ErrorKind};

/// Query parameter carrying the marker.
pub const MARKER_PARAM: &str = "marker";

fn pagination_error<S: Into<String>>(message: S) -> Error {
    Error::new(ErrorKind::Pagination, message)
}

/// Raw data of one page: URL, status, headers and the decoded JSON body.
#[derive(Debug, Clone)]
pub struct PageResult {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
    items_key: String,
}

impl PageResult {
    pub(crate) fn new(
        url: Url,
        status: StatusCode,
        headers: HeaderMap,
        body: Value,
        items_key: String,
    ) -> PageResult {
        PageResult {
            url,
            status,
            headers,
            body,
            items_key,
        }
    }

    /// URL the page was fetched from.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Status code of the response.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Headers of the response.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Decoded JSON body.
    #[inline]
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Key of the items array in the body.
    #[inline]
    pub fn items_key(&self) -> &str {
        &self.items_key
    }

    /// Raw items of the page.
    ///
    /// A missing or `null` items key is an empty page.
    pub fn items(&self) -> Result<&[Value], Error> {
        match self.body.get(&self.items_key) {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(Error::new(
                ErrorKind::Decode,
                format!(
                    "Expected an array under key {}, got {}",
                    self.items_key, other
                ),
            )),
        }
    }

    fn with_items(mut self, items: Vec<Value>) -> PageResult {
        let mut body = Map::with_capacity(1);
        let _ = body.insert(self.items_key.clone(), Value::Array(items));
        self.body = Value::Object(body);
        self
    }

    fn resolve(&self, href: &str) -> Result<Url, Error> {
        self.url.join(href).map_err(|e| {
            pagination_error(format!("Invalid next page link {}: {}", href, e))
        })
    }
}

/// A page without continuation.
#[derive(Debug, Clone)]
pub struct SinglePage {
    result: PageResult,
}

/// A page continued by the marker of its last item.
#[derive(Debug, Clone)]
pub struct MarkerPage {
    result: PageResult,
    marker_field: String,
}

/// A page continued by a `next` link.
#[derive(Debug, Clone)]
pub struct LinkedPage {
    result: PageResult,
    source: LinkSource,
}

impl MarkerPage {
    /// Marker of the last item, `None` if the page is empty or the marker is empty.
    ///
    /// Numeric markers are converted to strings.
    pub fn last_marker(&self) -> Result<Option<String>, Error> {
        let last = match self.result.items()?.last() {
            Some(item) => item,
            None => return Ok(None),
        };

        let marker = match last.get(&self.marker_field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Null) => String::new(),
            Some(other) => {
                return Err(pagination_error(format!(
                    "Marker field {} has unsupported value {}",
                    self.marker_field, other
                )))
            }
            None => {
                return Err(pagination_error(format!(
                    "Item has no marker field {}",
                    self.marker_field
                )))
            }
        };

        Ok(if marker.is_empty() { None } else { Some(marker) })
    }

    fn next_page_url(&self) -> Result<Option<Url>, Error> {
        Ok(self
            .last_marker()?
            .map(|marker| url::set_query_param(self.result.url.clone(), MARKER_PARAM, &marker)))
    }
}

impl LinkedPage {
    fn next_page_url(&self) -> Result<Option<Url>, Error> {
        let body = &self.result.body;
        let href = match self.source {
            LinkSource::ItemsLinks => {
                let key = format!("{}_links", self.result.items_key);
                next_from_links(body.get(&key), &key)?
            }
            LinkSource::LinksArray(ref key) => next_from_links(body.get(key), key)?,
            LinkSource::NextField(ref key) => match body.get(key) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => {
                    return Err(pagination_error(format!(
                        "Expected a string under key {}, got {}",
                        key, other
                    )))
                }
            },
        };

        match href {
            Some(href) if !href.is_empty() => {
                trace!("Next page of {} is {}", self.result.url, href);
                self.result.resolve(&href).map(Some)
            }
            _ => Ok(None),
        }
    }
}

fn next_from_links(value: Option<&Value>, key: &str) -> Result<Option<String>, Error> {
    let value = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };

    let links = Vec::<Link>::deserialize(value).map_err(|e| {
        pagination_error(format!("Malformed links under key {}: {}", key, e))
    })?;
    Ok(links.into_iter().find(Link::is_next).map(|link| link.href))
}

/// One page of a collection.
///
/// The variant is determined by the pagination convention of the collection.
#[derive(Debug, Clone)]
pub enum Page {
    /// Non-paginated collection.
    Single(SinglePage),
    /// Marker-based pagination.
    Marker(MarkerPage),
    /// Link-based pagination.
    Linked(LinkedPage),
}

impl Page {
    pub(crate) fn new(result: PageResult, pagination: &Pagination) -> Page {
        match pagination {
            Pagination::Single => Page::Single(SinglePage { result }),
            Pagination::Marker { marker_field } => Page::Marker(MarkerPage {
                result,
                marker_field: marker_field.clone(),
            }),
            Pagination::Linked(source) => Page::Linked(LinkedPage {
                result,
                source: source.clone(),
            }),
        }
    }

    /// Raw page data.
    pub fn result(&self) -> &PageResult {
        match self {
            Page::Single(page) => &page.result,
            Page::Marker(page) => &page.result,
            Page::Linked(page) => &page.result,
        }
    }

    fn into_result(self) -> PageResult {
        match self {
            Page::Single(page) => page.result,
            Page::Marker(page) => page.result,
            Page::Linked(page) => page.result,
        }
    }

    /// URL the page was fetched from.
    #[inline]
    pub fn url(&self) -> &Url {
        self.result().url()
    }

    /// Status code of the response.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.result().status()
    }

    /// Headers of the response.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        self.result().headers()
    }

    /// Decoded JSON body.
    #[inline]
    pub fn body(&self) -> &Value {
        self.result().body()
    }

    /// Whether the page has no items.
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.result().items()?.is_empty())
    }

    /// URL of the next page, `None` when this is the last one.
    pub fn next_page_url(&self) -> Result<Option<Url>, Error> {
        match self {
            Page::Single(_) => Ok(None),
            Page::Marker(page) => page.next_page_url(),
            Page::Linked(page) => page.next_page_url(),
        }
    }

    /// Marker of the last item (only for marker-based pages).
    pub fn last_marker(&self) -> Result<Option<String>, Error> {
        match self {
            Page::Marker(page) => page.last_marker(),
            _ => Ok(None),
        }
    }

    /// Decode the items of the page.
    pub fn extract_items<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        let result = self.result();
        extract::extract_value(result.body(), result.items_key())
    }

    /// Decode the body (or a key of it) into an existing value.
    pub fn extract_into<T: DeserializeOwned>(&self, target: &mut T, key: &str) -> Result<(), Error> {
        *target = extract::extract_value(self.body(), key)?;
        Ok(())
    }

    /// Replace the body with only the provided items, keeping the rest of the page.
    pub(crate) fn with_items(self, items: Vec<Value>) -> Page {
        match self {
            Page::Single(page) => Page::Single(SinglePage {
                result: page.result.with_items(items),
            }),
            Page::Marker(page) => Page::Marker(MarkerPage {
                result: page.result.with_items(items),
                marker_field: page.marker_field,
            }),
            Page::Linked(page) => Page::Linked(LinkedPage {
                result: page.result.with_items(items),
                source: page.source,
            }),
        }
    }

    /// Consume the page, returning its raw items.
    pub fn into_items(self) -> Result<Vec<Value>, Error> {
        let result = self.into_result();
        let items = result.items()?.to_vec();
        Ok(items)
    }
}
