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

//! Pagination of OpenStack collections.
//!
//! Three conventions are supported:
//! * [Single](enum.Pagination.html#variant.Single): the collection is returned in one response.
//! * [Marker](enum.Pagination.html#variant.Marker): the ID of the last item is sent back as
//!   the `marker` query parameter; an empty page or an empty marker ends the iteration.
//! * [Linked](enum.Pagination.html#variant.Linked): the response contains a link with
//!   `"rel": "next"` (or a plain `next` URL); no link ends the iteration.
//!
//! A [Pager](struct.Pager.html) fetches pages lazily, one GET per page, in server order.

mod page;

use std::collections::HashSet;
use std::time::Duration;

use log::{debug, trace};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;

pub use self::page::{LinkedPage, MarkerPage, Page, PageResult, SinglePage, MARKER_PARAM};
use super::{query, url, Client, Error, ErrorKind, RequestOpts};

/// Where to look for the link to the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSource {
    /// Array of links under `<items key>_links`, e.g. `servers_links`.
    ItemsLinks,
    /// Array of links under the provided key.
    LinksArray(String),
    /// A top-level string field with the next URL (e.g. `next` in the Image API).
    NextField(String),
}

/// Pagination convention of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    /// No pagination.
    Single,
    /// Marker-based pagination.
    Marker {
        /// Field of an item to use as a marker.
        marker_field: String,
    },
    /// Link-based pagination.
    Linked(LinkSource),
}

impl Pagination {
    /// Marker-based pagination using the `id` field.
    #[inline]
    pub fn marker() -> Pagination {
        Pagination::marker_field("id")
    }

    /// Marker-based pagination using the provided field.
    #[inline]
    pub fn marker_field<S: Into<String>>(field: S) -> Pagination {
        Pagination::Marker {
            marker_field: field.into(),
        }
    }

    /// Link-based pagination using the `<items key>_links` array.
    #[inline]
    pub fn linked() -> Pagination {
        Pagination::Linked(LinkSource::ItemsLinks)
    }

    /// Link-based pagination using a top-level `next` URL.
    #[inline]
    pub fn next_field<S: Into<String>>(key: S) -> Pagination {
        Pagination::Linked(LinkSource::NextField(key.into()))
    }
}

/// A lazy, forward-only sequence of pages.
///
/// A pager is consumed by iteration. Every page is fetched with a separate GET request through
/// the [Client](../struct.Client.html), so pages benefit from transparent re-authentication.
///
/// ```rust,no_run
/// # async fn example(client: osclient::Client) -> Result<(), osclient::Error> {
/// use osclient::pagination::{Pager, Pagination};
///
/// let url = reqwest::Url::parse("https://compute.local/v2.1/servers")?;
/// let mut names = Vec::new();
/// Pager::new(client, url, "servers", Pagination::linked())
///     .each_page(|page| {
///         for server in page.extract_items::<serde_json::Value>()? {
///             names.push(server["name"].to_string());
///         }
///         Ok(true)
///     })
///     .await?;
/// # Ok(()) }
/// ```
#[derive(Debug)]
#[must_use = "a pager does nothing until iterated"]
pub struct Pager {
    client: Client,
    next: Option<Result<Url, Error>>,
    visited: HashSet<Url>,
    items_key: String,
    pagination: Pagination,
    opts: RequestOpts,
}

impl Pager {
    /// Create a pager starting at `url`.
    ///
    /// `items_key` is the key of the items array in every page, e.g. `servers`.
    pub fn new<S: Into<String>>(
        client: Client,
        url: Url,
        items_key: S,
        pagination: Pagination,
    ) -> Pager {
        Pager {
            client,
            next: Some(Ok(url)),
            visited: HashSet::new(),
            items_key: items_key.into(),
            pagination,
            opts: RequestOpts::default(),
        }
    }

    /// Add a query to the initial URL.
    ///
    /// Continuation URLs are built by the server (or from the current URL for markers).
    pub fn with_query<Q: Serialize + ?Sized>(mut self, query: &Q) -> Result<Pager, Error> {
        let query_string = query::to_query_string(query)?;
        if let Some(Ok(start)) = self.next.take() {
            self.next = Some(Ok(url::append_query(start, &query_string)));
        }
        Ok(self)
    }

    /// Use these request options for every page (headers, OK codes, timeout).
    ///
    /// Any body is ignored since pages are fetched with GET.
    #[inline]
    pub fn with_request_opts(mut self, opts: RequestOpts) -> Pager {
        self.opts = opts;
        self
    }

    /// Deadline for each page request.
    ///
    /// The deadline applies to every page separately and covers token renewal and the retry
    /// after 401 for that page. It does not bound the whole iteration. An expired deadline ends
    /// the iteration with `ErrorKind::Timeout`.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Pager {
        self.opts = self.opts.with_timeout(timeout);
        self
    }

    /// Pagination convention in use.
    #[inline]
    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    async fn fetch(&self, url: Url) -> Result<Page, Error> {
        trace!("Fetching page {}", url);
        let resp = self
            .client
            .request(Method::GET, url, self.opts.clone())
            .await?;
        // No content (e.g. 204) is an empty page.
        let body: Value = if resp.body().iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            resp.extract("")?
        };
        let result = PageResult::new(
            resp.url().clone(),
            resp.status(),
            resp.headers().clone(),
            body,
            self.items_key.clone(),
        );
        Ok(Page::new(result, &self.pagination))
    }

    /// Fetch the next page (if any), including an empty terminating page.
    ///
    /// A continuation error is reported on the call after the page that caused it.
    pub(crate) async fn advance(&mut self) -> Result<Option<Page>, Error> {
        let url = match self.next.take() {
            Some(Ok(url)) => url,
            Some(Err(err)) => return Err(err),
            None => return Ok(None),
        };

        let _ = self.visited.insert(url.clone());
        let page = self.fetch(url).await?;
        if page.is_empty()? {
            debug!("Page {} is empty, stopping", page.url());
            return Ok(Some(page));
        }

        self.next = match page.next_page_url() {
            Ok(Some(next)) if self.visited.contains(&next) => Some(Err(Error::new(
                ErrorKind::Pagination,
                format!("Next page URL {} has already been visited", next),
            ))),
            Ok(Some(next)) => Some(Ok(next)),
            Ok(None) => {
                debug!("Page {} is the last one", page.url());
                None
            }
            Err(err) => Some(Err(err)),
        };
        Ok(Some(page))
    }

    /// Call `callback` for every non-empty page.
    ///
    /// The callback returns `Ok(true)` to continue, `Ok(false)` to stop or an error to abort.
    pub async fn each_page<F>(mut self, mut callback: F) -> Result<(), Error>
    where
        F: FnMut(Page) -> Result<bool, Error>,
    {
        while let Some(page) = self.advance().await? {
            if page.is_empty()? {
                break;
            }
            if !callback(page)? {
                debug!("Pagination stopped by the caller");
                break;
            }
        }
        Ok(())
    }

    /// Fetch all pages and concatenate their items into one page.
    ///
    /// The resulting page has the URL, status and headers of the first page and a body
    /// containing only the items key.
    pub async fn all_pages(mut self) -> Result<Page, Error> {
        let mut first: Option<Page> = None;
        let mut items = Vec::new();
        while let Some(page) = self.advance().await? {
            let empty = page.is_empty()?;
            if !empty {
                items.extend(page.result().items()?.iter().cloned());
            }
            if first.is_none() {
                first = Some(page);
            }
            if empty {
                break;
            }
        }

        first
            .map(|page| page.with_items(items))
            .ok_or_else(|| Error::new(ErrorKind::Pagination, "No pages were fetched"))
    }
}

#[cfg(test)]
#[allow(missing_docs)]
pub mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use reqwest::Url;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use super::{Pager, Pagination};
    use crate::query::{CommonQuery, Query};
    use crate::{Client, ErrorKind};

    fn client() -> Client {
        Client::with_token(reqwest::Client::new(), "abcd")
    }

    fn start(server: &MockServer) -> Url {
        Url::parse(&format!("{}/servers", server.uri())).unwrap()
    }

    fn ids(page: &super::Page) -> Vec<String> {
        page.extract_items::<serde_json::Value>()
            .unwrap()
            .into_iter()
            .map(|item| item["id"].as_str().unwrap().to_string())
            .collect()
    }

    /// Serves `count` linked pages: /servers?page=N links to page N+1.
    struct LinkedPages {
        base: String,
        count: usize,
        hits: Arc<AtomicUsize>,
    }

    impl Respond for LinkedPages {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let _ = self.hits.fetch_add(1, Ordering::SeqCst);
            let current: usize = request
                .url
                .query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
                .unwrap_or(1);
            let mut links = vec![json!({"rel": "self", "href": request.url.as_str()})];
            if current < self.count {
                links.push(json!({
                    "rel": "next",
                    "href": format!("{}/servers?page={}", self.base, current + 1)
                }));
            }
            ResponseTemplate::new(200).set_body_json(json!({
                "servers": [{"id": format!("s{}", current)}],
                "servers_links": links,
            }))
        }
    }

    #[tokio::test]
    async fn test_linked_terminates() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(LinkedPages {
                base: server.uri(),
                count: 4,
                hits: Arc::clone(&hits),
            })
            .mount(&server)
            .await;

        let mut seen = Vec::new();
        Pager::new(client(), start(&server), "servers", Pagination::linked())
            .each_page(|page| {
                seen.extend(ids(&page));
                Ok(true)
            })
            .await
            .unwrap();
        assert_eq!(seen, vec!["s1", "s2", "s3", "s4"]);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_linked_loop_detected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .and(query_param_is_missing("page"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [{"id": "s1"}],
                "servers_links": [{"rel": "next", "href": format!("{}/servers?page=2", server.uri())}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [{"id": "s2"}],
                "servers_links": [{"rel": "next", "href": format!("{}/servers", server.uri())}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut pages = 0;
        let err = Pager::new(client(), start(&server), "servers", Pagination::linked())
            .each_page(|_page| {
                pages += 1;
                Ok(true)
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Pagination);
        assert_eq!(pages, 2);
    }

    #[tokio::test]
    async fn test_marker_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .and(query_param_is_missing("marker"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"servers": [{"id": "A"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .and(query_param("marker", "A"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"servers": [{"id": "B"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .and(query_param("marker", "B"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"servers": [{"id": ""}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut seen = Vec::new();
        Pager::new(client(), start(&server), "servers", Pagination::marker())
            .with_query(&Query::default().with(CommonQuery::Limit(1)))
            .unwrap()
            .each_page(|page| {
                assert_eq!(page.url().query_pairs().find(|(k, _)| k == "limit").unwrap().1, "1");
                seen.extend(ids(&page));
                Ok(true)
            })
            .await
            .unwrap();
        assert_eq!(seen, vec!["A", "B", ""]);
    }

    #[tokio::test]
    async fn test_marker_empty_page_stops() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .and(query_param_is_missing("marker"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"servers": [{"id": "A"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .and(query_param("marker", "A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"servers": []})))
            .expect(1)
            .mount(&server)
            .await;

        let mut calls = 0;
        Pager::new(client(), start(&server), "servers", Pagination::marker())
            .each_page(|_page| {
                calls += 1;
                Ok(true)
            })
            .await
            .unwrap();
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_marker_loop_detected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"servers": [{"id": "A"}]})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let mut calls = 0;
        let err = Pager::new(client(), start(&server), "servers", Pagination::marker())
            .each_page(|_page| {
                calls += 1;
                Ok(true)
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Pagination);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_single_page_ignores_next() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [{"id": "s1"}],
                "servers_links": [{"rel": "next", "href": format!("{}/servers?page=2", server.uri())}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut calls = 0;
        Pager::new(client(), start(&server), "servers", Pagination::Single)
            .each_page(|_page| {
                calls += 1;
                Ok(true)
            })
            .await
            .unwrap();
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_callback_stop_and_error() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(LinkedPages {
                base: server.uri(),
                count: 10,
                hits: Arc::clone(&hits),
            })
            .mount(&server)
            .await;

        Pager::new(client(), start(&server), "servers", Pagination::linked())
            .each_page(|page| Ok(ids(&page) != vec!["s2"]))
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        let err = Pager::new(client(), start(&server), "servers", Pagination::linked())
            .each_page(|_page| Err(crate::Error::new(ErrorKind::InvalidInput, "enough")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_all_pages() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(
                LinkedPages {
                    base: server.uri(),
                    count: 3,
                    hits: Arc::clone(&hits),
                },
            )
            .mount(&server)
            .await;

        let page = Pager::new(client(), start(&server), "servers", Pagination::linked())
            .all_pages()
            .await
            .unwrap();
        assert_eq!(ids(&page), vec!["s1", "s2", "s3"]);
        assert_eq!(page.url().as_str(), start(&server).as_str());
        assert_eq!(page.next_page_url().unwrap(), None);
    }

    #[tokio::test]
    async fn test_all_pages_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"servers": []})))
            .expect(1)
            .mount(&server)
            .await;

        let page = Pager::new(client(), start(&server), "servers", Pagination::marker())
            .all_pages()
            .await
            .unwrap();
        assert!(page.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_no_content_is_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let mut calls = 0;
        Pager::new(client(), start(&server), "servers", Pagination::marker())
            .each_page(|_page| {
                calls += 1;
                Ok(true)
            })
            .await
            .unwrap();
        assert_eq!(calls, 0);

        let page = Pager::new(client(), start(&server), "servers", Pagination::Single)
            .all_pages()
            .await
            .unwrap();
        assert!(page.is_empty().unwrap());
        assert!(page.extract_items::<serde_json::Value>().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{oops"))
            .expect(1)
            .mount(&server)
            .await;

        let err = Pager::new(client(), start(&server), "servers", Pagination::Single)
            .each_page(|_page| Ok(true))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"servers": [{"id": "s1"}]}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = Pager::new(client(), start(&server), "servers", Pagination::Single)
            .with_timeout(Duration::from_millis(100))
            .each_page(|_page| Ok(true))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
