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

//! Client for a specific service.

use log::trace;
use reqwest::{Method, Url};

use super::pagination::{Pager, Pagination};
use super::services::ServiceType;
use super::{url, ApiVersion, Client, Error, RequestOpts, Response};

/// Client for a specific service.
///
/// A `ServiceClient` is a [Client](struct.Client.html) bound to one endpoint. Clones share
/// the token state with the parent `Client`.
#[derive(Debug, Clone)]
pub struct ServiceClient<Srv> {
    client: Client,
    service: Srv,
    endpoint: Url,
    resource_base: Option<Url>,
    api_version: Option<ApiVersion>,
}

impl<Srv> ServiceClient<Srv> {
    /// Create a service client for a known endpoint.
    pub fn new(client: Client, service: Srv, endpoint: Url) -> ServiceClient<Srv> {
        ServiceClient {
            client,
            service,
            endpoint,
            resource_base: None,
            api_version: None,
        }
    }

    /// Parent client.
    #[inline]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Service type.
    #[inline]
    pub fn service(&self) -> &Srv {
        &self.service
    }

    /// Endpoint of the service.
    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Base URL of resources if it differs from the endpoint.
    #[inline]
    pub fn resource_base(&self) -> Option<&Url> {
        self.resource_base.as_ref()
    }

    /// Use a different base for resource URLs.
    #[inline]
    pub fn set_resource_base(&mut self, base: Url) {
        self.resource_base = Some(base);
    }

    /// Use a different base for resource URLs.
    #[inline]
    pub fn with_resource_base(mut self, base: Url) -> Self {
        self.set_resource_base(base);
        self
    }

    /// API version sent with every request (if any).
    #[inline]
    pub fn api_version(&self) -> Option<ApiVersion> {
        self.api_version
    }

    /// Send this API version with every request.
    #[inline]
    pub fn set_api_version(&mut self, version: ApiVersion) {
        self.api_version = Some(version);
    }

    /// Send this API version with every request.
    #[inline]
    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.set_api_version(version);
        self
    }

    /// Build a URL of a resource from path segments.
    pub fn resource_url<I>(&self, segments: I) -> Result<Url, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let base = self.resource_base.as_ref().unwrap_or(&self.endpoint);
        url::extend(base.clone(), segments)
    }
}

impl<Srv: ServiceType> ServiceClient<Srv> {
    /// Add the API version headers (if any) to `opts`.
    fn versioned_opts(&self, opts: RequestOpts) -> Result<RequestOpts, Error> {
        match self.api_version {
            Some(version) => {
                let mut headers = opts.headers().clone();
                self.service.set_api_version_headers(&mut headers, version)?;
                Ok(opts.with_headers(headers))
            }
            None => Ok(opts),
        }
    }

    /// Issue a request to a resource.
    ///
    /// Adds the API version headers when an API version is set.
    pub async fn request<I>(
        &self,
        method: Method,
        segments: I,
        opts: RequestOpts,
    ) -> Result<Response, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let url = self.resource_url(segments)?;
        let opts = self.versioned_opts(opts)?;
        trace!(
            "{} request to {} service: {}",
            method,
            self.service.catalog_type(),
            url
        );
        self.client.request(method, url, opts).await
    }

    /// Issue a GET request.
    #[inline]
    pub async fn get<I>(&self, segments: I, opts: RequestOpts) -> Result<Response, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(Method::GET, segments, opts).await
    }

    /// Issue a POST request.
    #[inline]
    pub async fn post<I>(&self, segments: I, opts: RequestOpts) -> Result<Response, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(Method::POST, segments, opts).await
    }

    /// Issue a PUT request.
    #[inline]
    pub async fn put<I>(&self, segments: I, opts: RequestOpts) -> Result<Response, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(Method::PUT, segments, opts).await
    }

    /// Issue a PATCH request.
    #[inline]
    pub async fn patch<I>(&self, segments: I, opts: RequestOpts) -> Result<Response, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(Method::PATCH, segments, opts).await
    }

    /// Issue a DELETE request.
    #[inline]
    pub async fn delete<I>(&self, segments: I, opts: RequestOpts) -> Result<Response, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(Method::DELETE, segments, opts).await
    }

    /// Issue a HEAD request.
    #[inline]
    pub async fn head<I>(&self, segments: I, opts: RequestOpts) -> Result<Response, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.request(Method::HEAD, segments, opts).await
    }

    /// Start listing a collection.
    ///
    /// The API version headers are attached to every page request.
    pub fn list<I, S>(
        &self,
        segments: I,
        items_key: S,
        pagination: Pagination,
    ) -> Result<Pager, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        S: Into<String>,
    {
        let url = self.resource_url(segments)?;
        let opts = self.versioned_opts(RequestOpts::default())?;
        Ok(Pager::new(self.client.clone(), url, items_key, pagination).with_request_opts(opts))
    }
}

#[cfg(test)]
pub mod test {
    use reqwest::Url;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::ServiceClient;
    use crate::pagination::Pagination;
    use crate::services::{COMPUTE, NETWORK};
    use crate::{ApiVersion, Client, RequestOpts};

    fn client() -> Client {
        Client::with_token(reqwest::Client::new(), "abcd")
    }

    #[test]
    fn test_resource_url() {
        let endpoint = Url::parse("https://compute.local/v2.1/").unwrap();
        let service = ServiceClient::new(client(), COMPUTE, endpoint);
        assert_eq!(
            service.resource_url(["servers", "detail"]).unwrap().as_str(),
            "https://compute.local/v2.1/servers/detail"
        );
        assert!(service.resource_base().is_none());

        let service =
            service.with_resource_base(Url::parse("https://compute.local/v2.1/os-hosts").unwrap());
        assert_eq!(
            service.resource_url(["h1"]).unwrap().as_str(),
            "https://compute.local/v2.1/os-hosts/h1"
        );
    }

    #[tokio::test]
    async fn test_api_version_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.1/servers/s1"))
            .and(header("openstack-api-version", "compute 2.79"))
            .and(header("x-openstack-nova-api-version", "2.79"))
            .and(header("x-auth-token", "abcd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "server": {"id": "s1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/v2.1", server.uri())).unwrap();
        let service =
            ServiceClient::new(client(), COMPUTE, endpoint).with_api_version(ApiVersion(2, 79));
        assert_eq!(service.api_version(), Some(ApiVersion(2, 79)));
        let resp = service
            .get(["servers", "s1"], RequestOpts::default())
            .await
            .unwrap();
        let id: String = resp.extract::<serde_json::Value>("server").unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(id, "s1");
    }

    #[tokio::test]
    async fn test_post_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2.0/networks"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "network": {"id": "n1", "name": "private"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/v2.0", server.uri())).unwrap();
        let service = ServiceClient::new(client(), NETWORK, endpoint);
        let opts = RequestOpts::default()
            .enveloped("network", &json!({"name": "private"}))
            .unwrap()
            .with_ok_codes([reqwest::StatusCode::CREATED]);
        let resp = service.post(["networks"], opts).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_list_with_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.1/servers"))
            .and(header("openstack-api-version", "compute 2.1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [{"id": "s1"}, {"id": "s2"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/v2.1", server.uri())).unwrap();
        let service =
            ServiceClient::new(client(), COMPUTE, endpoint).with_api_version(ApiVersion(2, 1));
        let page = service
            .list(["servers"], "servers", Pagination::linked())
            .unwrap()
            .all_pages()
            .await
            .unwrap();
        assert_eq!(page.into_items().unwrap().len(), 2);
    }
}
