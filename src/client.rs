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

//! Authenticated request executor.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER, USER_AGENT,
};
use reqwest::{Method, StatusCode, Url};
use static_assertions::assert_impl_all;

use super::reauth::Reauthenticator;
use super::request::{RequestBody, RequestOpts, Response};
use super::services::ServiceType;
use super::{catalog, AuthToken, AuthType, EndpointFilters, Error, ErrorKind, ServiceClient};

/// Name of the header carrying the token.
pub const AUTH_HEADER: &str = "x-auth-token";

/// Default user agent.
pub const DEFAULT_USER_AGENT: &str = concat!("osclient/", env!("CARGO_PKG_VERSION"));

/// An authenticated client: HTTP transport plus token state.
///
/// The client attaches the current token to every request. When a request is rejected with
/// 401 Unauthorized and an [AuthType](trait.AuthType.html) is configured, the token is renewed
/// and the request is repeated exactly once. Concurrent requests that hit 401 at the same time
/// share a single renewal.
///
/// Cloning is cheap, clones share the token.
///
/// ```rust,no_run
/// # async fn example() -> Result<(), osclient::Error> {
/// use osclient::common::IdOrName;
/// use osclient::{EndpointFilters, RequestOpts};
///
/// let auth = osclient::identity::Password::new(
///     "https://cloud.local/identity",
///     "admin",
///     "pa$$w0rd",
///     "Default",
/// )?
/// .with_project_scope(IdOrName::from_name("admin"), IdOrName::from_id("default"));
/// let client = osclient::Client::authenticate(reqwest::Client::new(), auth).await?;
/// let compute = client
///     .service_client(osclient::services::COMPUTE, &EndpointFilters::default())
///     .await?;
/// let response = compute.get(&["servers"], RequestOpts::new()).await?;
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    reauth: Arc<Reauthenticator>,
    user_agent: HeaderValue,
    max_backoff_retries: u32,
}

assert_impl_all!(Client: Send, Sync);

impl Client {
    fn new_with_state(http: reqwest::Client, reauth: Reauthenticator) -> Client {
        Client {
            http,
            reauth: Arc::new(reauth),
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
            max_backoff_retries: 0,
        }
    }

    /// A client that sends requests without any token.
    pub fn new(http: reqwest::Client) -> Client {
        Client::new_with_state(http, Reauthenticator::new(None, None))
    }

    /// A client with a fixed token.
    ///
    /// The token is never renewed: 401 responses are returned as errors.
    pub fn with_token<S: Into<String>>(http: reqwest::Client, token: S) -> Client {
        Client::new_with_state(
            http,
            Reauthenticator::new(None, Some(AuthToken::new(token))),
        )
    }

    /// A client with an already issued token that is renewed using `auth` when rejected.
    pub fn with_auth<A: AuthType + 'static>(
        http: reqwest::Client,
        auth: A,
        token: AuthToken,
    ) -> Client {
        Client::new_with_state(http, Reauthenticator::new(Some(Arc::new(auth)), Some(token)))
    }

    /// Issue a token using `auth` and create a client that keeps it fresh.
    pub async fn authenticate<A: AuthType + 'static>(
        http: reqwest::Client,
        auth: A,
    ) -> Result<Client, Error> {
        debug!("Issuing the initial token using {:?}", auth);
        let token = auth.issue_token(&http).await?;
        Ok(Client::with_auth(http, auth, token))
    }

    /// The underlying HTTP client.
    #[inline]
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// The current token (if any).
    pub async fn token(&self) -> Option<AuthToken> {
        self.reauth
            .snapshot()
            .await
            .token
            .map(|token| token.as_ref().clone())
    }

    /// Replace the current token.
    ///
    /// Affects all clones of this client.
    pub async fn set_token(&self, token: AuthToken) {
        self.reauth.set_token(token).await
    }

    /// Force token renewal.
    pub async fn refresh(&self) -> Result<(), Error> {
        let snapshot = self.reauth.snapshot().await;
        self.reauth.reauthenticate(&self.http, snapshot.epoch).await
    }

    /// The current user agent.
    #[inline]
    pub fn user_agent(&self) -> &HeaderValue {
        &self.user_agent
    }

    /// Prepend a product to the user agent, e.g. `my-tool/1.0`.
    pub fn prepend_user_agent<S: AsRef<str>>(&mut self, product: S) -> Result<(), Error> {
        let current = self.user_agent.to_str().map_err(|e| {
            Error::new(ErrorKind::InvalidInput, format!("Invalid user agent: {}", e))
        })?;
        self.user_agent = HeaderValue::from_str(&format!("{} {}", product.as_ref(), current))?;
        Ok(())
    }

    /// Maximum number of retries of 429 Too Many Requests responses.
    #[inline]
    pub fn max_backoff_retries(&self) -> u32 {
        self.max_backoff_retries
    }

    /// Retry up to `retries` times on 429 Too Many Requests, honoring `Retry-After`.
    ///
    /// Disabled (zero) by default.
    #[inline]
    pub fn set_max_backoff_retries(&mut self, retries: u32) {
        self.max_backoff_retries = retries;
    }

    /// Same as `set_max_backoff_retries` but consumes the client.
    #[inline]
    pub fn with_max_backoff_retries(mut self, retries: u32) -> Self {
        self.set_max_backoff_retries(retries);
        self
    }

    /// Create a service client using an endpoint from the service catalog.
    pub async fn service_client<Srv: ServiceType>(
        &self,
        service: Srv,
        filters: &EndpointFilters,
    ) -> Result<ServiceClient<Srv>, Error> {
        let snapshot = self.reauth.snapshot().await;
        let catalog = snapshot
            .token
            .as_ref()
            .map(|token| token.catalog())
            .unwrap_or_default();
        debug!(
            "Looking up endpoint for service {} with {:?}",
            service.catalog_type(),
            filters
        );
        let endpoint = catalog::extract_url(catalog, service.catalog_type(), filters)?;
        Ok(ServiceClient::new(self.clone(), service, endpoint))
    }

    /// Issue a request, re-authenticating on 401 if possible.
    ///
    /// The timeout from `opts` is a deadline for the whole call: sending, token renewal,
    /// backoff and the retry. Nothing is retried once it expires.
    pub async fn request(
        &self,
        method: Method,
        url: Url,
        opts: RequestOpts,
    ) -> Result<Response, Error> {
        match opts.timeout() {
            Some(deadline) => {
                tokio::time::timeout(deadline, self.request_with_retries(&method, &url, &opts))
                    .await
                    .map_err(|_| {
                        Error::new(
                            ErrorKind::Timeout,
                            format!(
                                "Request [{} {}] did not complete within {:?}",
                                method, url, deadline
                            ),
                        )
                    })?
            }
            None => self.request_with_retries(&method, &url, &opts).await,
        }
    }

    async fn request_with_retries(
        &self,
        method: &Method,
        url: &Url,
        opts: &RequestOpts,
    ) -> Result<Response, Error> {
        let mut reauthenticated = false;
        let mut backoff_retries = 0;
        loop {
            let snapshot = self.reauth.snapshot().await;
            let response = self
                .send_once(method, url, opts, snapshot.token.as_deref())
                .await?;
            let status = response.status();
            if opts.is_ok(status) {
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED
                && opts.reauthenticate()
                && self.reauth.can_reauthenticate()
            {
                if reauthenticated {
                    return Err(response.into_error(method, opts.ok_codes()).wrap(
                        ErrorKind::AuthenticationFailed,
                        "Successfully re-authenticated, but got error executing request",
                    ));
                }

                debug!(
                    "Request [{} {}] returned 401, re-authenticating",
                    method, url
                );
                self.reauth
                    .reauthenticate(&self.http, snapshot.epoch)
                    .await?;
                reauthenticated = true;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS && backoff_retries < self.max_backoff_retries
            {
                if let Some(delay) = retry_after(response.headers()) {
                    backoff_retries += 1;
                    warn!(
                        "Request [{} {}] is rate limited, retrying in {:?} ({}/{})",
                        method, url, delay, backoff_retries, self.max_backoff_retries
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }

            return Err(response.into_error(method, opts.ok_codes()));
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        opts: &RequestOpts,
        token: Option<&AuthToken>,
    ) -> Result<Response, Error> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(USER_AGENT, self.user_agent.clone());
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in opts.headers().iter() {
            let _ = headers.insert(name.clone(), value.clone());
        }
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(token.value())?;
            value.set_sensitive(true);
            let _ = headers.insert(HeaderName::from_static(AUTH_HEADER), value);
        }

        let mut builder = self.http.request(method.clone(), url.clone());
        builder = match opts.body() {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Raw { data, content_type }) => {
                let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type)?);
                builder.body(data.clone())
            }
            None => builder,
        };
        builder = builder.headers(headers);

        trace!("Sending HTTP {} request to {}", method, url);
        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let final_url = resp.url().clone();
        let body = resp.bytes().await?.to_vec();
        trace!("HTTP {} request to {} returned {}", method, final_url, status);
        Ok(Response::new(final_url, status, headers, body))
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delay = date.with_timezone(&Utc) - Utc::now();
    Some(delay.to_std().unwrap_or(Duration::ZERO))
}
