// Copyright 2020 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Internal implementation of the identity authentication.

use log::{debug, error, trace};
use reqwest::{Client, Response, StatusCode, Url};

use super::protocol::{self, AuthRoot};
use super::{IdOrName, Scope, INVALID_SUBJECT_HEADER, MISSING_SUBJECT_HEADER};
use crate::request::extract_message;
use crate::{url, AuthToken, Error, ErrorKind};

/// Internal identity authentication object.
///
/// Holds the request body and knows where to send it. Token caching is done by the client.
#[derive(Debug, Clone)]
pub(crate) struct Internal {
    auth_url: Url,
    body: AuthRoot,
    token_endpoint: Url,
}

impl Internal {
    /// Create a new implementation.
    pub fn new(auth_url: Url, body: AuthRoot) -> Result<Internal, Error> {
        if auth_url.cannot_be_a_base() {
            return Err(Error::new(
                ErrorKind::InvalidConfig,
                "Invalid auth_url: wrong schema?",
            ));
        }

        let auth_url = url::extend(auth_url, std::iter::empty::<&str>())?;
        let suffix: &[&str] = if url::last_segment(&auth_url) == Some("v3") {
            &["auth", "tokens"]
        } else {
            &["v3", "auth", "tokens"]
        };
        let token_endpoint = url::extend(auth_url.clone(), suffix)?;

        Ok(Internal {
            auth_url,
            body,
            token_endpoint,
        })
    }

    /// Access to the auth URL.
    #[inline]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Add a scope to the authentication.
    pub fn set_scope(&mut self, scope: Scope) {
        self.body.auth.scope = Some(match scope {
            Scope::Project { project, domain } => {
                protocol::Scope::Project(protocol::Project { project, domain })
            }
        });
    }

    /// User name or ID.
    #[inline]
    pub fn user(&self) -> Option<&IdOrName> {
        match self.body.auth.identity {
            protocol::Identity::Password(ref pw) => Some(&pw.user),
            _ => None,
        }
    }

    /// Project name or ID (if project scoped).
    #[inline]
    pub fn project(&self) -> Option<&IdOrName> {
        match self.body.auth.scope {
            Some(protocol::Scope::Project(ref prj)) => Some(&prj.project),
            _ => None,
        }
    }

    /// Exchange the credentials for a new token.
    pub async fn issue_token(&self, client: &Client) -> Result<AuthToken, Error> {
        debug!("Requesting a new token from {}", self.token_endpoint);
        let resp = client
            .post(self.token_endpoint.clone())
            .json(&self.body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = extract_message(&body).unwrap_or_else(|| {
                format!("Identity service returned {} when issuing a token", status)
            });
            error!(
                "Token request to {} failed with {}: {}",
                self.token_endpoint, status, message
            );
            let err = Error::unexpected_status(status, message, body, vec![StatusCode::CREATED]);
            return Err(if status == StatusCode::UNAUTHORIZED {
                err.wrap(ErrorKind::AuthenticationFailed, "Credentials were rejected")
            } else {
                err
            });
        }

        token_from_response(resp).await
    }

    #[cfg(test)]
    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }
}

async fn token_from_response(resp: Response) -> Result<AuthToken, Error> {
    let value = match resp.headers().get("x-subject-token") {
        Some(hdr) => match hdr.to_str() {
            Ok(s) => Ok(s.to_string()),
            Err(e) => {
                error!("Invalid X-Subject-Token received from {}: {}", resp.url(), e);
                Err(Error::new(
                    ErrorKind::InvalidResponse,
                    INVALID_SUBJECT_HEADER,
                ))
            }
        },
        None => {
            error!("No X-Subject-Token header received from {}", resp.url());
            Err(Error::new(
                ErrorKind::InvalidResponse,
                MISSING_SUBJECT_HEADER,
            ))
        }
    }?;

    let root = resp.json::<protocol::TokenRoot>().await?;
    debug!("Received a token expiring at {}", root.token.expires_at);
    trace!("Received catalog: {:?}", root.token.catalog);
    Ok(AuthToken::new(value)
        .with_expires_at(root.token.expires_at)
        .with_catalog(root.token.catalog))
}
