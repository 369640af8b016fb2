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

//! Token authentication.

use async_trait::async_trait;
use reqwest::{Client, IntoUrl, Url};

use super::internal::Internal;
use super::protocol;
use super::{IdOrName, Identity, Scope};
use crate::{AuthToken, AuthType, Error};

/// Token authentication using Identity API V3.
///
/// Exchanges an existing token for a new (usually project-scoped) one.
///
/// ```rust,no_run
/// # async fn example() -> Result<(), osclient::Error> {
/// use osclient::common::IdOrName;
///
/// let auth = osclient::identity::Token::new(
///     "https://cloud.local/identity",
///     "<a token>",
/// )?
/// .with_project_scope(IdOrName::from_name("project1"), IdOrName::from_id("default"));
///
/// let client = osclient::Client::authenticate(reqwest::Client::new(), auth).await?;
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct Token {
    inner: Internal,
}

impl Identity for Token {
    fn auth_url(&self) -> &Url {
        self.inner.auth_url()
    }
}

impl Token {
    /// Create a token authentication.
    pub fn new<U, S>(auth_url: U, token: S) -> Result<Self, Error>
    where
        U: IntoUrl,
        S: Into<String>,
    {
        let auth_url = auth_url.into_url()?;

        let body = protocol::AuthRoot {
            auth: protocol::Auth {
                identity: protocol::Identity::Token(token.into()),
                scope: None,
            },
        };
        Ok(Self {
            inner: Internal::new(auth_url, body)?,
        })
    }

    /// Scope authentication to the given project.
    #[inline]
    pub fn set_project_scope(&mut self, project: IdOrName, domain: impl Into<Option<IdOrName>>) {
        self.set_scope(Scope::Project {
            project,
            domain: domain.into(),
        });
    }

    /// Add a scope to the authentication.
    #[inline]
    pub fn set_scope(&mut self, scope: Scope) {
        self.inner.set_scope(scope);
    }

    /// Scope authentication to the given project.
    #[inline]
    pub fn with_project_scope(
        mut self,
        project: IdOrName,
        domain: impl Into<Option<IdOrName>>,
    ) -> Token {
        self.set_project_scope(project, domain);
        self
    }

    /// Add a scope to the authentication.
    #[inline]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.set_scope(scope);
        self
    }

    /// Project name or ID (if project scoped).
    #[inline]
    pub fn project(&self) -> Option<&IdOrName> {
        self.inner.project()
    }
}

#[async_trait]
impl AuthType for Token {
    /// Exchange the existing token for a new one.
    async fn issue_token(&self, client: &Client) -> Result<AuthToken, Error> {
        self.inner.issue_token(client).await
    }
}

#[cfg(test)]
pub mod test {
    use super::Token;
    use crate::identity::{IdOrName, Identity};

    #[test]
    fn test_identity_new() {
        let id = Token::new("http://127.0.0.1:8080/", "abcdef").unwrap();
        let e = id.auth_url();
        assert_eq!(e.scheme(), "http");
        assert_eq!(e.port().unwrap(), 8080u16);
        assert_eq!(id.project(), None);
    }

    #[test]
    fn test_identity_new_invalid() {
        assert!(Token::new("http://127.0.0.1 8080/", "abcdef").is_err());
    }

    #[test]
    fn test_identity_create() {
        let id = Token::new("http://127.0.0.1:8080/identity/v3/", "abcdef")
            .unwrap()
            .with_project_scope(IdOrName::from_name("cool project"), IdOrName::from_id("default"));
        assert_eq!(id.auth_url().as_str(), "http://127.0.0.1:8080/identity/v3");
        assert_eq!(id.project(), Some(&IdOrName::from_name("cool project")));
        assert_eq!(
            id.inner.token_endpoint().as_str(),
            "http://127.0.0.1:8080/identity/v3/auth/tokens"
        );
    }
}
