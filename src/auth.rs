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

//! Base code for authentication.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use static_assertions::{assert_impl_all, assert_obj_safe};

use super::identity::CatalogRecord;
use super::Error;

/// Trait for an authentication type.
///
/// An authentication type knows how to exchange credentials (a password, an existing token,
/// etc) for a fresh token. The [Client](client/struct.Client.html) calls it once when created
/// and then every time a service rejects the current token with 401 Unauthorized.
///
/// Implementations do not need to cache anything or guard against concurrent calls: the client
/// guarantees that at most one `issue_token` call is in flight at any time.
#[async_trait]
pub trait AuthType: fmt::Debug + Sync + Send {
    /// Request a new token.
    async fn issue_token(&self, client: &Client) -> Result<AuthToken, Error>;
}

assert_obj_safe!(AuthType);

/// An authentication token with its metadata.
#[derive(Clone)]
pub struct AuthToken {
    value: String,
    expires_at: Option<DateTime<FixedOffset>>,
    catalog: Vec<CatalogRecord>,
}

assert_impl_all!(AuthToken: Send, Sync);

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut hasher = DefaultHasher::new();
        self.value.hash(&mut hasher);
        write!(
            f,
            "AuthToken {{ value: hash({}), expires_at: {:?}, catalog: {} services }}",
            hasher.finish(),
            self.expires_at,
            self.catalog.len()
        )
    }
}

impl AuthToken {
    /// Create a token from its value.
    pub fn new<S: Into<String>>(value: S) -> AuthToken {
        AuthToken {
            value: value.into(),
            expires_at: None,
            catalog: Vec::new(),
        }
    }

    /// Add an expiration time.
    #[inline]
    pub fn with_expires_at(mut self, expires_at: DateTime<FixedOffset>) -> AuthToken {
        self.expires_at = Some(expires_at);
        self
    }

    /// Add a service catalog.
    #[inline]
    pub fn with_catalog(mut self, catalog: Vec<CatalogRecord>) -> AuthToken {
        self.catalog = catalog;
        self
    }

    /// Token value to send in the `X-Auth-Token` header.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiration time (if known).
    #[inline]
    pub fn expires_at(&self) -> Option<&DateTime<FixedOffset>> {
        self.expires_at.as_ref()
    }

    /// Service catalog received with the token (can be empty).
    #[inline]
    pub fn catalog(&self) -> &[CatalogRecord] {
        &self.catalog
    }
}

#[cfg(test)]
pub mod test {
    use super::AuthToken;

    #[test]
    fn test_debug_hides_value() {
        let token = AuthToken::new("super-secret");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("hash("));
    }

    #[test]
    fn test_accessors() {
        let expires = chrono::DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z").unwrap();
        let token = AuthToken::new("abcd").with_expires_at(expires);
        assert_eq!(token.value(), "abcd");
        assert_eq!(token.expires_at(), Some(&expires));
        assert!(token.catalog().is_empty());
    }
}
