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

//! Authentication using Identity API v3.
//!
//! Supports [Password](struct.Password.html) and [Token](struct.Token.html) authentication.
//! Both can be used as the re-authentication method of a [Client](../struct.Client.html).
//! Identity API v2 is not supported.

mod internal;
mod password;
pub(crate) mod protocol;
mod token;

use reqwest::Url;

pub use self::password::Password;
pub use self::protocol::{CatalogRecord, Endpoint};
pub use self::token::Token;
pub use crate::common::IdOrName;

pub(crate) const MISSING_SUBJECT_HEADER: &str = "Missing X-Subject-Token header";
pub(crate) const INVALID_SUBJECT_HEADER: &str = "Invalid X-Subject-Token header";

/// A scope of a token.
///
/// Only project scopes are currently supported.
#[derive(Debug, Clone)]
pub enum Scope {
    /// A token scoped to a project.
    Project {
        /// Project ID or name.
        project: IdOrName,
        /// ID or name of the project domain.
        domain: Option<IdOrName>,
    },
}

/// Generic trait for authentication using Identity API V3.
pub trait Identity {
    /// Get a reference to the auth URL.
    fn auth_url(&self) -> &Url;
}
