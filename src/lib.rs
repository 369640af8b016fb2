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

//! Asynchronous OpenStack client core: authenticated requests, pagination and result extraction.
//!
//! A [Client](struct.Client.html) holds the bearer token and, optionally, the authentication
//! method used to renew it. When the cloud rejects the token with 401, the client
//! re-authenticates once (a single renewal is shared by all concurrent requests) and retries the
//! request exactly once.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), osclient::Error> {
//! use osclient::{services, EndpointFilters, Pagination};
//!
//! let auth = osclient::identity::Password::new(
//!     "https://cloud.local/identity",
//!     "admin",
//!     "pa$$w0rd",
//!     "Default",
//! )?;
//! let client = osclient::Client::authenticate(reqwest::Client::new(), auth).await?;
//! let compute = client
//!     .service_client(services::COMPUTE, &EndpointFilters::default())
//!     .await?;
//!
//! let servers = compute
//!     .list(["servers"], "servers", Pagination::linked())?
//!     .all_pages()
//!     .await?
//!     .into_items()?;
//! println!("{} servers", servers.len());
//! # Ok(()) }
//! ```

#![crate_name = "osclient"]
#![crate_type = "lib"]
// NOTE: we do not use generic deny(warnings) to avoid breakages with new
// versions of the compiler. Add more warnings here as you discover them.
// Taken from https://github.com/rust-unofficial/patterns/
#![deny(
    dead_code,
    improper_ctypes,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    trivial_casts,
    trivial_numeric_casts,
    unconditional_recursion,
    unsafe_code,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_doc_comments,
    unused_import_braces,
    unused_parens,
    unused_qualifications,
    unused_results,
    while_true
)]
#![allow(
    clippy::new_ret_no_self,
    clippy::should_implement_trait,
    clippy::wrong_self_convention
)]

mod apiversion;
mod auth;
mod catalog;
mod client;
pub mod common;
mod config;
mod endpointfilters;
mod error;
pub mod extract;
pub mod identity;
pub mod pagination;
mod query;
mod reauth;
pub mod request;
mod service;
pub mod services;
#[cfg(feature = "stream")]
mod stream;
mod url;

pub use crate::apiversion::ApiVersion;
pub use crate::auth::{AuthToken, AuthType};
pub use crate::client::{Client, AUTH_HEADER, DEFAULT_USER_AGENT};
pub use crate::config::from_env;
pub use crate::endpointfilters::{EndpointFilters, InterfaceType};
pub use crate::error::{Error, ErrorKind};
pub use crate::extract::extract_into;
pub use crate::pagination::{LinkSource, Page, Pager, Pagination};
pub use crate::query::{CommonQuery, Query, QueryItem, SortDir};
pub use crate::request::{RequestOpts, Response, ToRequestBody};
pub use crate::service::ServiceClient;
