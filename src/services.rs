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

//! OpenStack service types.

use std::fmt::Debug;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::{ApiVersion, Error};

const API_VERSION_HEADER: &str = "openstack-api-version";

/// Trait representing a service type.
pub trait ServiceType: Debug + Send + Sync {
    /// Service type to look up in the catalog.
    fn catalog_type(&self) -> &'static str;

    /// Update the headers to request the API version.
    ///
    /// The default implementation sets the generic `OpenStack-API-Version` header.
    fn set_api_version_headers(
        &self,
        headers: &mut HeaderMap,
        version: ApiVersion,
    ) -> Result<(), Error> {
        let value = HeaderValue::from_str(&format!("{} {}", self.catalog_type(), version))?;
        let _ = headers.insert(HeaderName::from_static(API_VERSION_HEADER), value);
        Ok(())
    }
}

/// A generic service.
///
/// Services that predate the generic microversion header also get their legacy header.
#[derive(Copy, Clone, Debug)]
pub struct GenericService {
    catalog_type: &'static str,
    legacy_version_header: Option<&'static str>,
}

impl GenericService {
    /// Create a new generic service.
    pub const fn new(catalog_type: &'static str) -> GenericService {
        GenericService {
            catalog_type,
            legacy_version_header: None,
        }
    }

    /// Create a service that also accepts a legacy API version header.
    ///
    /// The header name must be lowercase.
    pub const fn with_legacy_version_header(
        catalog_type: &'static str,
        header: &'static str,
    ) -> GenericService {
        GenericService {
            catalog_type,
            legacy_version_header: Some(header),
        }
    }
}

impl ServiceType for GenericService {
    fn catalog_type(&self) -> &'static str {
        self.catalog_type
    }

    fn set_api_version_headers(
        &self,
        headers: &mut HeaderMap,
        version: ApiVersion,
    ) -> Result<(), Error> {
        let value = HeaderValue::from_str(&format!("{} {}", self.catalog_type, version))?;
        let _ = headers.insert(HeaderName::from_static(API_VERSION_HEADER), value);
        if let Some(legacy) = self.legacy_version_header {
            let _ = headers.insert(
                HeaderName::from_static(legacy),
                HeaderValue::from_str(&version.to_string())?,
            );
        }
        Ok(())
    }
}

/// Bare Metal service.
pub const BAREMETAL: GenericService =
    GenericService::with_legacy_version_header("baremetal", "x-openstack-ironic-api-version");

/// Block Storage service (v3).
pub const BLOCK_STORAGE: GenericService = GenericService::new("volumev3");

/// Compute service.
pub const COMPUTE: GenericService =
    GenericService::with_legacy_version_header("compute", "x-openstack-nova-api-version");

/// DNS service.
pub const DNS: GenericService = GenericService::new("dns");

/// Identity service.
pub const IDENTITY: GenericService = GenericService::new("identity");

/// Image service.
pub const IMAGE: GenericService = GenericService::new("image");

/// Messaging service.
pub const MESSAGING: GenericService = GenericService::new("messaging");

/// Network service.
pub const NETWORK: GenericService = GenericService::new("network");

/// Object Storage service.
pub const OBJECT_STORAGE: GenericService = GenericService::new("object-store");

/// Placement service.
pub const PLACEMENT: GenericService = GenericService::new("placement");
