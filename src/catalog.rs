// Copyright 2017 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Low-level code to work with the service catalog.

use log::{debug, error};
use reqwest::Url;

use super::identity::{CatalogRecord, Endpoint};
use super::{EndpointFilters, Error, ErrorKind};

fn not_found(service_type: &str, filters: &EndpointFilters) -> Error {
    Error::new(
        ErrorKind::EndpointNotFound,
        format!(
            "Endpoint for service {} was not found (interfaces {:?}, region {:?})",
            service_type,
            filters.interfaces(),
            filters.region()
        ),
    )
}

/// Find the best matching endpoint in the service catalog.
pub fn find_endpoint<'c>(
    catalog: &'c [CatalogRecord],
    service_type: &str,
    filters: &EndpointFilters,
) -> Result<&'c Endpoint, Error> {
    let svc = catalog
        .iter()
        .find(|x| x.service_type == service_type)
        .ok_or_else(|| not_found(service_type, filters))?;

    svc.endpoints
        .iter()
        .filter_map(|endp| filters.priority(endp).map(|prio| (prio, endp)))
        .min_by_key(|(prio, _)| *prio)
        .map(|(_, endp)| endp)
        .ok_or_else(|| not_found(service_type, filters))
}

/// Extract a URL from the service catalog.
pub fn extract_url(
    catalog: &[CatalogRecord],
    service_type: &str,
    filters: &EndpointFilters,
) -> Result<Url, Error> {
    let endp = find_endpoint(catalog, service_type, filters)?;
    debug!("Received {:?} for {}", endp, service_type);
    Url::parse(&endp.url).map_err(|e| {
        error!(
            "Invalid URL {} received from service catalog for service '{}', \
             filters {:?}: {}",
            endp.url, service_type, filters, e
        );
        Error::new(
            ErrorKind::InvalidResponse,
            format!("Invalid URL {} for {}: {}", endp.url, service_type, e),
        )
    })
}
