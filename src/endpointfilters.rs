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

//! Endpoint filters for looking up endpoints.

use std::fmt;
use std::str::FromStr;

use super::{Error, ErrorKind};
use crate::identity::Endpoint;

/// Interface type: public, internal or admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterfaceType {
    /// Public interface (used by default).
    #[default]
    Public,
    /// Internal interface.
    Internal,
    /// Administrator interface.
    Admin,
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            InterfaceType::Public => "public",
            InterfaceType::Internal => "internal",
            InterfaceType::Admin => "admin",
        })
    }
}

impl FromStr for InterfaceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" | "publicURL" => Ok(InterfaceType::Public),
            "internal" | "internalURL" => Ok(InterfaceType::Internal),
            "admin" | "adminURL" => Ok(InterfaceType::Admin),
            other => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Unknown interface type: {}", other),
            )),
        }
    }
}

/// Endpoint filters for looking up endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointFilters {
    interfaces: Vec<InterfaceType>,
    region: Option<String>,
}

impl Default for EndpointFilters {
    /// Public interface in any region.
    fn default() -> EndpointFilters {
        EndpointFilters {
            interfaces: vec![InterfaceType::Public],
            region: None,
        }
    }
}

impl EndpointFilters {
    /// Create filters with interfaces (in the priority order) and region.
    pub fn new<I, S>(interfaces: I, region: S) -> EndpointFilters
    where
        I: IntoIterator<Item = InterfaceType>,
        S: Into<String>,
    {
        EndpointFilters::default()
            .with_interfaces(interfaces)
            .with_region(region)
    }

    /// Acceptable interfaces, the most preferred first.
    #[inline]
    pub fn interfaces(&self) -> &[InterfaceType] {
        &self.interfaces
    }

    /// Region (if any).
    #[inline]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Set acceptable interfaces, the most preferred first.
    ///
    /// Duplicates are ignored. An empty list resets to the default (public).
    pub fn set_interfaces<I>(&mut self, interfaces: I)
    where
        I: IntoIterator<Item = InterfaceType>,
    {
        self.interfaces.clear();
        for item in interfaces {
            if !self.interfaces.contains(&item) {
                self.interfaces.push(item);
            }
        }
        if self.interfaces.is_empty() {
            self.interfaces.push(InterfaceType::Public);
        }
    }

    /// Set the region.
    #[inline]
    pub fn set_region<S: Into<String>>(&mut self, region: S) {
        self.region = Some(region.into());
    }

    /// Add acceptable interfaces.
    #[inline]
    pub fn with_interfaces<I>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = InterfaceType>,
    {
        self.set_interfaces(interfaces);
        self
    }

    /// Add a region.
    #[inline]
    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.set_region(region);
        self
    }

    /// Priority of the endpoint (lower is better) or `None` if it does not match.
    pub(crate) fn priority(&self, endpoint: &Endpoint) -> Option<usize> {
        if let Some(ref region) = self.region {
            if endpoint.region.as_deref() != Some(region.as_str()) {
                return None;
            }
        }

        let interface = InterfaceType::from_str(&endpoint.interface).ok()?;
        self.interfaces.iter().position(|x| *x == interface)
    }
}

#[cfg(test)]
pub mod test {
    use std::str::FromStr;

    use super::{EndpointFilters, InterfaceType};
    use crate::identity::Endpoint;

    fn endpoint(interface: &str, region: Option<&str>) -> Endpoint {
        Endpoint {
            interface: interface.to_string(),
            region: region.map(String::from),
            url: "http://example.com".to_string(),
        }
    }

    #[test]
    fn test_interface_type_from_str() {
        assert_eq!(
            InterfaceType::from_str("internalURL").unwrap(),
            InterfaceType::Internal
        );
        assert_eq!(InterfaceType::from_str("admin").unwrap(), InterfaceType::Admin);
        assert!(InterfaceType::from_str("private").is_err());
    }

    #[test]
    fn test_defaults() {
        let filters = EndpointFilters::default();
        assert_eq!(filters.interfaces(), &[InterfaceType::Public]);
        assert_eq!(filters.region(), None);
    }

    #[test]
    fn test_set_interfaces_dedup() {
        let filters = EndpointFilters::default().with_interfaces(vec![
            InterfaceType::Internal,
            InterfaceType::Public,
            InterfaceType::Internal,
        ]);
        assert_eq!(
            filters.interfaces(),
            &[InterfaceType::Internal, InterfaceType::Public]
        );
        let filters = filters.with_interfaces(Vec::new());
        assert_eq!(filters.interfaces(), &[InterfaceType::Public]);
    }

    #[test]
    fn test_priority() {
        let filters = EndpointFilters::new(
            vec![InterfaceType::Internal, InterfaceType::Public],
            "RegionOne",
        );
        assert_eq!(filters.priority(&endpoint("internal", Some("RegionOne"))), Some(0));
        assert_eq!(filters.priority(&endpoint("public", Some("RegionOne"))), Some(1));
        assert_eq!(filters.priority(&endpoint("admin", Some("RegionOne"))), None);
        assert_eq!(filters.priority(&endpoint("public", Some("RegionTwo"))), None);
        assert_eq!(filters.priority(&endpoint("public", None)), None);
    }
}
