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

//! Typed query strings.

use std::borrow::Cow;
use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::ser::{Error as SerError, SerializeSeq};
use serde::{Serialize, Serializer};

use super::{Error, ErrorKind};

/// An item in a query.
pub trait QueryItem {
    /// Represent the item for serialization into a query.
    ///
    /// The first item of the resulting tuple is a key, the second - its value.
    fn query_item(&self) -> Result<(&str, Cow<str>), Error>;
}

/// A typed query: a list of items, keys may repeat.
///
/// ```rust
/// use std::borrow::Cow;
/// use osclient::{Error, Query, QueryItem};
///
/// #[derive(Debug)]
/// enum ServerFilter {
///     Name(String),
///     Deleted(bool),
///     Limit(usize),
/// }
///
/// impl QueryItem for ServerFilter {
///     fn query_item(&self) -> Result<(&str, Cow<str>), Error> {
///         Ok(match self {
///             ServerFilter::Name(s) => ("name", Cow::Borrowed(s)),
///             ServerFilter::Deleted(b) => ("deleted", Cow::Owned(b.to_string())),
///             ServerFilter::Limit(n) => ("limit", Cow::Owned(n.to_string())),
///         })
///     }
/// }
///
/// let query = Query::default()
///     .with(ServerFilter::Deleted(false))
///     .with(ServerFilter::Name("web".into()))
///     .with(ServerFilter::Limit(50));
/// assert_eq!(query.to_query_string().unwrap(), "deleted=false&name=web&limit=50");
/// ```
#[derive(Debug, Clone)]
pub struct Query<T>(pub Vec<T>);

impl<T> Default for Query<T> {
    fn default() -> Query<T> {
        Query(Vec::new())
    }
}

impl<T> Query<T> {
    /// Add a query item.
    #[inline]
    pub fn with(mut self, item: T) -> Self {
        self.0.push(item);
        self
    }
}

impl<T: QueryItem> Query<T> {
    /// Encode the query as `application/x-www-form-urlencoded`.
    pub fn to_query_string(&self) -> Result<String, Error> {
        to_query_string(self)
    }
}

impl<T> Deref for Query<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.0
    }
}

impl<T> DerefMut for Query<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.0
    }
}

impl<T> Serialize for Query<T>
where
    T: QueryItem,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for e in &self.0 {
            let item = e.query_item().map_err(SerError::custom)?;
            seq.serialize_element(&item)?;
        }
        seq.end()
    }
}

/// Sorting direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl fmt::Display for SortDir {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        })
    }
}

/// Query items understood by most paginated OpenStack collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonQuery {
    /// Maximum number of items per page.
    Limit(usize),
    /// Start after the item with this marker.
    Marker(String),
    /// Field to sort by.
    SortKey(String),
    /// Sorting direction.
    SortDir(SortDir),
}

impl QueryItem for CommonQuery {
    fn query_item(&self) -> Result<(&str, Cow<str>), Error> {
        Ok(match self {
            CommonQuery::Limit(n) => ("limit", Cow::Owned(n.to_string())),
            CommonQuery::Marker(s) => ("marker", Cow::Borrowed(s)),
            CommonQuery::SortKey(s) => ("sort_key", Cow::Borrowed(s)),
            CommonQuery::SortDir(d) => ("sort_dir", Cow::Owned(d.to_string())),
        })
    }
}

/// Encode any serializable value as a query string.
pub(crate) fn to_query_string<Q: Serialize + ?Sized>(query: &Q) -> Result<String, Error> {
    serde_urlencoded::to_string(query).map_err(|e| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("Cannot encode query string: {}", e),
        )
    })
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[derive(Debug)]
    enum NodeFilter {
        Driver(String),
        Maintenance(bool),
        Invalid,
    }

    impl QueryItem for NodeFilter {
        fn query_item(&self) -> Result<(&str, Cow<str>), Error> {
            match self {
                NodeFilter::Driver(s) => Ok(("driver", Cow::Borrowed(s))),
                NodeFilter::Maintenance(b) => Ok(("maintenance", b.to_string().into())),
                NodeFilter::Invalid => Err(Error::new(ErrorKind::InvalidInput, "invalid item")),
            }
        }
    }

    #[test]
    fn test_query() {
        let mut q = Query::default();
        q.push(NodeFilter::Maintenance(true));
        q.push(NodeFilter::Driver("ipmi".into()));
        q.push(NodeFilter::Driver("redfish".into()));
        assert_eq!(
            q.to_query_string().unwrap(),
            "maintenance=true&driver=ipmi&driver=redfish"
        );
    }

    #[test]
    fn test_query_empty() {
        let q: Query<NodeFilter> = Query::default();
        assert_eq!(q.to_query_string().unwrap(), "");
    }

    #[test]
    fn test_query_invalid_item() {
        let q = Query::default().with(NodeFilter::Invalid);
        let err = q.to_query_string().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_common_query() {
        let q = Query::default()
            .with(CommonQuery::Limit(2))
            .with(CommonQuery::SortKey("created_at".into()))
            .with(CommonQuery::SortDir(SortDir::Desc))
            .with(CommonQuery::Marker("a b".into()));
        assert_eq!(
            q.to_query_string().unwrap(),
            "limit=2&sort_key=created_at&sort_dir=desc&marker=a+b"
        );
    }
}
