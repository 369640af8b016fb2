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

//! Pages and items as asynchronous streams.

use async_stream::try_stream;
use futures::pin_mut;
use futures::stream::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;

use super::pagination::{Page, Pager};
use super::Error;

impl Pager {
    /// Turn the pager into a stream of non-empty pages.
    ///
    /// The stream ends after the last page or after the first error.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Page, Error>> {
        try_stream! {
            while let Some(page) = self.advance().await? {
                if page.is_empty()? {
                    break;
                }
                yield page;
            }
        }
    }

    /// Turn the pager into a stream of decoded items.
    ///
    /// ```rust,no_run
    /// # async fn example(pager: osclient::Pager) -> Result<(), osclient::Error> {
    /// use futures::TryStreamExt;
    ///
    /// let ids: Vec<serde_json::Value> = pager.into_items().try_collect().await?;
    /// # Ok(()) }
    /// ```
    pub fn into_items<T>(self) -> impl Stream<Item = Result<T, Error>>
    where
        T: DeserializeOwned,
    {
        try_stream! {
            let pages = self.into_stream();
            pin_mut!(pages);
            while let Some(page) = pages.try_next().await? {
                for item in page.extract_items::<T>()? {
                    yield item;
                }
            }
        }
    }
}
