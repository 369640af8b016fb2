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

//! Shared token state with single-flight renewal.
//!
//! Every renewal bumps a generation counter (epoch). A request remembers the epoch of the token
//! it was sent with. When it gets a 401, it waits for the renewal lock and compares epochs: if
//! somebody else has renewed the token in the meantime, the outcome of that renewal is reused
//! instead of calling the identity service again.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{Mutex, RwLock};

use super::{AuthToken, AuthType, Error, ErrorKind};

#[derive(Debug, Default)]
struct TokenState {
    token: Option<Arc<AuthToken>>,
    epoch: u64,
    failure: Option<Error>,
}

/// Token used for a request together with its epoch.
#[derive(Debug, Clone, Default)]
pub(crate) struct Snapshot {
    pub token: Option<Arc<AuthToken>>,
    pub epoch: u64,
}

#[derive(Debug)]
pub(crate) struct Reauthenticator {
    auth: Option<Arc<dyn AuthType>>,
    state: RwLock<TokenState>,
    renewal: Mutex<()>,
}

impl Reauthenticator {
    pub fn new(auth: Option<Arc<dyn AuthType>>, token: Option<AuthToken>) -> Reauthenticator {
        Reauthenticator {
            auth,
            state: RwLock::new(TokenState {
                token: token.map(Arc::new),
                ..TokenState::default()
            }),
            renewal: Mutex::new(()),
        }
    }

    /// Whether renewal is possible at all.
    #[inline]
    pub fn can_reauthenticate(&self) -> bool {
        self.auth.is_some()
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        Snapshot {
            token: state.token.clone(),
            epoch: state.epoch,
        }
    }

    /// Replace the token, e.g. with one obtained out of band.
    pub async fn set_token(&self, token: AuthToken) {
        let _guard = self.renewal.lock().await;
        let mut state = self.state.write().await;
        state.token = Some(Arc::new(token));
        state.epoch += 1;
        state.failure = None;
    }

    /// Renew the token unless it has already been renewed since `seen_epoch`.
    ///
    /// Concurrent callers with the same `seen_epoch` share one renewal and its outcome.
    pub async fn reauthenticate(
        &self,
        client: &reqwest::Client,
        seen_epoch: u64,
    ) -> Result<(), Error> {
        let auth = self.auth.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::AuthenticationFailed,
                "No authentication method to renew the token",
            )
        })?;

        let _guard = self.renewal.lock().await;
        {
            let state = self.state.read().await;
            if state.epoch != seen_epoch {
                debug!(
                    "Token has been renewed concurrently (epoch {} -> {})",
                    seen_epoch, state.epoch
                );
                return match state.failure {
                    Some(ref err) => Err(err.clone()),
                    None => Ok(()),
                };
            }
        }

        debug!("Renewing the authentication token (epoch {})", seen_epoch);
        let result = auth.issue_token(client).await;

        let mut state = self.state.write().await;
        state.epoch += 1;
        match result {
            Ok(token) => {
                debug!("Token renewed, new epoch is {}", state.epoch);
                state.token = Some(Arc::new(token));
                state.failure = None;
                Ok(())
            }
            Err(err) => {
                let err = err.wrap(ErrorKind::AuthenticationFailed, "Unable to re-authenticate");
                warn!("{}", err);
                state.failure = Some(err.clone());
                Err(err)
            }
        }
    }
}
