/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Menu retrieval with bounded retry and a built-in fallback.

use std::fmt;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use log::{info, warn};
use url::Url;

use crate::model::menu::{ApiMenu, MenuIndex};
use crate::shell::runtime::diagnostics::{DiagnosticEvent, emit_event};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuLoadError {
    Transport(String),
    Status(u16),
    Decode(String),
    Empty,
}

impl fmt::Display for MenuLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "menu request failed: {message}"),
            Self::Status(status) => write!(f, "menu request returned HTTP {status}"),
            Self::Decode(message) => write!(f, "menu response is not valid JSON: {message}"),
            Self::Empty => write!(f, "menu response contained no entries"),
        }
    }
}

impl std::error::Error for MenuLoadError {}

/// Where the menu in use came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOrigin {
    Remote,
    Fallback,
}

pub trait MenuSource {
    fn fetch_menus(&self) -> LocalBoxFuture<'static, Result<Vec<ApiMenu>, MenuLoadError>>;
}

pub struct HttpMenuSource {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpMenuSource {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

impl MenuSource for HttpMenuSource {
    fn fetch_menus(&self) -> LocalBoxFuture<'static, Result<Vec<ApiMenu>, MenuLoadError>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        async move {
            let response = client
                .get(endpoint)
                .send()
                .await
                .map_err(|err| MenuLoadError::Transport(err.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(MenuLoadError::Status(status.as_u16()));
            }
            let body = response
                .text()
                .await
                .map_err(|err| MenuLoadError::Transport(err.to_string()))?;
            serde_json::from_str(&body).map_err(|err| MenuLoadError::Decode(err.to_string()))
        }
        .boxed_local()
    }
}

/// Menu source that always returns the same entries (or error).
pub struct StaticMenuSource {
    menus: Result<Vec<ApiMenu>, MenuLoadError>,
}

impl StaticMenuSource {
    pub fn new(menus: Result<Vec<ApiMenu>, MenuLoadError>) -> Self {
        Self { menus }
    }
}

impl MenuSource for StaticMenuSource {
    fn fetch_menus(&self) -> LocalBoxFuture<'static, Result<Vec<ApiMenu>, MenuLoadError>> {
        futures_util::future::ready(self.menus.clone()).boxed_local()
    }
}

const MENU_RETRY_MIN_DELAY: Duration = Duration::from_millis(250);
const MENU_RETRY_MAX_DELAY: Duration = Duration::from_secs(4);

/// Backoff delay before retry `attempt` (zero-based).
pub(crate) fn menu_retry_delay(attempt: usize) -> Duration {
    ExponentialBuilder::default()
        .with_min_delay(MENU_RETRY_MIN_DELAY)
        .with_max_delay(MENU_RETRY_MAX_DELAY)
        .with_factor(2.0)
        .with_max_times(attempt + 1)
        .build()
        .nth(attempt)
        .unwrap_or(MENU_RETRY_MAX_DELAY)
}

/// Fetch the menu, retrying up to `retries` extra times.
///
/// Never fails: when every attempt errors or returns nothing, the built-in
/// [`MenuIndex::fallback`] is used instead.
pub async fn load_menu_index<S>(
    source: &dyn MenuSource,
    retries: usize,
    sleep: S,
) -> (MenuIndex, MenuOrigin)
where
    S: Fn(Duration) -> LocalBoxFuture<'static, ()>,
{
    let mut attempt = 0;
    let last_error = loop {
        let result = source.fetch_menus().await.and_then(|menus| {
            if menus.is_empty() {
                Err(MenuLoadError::Empty)
            } else {
                Ok(menus)
            }
        });
        match result {
            Ok(menus) => {
                let index = MenuIndex::from_api(menus);
                info!("loaded {} menu roots", index.roots().len());
                return (index, MenuOrigin::Remote);
            },
            Err(err) if attempt < retries => {
                let delay = menu_retry_delay(attempt);
                warn!(
                    "menu load attempt {} failed ({err}); retrying in {delay:?}",
                    attempt + 1
                );
                sleep(delay).await;
                attempt += 1;
            },
            Err(err) => break err,
        }
    };

    warn!("menu unavailable, using built-in navigation: {last_error}");
    emit_event(DiagnosticEvent::MenuFallback {
        reason: last_error.to_string(),
    });
    (MenuIndex::fallback(), MenuOrigin::Fallback)
}
