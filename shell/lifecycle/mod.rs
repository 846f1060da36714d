/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Page materialization strategies and their resource bookkeeping.
//!
//! A [`PageMaterializer`] turns a [`PageSource`] into a cacheable payload
//! (`load`), makes a cached payload visible (`show`/`hide`) and reverses every
//! document side effect it caused (`teardown`). The shell owns the cache and
//! decides *when* these run; materializers only know *how*.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::model::page::PageSource;
use crate::model::tab::TabId;
use crate::services::page_fetch::FetchError;
use crate::shell::host::HostError;

pub mod cleanup;
pub mod frame;
pub mod injection;

pub use cleanup::{CleanupError, CleanupRegistry, CleanupReport};
pub use frame::FrameMaterializer;
pub use injection::InjectionMaterializer;

pub const DEFAULT_FRAME_LOAD_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaterializerKind {
    /// Fetch fragments and inject their markup, scripts and styles.
    Injection,
    /// One isolated frame per page.
    #[default]
    Frame,
}

impl fmt::Display for MaterializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Injection => "injection",
            Self::Frame => "frame",
        })
    }
}

impl FromStr for MaterializerKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "injection" | "inject" => Ok(Self::Injection),
            "frame" | "iframe" => Ok(Self::Frame),
            other => Err(format!(
                "unknown materializer '{other}' (expected 'injection' or 'frame')"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    Fetch(FetchError),
    FetchTimeout { id: TabId, after: Duration },
    FrameLoad { id: TabId, reason: String },
    FrameTimeout { id: TabId, after: Duration },
    Host(HostError),
}

impl PageError {
    /// Frame failures are also surfaced as an error toast.
    pub fn is_frame_failure(&self) -> bool {
        matches!(self, Self::FrameLoad { .. } | Self::FrameTimeout { .. })
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "{err}"),
            Self::FetchTimeout { id, after } => {
                write!(f, "page '{id}' did not respond within {after:?}")
            },
            Self::FrameLoad { id, reason } => write!(f, "page '{id}' failed to load: {reason}"),
            Self::FrameTimeout { id, after } => {
                write!(f, "page '{id}' did not finish loading within {after:?}")
            },
            Self::Host(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::Host(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FetchError> for PageError {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

impl From<HostError> for PageError {
    fn from(err: HostError) -> Self {
        Self::Host(err)
    }
}

pub trait PageMaterializer {
    type Payload: Clone + 'static;

    fn kind(&self) -> MaterializerKind;

    /// Produce a payload for `source`. The returned future owns everything it
    /// needs so it can be shared between concurrent activations.
    fn load(
        &self,
        id: &TabId,
        source: &PageSource,
    ) -> LocalBoxFuture<'static, Result<Self::Payload, PageError>>;

    fn show(&mut self, id: &TabId, payload: &Self::Payload) -> Result<(), PageError>;

    fn hide(&mut self, id: &TabId, payload: &Self::Payload);

    /// Release everything recorded for `id`. Returns the number of document
    /// resources released; a second call for the same id returns 0.
    fn teardown(&mut self, id: &TabId, payload: Option<Self::Payload>) -> usize;

    /// Document resources currently attached for `id`.
    fn attached_resources(&self, id: &TabId) -> usize;

    /// Drop a payload that never made it into the cache.
    fn discard(&mut self, payload: Self::Payload);

    /// Whether a closed tab's page stays cached (unpinned) until evicted.
    fn retains_closed_pages(&self) -> bool;

    /// Whether `hide` stops the page, so its cleanup hooks must run on every
    /// switch away rather than only at teardown.
    fn releases_on_hide(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_aliases() {
        assert_eq!("iframe".parse(), Ok(MaterializerKind::Frame));
        assert_eq!(" Injection ".parse(), Ok(MaterializerKind::Injection));
        assert!("shadow".parse::<MaterializerKind>().is_err());
    }

    #[test]
    fn test_only_frame_errors_toast() {
        let id = TabId::from("a");
        assert!(
            PageError::FrameTimeout {
                id: id.clone(),
                after: DEFAULT_FRAME_LOAD_TIMEOUT
            }
            .is_frame_failure()
        );
        assert!(
            !PageError::FetchTimeout {
                id,
                after: DEFAULT_FETCH_TIMEOUT
            }
            .is_frame_failure()
        );
    }
}
