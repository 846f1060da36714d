/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The document the shell renders into.
//!
//! Every DOM side effect (injected scripts and styles, page frames, the content
//! area, the tab strip, toasts and timers) goes through [`DocumentHost`], so the
//! tab/page core runs unchanged against a real browser document or the
//! in-memory document used by tests and the headless driver.

use std::fmt;
use std::time::Duration;

use futures_util::future::LocalBoxFuture;

use crate::model::page::ScriptRecord;
use crate::model::tab::TabId;
use crate::shell::workbench::tab_bar::{TabStripFrame, TabStripMetrics};

#[cfg(not(target_arch = "wasm32"))]
pub mod memory;
#[cfg(target_arch = "wasm32")]
pub mod web;

/// Handle of a script or style element injected on behalf of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

/// Handle of a page frame element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(pub u64);

/// Owner tag written onto injected elements (`data-page` and its index).
#[derive(Debug, Clone, Copy)]
pub struct ResourceTag<'a> {
    pub owner: &'a TabId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy)]
pub enum InjectedResource<'a> {
    Style { css: &'a str },
    Script(&'a ScriptRecord),
}

#[derive(Debug, Clone, Copy)]
pub enum ContentView<'a> {
    Welcome,
    Loading { id: &'a TabId },
    Markup { id: &'a TabId, html: &'a str },
    Frames,
    Failed {
        id: &'a TabId,
        message: &'a str,
        retryable: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Non-blocking user-facing message (toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    MissingElement(&'static str),
    Dom(String),
    FrameLoad(String),
    Detached,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingElement(id) => write!(f, "document has no #{id} element"),
            Self::Dom(message) => write!(f, "DOM operation failed: {message}"),
            Self::FrameLoad(message) => write!(f, "frame failed to load: {message}"),
            Self::Detached => write!(f, "element was removed before it finished loading"),
        }
    }
}

impl std::error::Error for HostError {}

pub trait DocumentHost {
    /// Append a tagged script or style element to the document head.
    fn inject(
        &self,
        tag: ResourceTag<'_>,
        resource: InjectedResource<'_>,
    ) -> Result<NodeHandle, HostError>;

    /// Returns `false` when the node was already gone.
    fn remove_node(&self, node: NodeHandle) -> bool;

    fn set_content(&self, view: ContentView<'_>);

    /// Create a hidden frame for `owner` that starts loading `url`.
    fn create_frame(&self, owner: &TabId, url: &str) -> Result<FrameHandle, HostError>;

    /// Resolves on the frame's load event, or fails on its error event.
    fn frame_loaded(&self, frame: FrameHandle) -> LocalBoxFuture<'static, Result<(), HostError>>;

    fn set_frame_visible(&self, frame: FrameHandle, visible: bool);

    /// Returns `false` when the frame was already gone.
    fn remove_frame(&self, frame: FrameHandle) -> bool;

    fn measure_tab_strip(&self, ids: &[TabId]) -> TabStripMetrics;

    fn render_tab_strip(&self, frame: &TabStripFrame);

    fn set_title(&self, title: &str);

    fn notify(&self, notice: Notice);

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}
