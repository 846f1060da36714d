/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Document model kept entirely in memory.
//!
//! Backs the headless driver and the tests. Frame loads complete immediately
//! by default; [`FrameLoadMode::Manual`] leaves them pending until
//! [`InMemoryDocument::finish_frame_load`] is called.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use futures_channel::oneshot;
use futures_util::FutureExt;
use futures_util::future::{self, LocalBoxFuture};

use crate::model::page::ScriptRecord;
use crate::model::tab::TabId;
use crate::shell::host::{
    ContentView, DocumentHost, FrameHandle, HostError, InjectedResource, NodeHandle, Notice,
    ResourceTag,
};
use crate::shell::workbench::tab_bar::{TabExtent, TabStripFrame, TabStripMetrics};

pub const DEFAULT_TAB_WIDTH: f32 = 120.0;
pub const DEFAULT_STRIP_WIDTH: f32 = 800.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadNodeKind {
    Style(String),
    Script(ScriptRecord),
}

impl HeadNodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Style(_) => "style",
            Self::Script(_) => "script",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadNode {
    pub handle: NodeHandle,
    pub owner: TabId,
    pub index: usize,
    pub kind: HeadNodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNode {
    pub handle: FrameHandle,
    pub owner: TabId,
    pub src: String,
    pub visible: bool,
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSnapshot {
    Welcome,
    Loading(TabId),
    Markup { id: TabId, html: String },
    Frames,
    Failed { id: TabId, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameLoadMode {
    #[default]
    Immediate,
    Manual,
    Fail,
}

#[derive(Default)]
struct DocumentState {
    next_handle: u64,
    head: Vec<HeadNode>,
    frames: BTreeMap<FrameHandle, FrameNode>,
    pending_loads: HashMap<FrameHandle, oneshot::Sender<Result<(), HostError>>>,
    content: Option<ContentSnapshot>,
    title: String,
    notices: Vec<Notice>,
    tab_strip: Option<TabStripFrame>,
    tab_widths: HashMap<TabId, f32>,
    injections_left: Option<usize>,
    content_detached: bool,
}

impl DocumentState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

pub struct InMemoryDocument {
    state: RefCell<DocumentState>,
    frame_load_mode: Cell<FrameLoadMode>,
    strip_width: Cell<f32>,
}

impl Default for InMemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(DocumentState::default()),
            frame_load_mode: Cell::new(FrameLoadMode::Immediate),
            strip_width: Cell::new(DEFAULT_STRIP_WIDTH),
        }
    }

    pub fn set_frame_load_mode(&self, mode: FrameLoadMode) {
        self.frame_load_mode.set(mode);
    }

    /// Resolve a pending frame load. Returns `false` if nothing was waiting.
    pub fn finish_frame_load(&self, frame: FrameHandle, result: Result<(), HostError>) -> bool {
        let mut state = self.state.borrow_mut();
        if result.is_ok()
            && let Some(node) = state.frames.get_mut(&frame)
        {
            node.loaded = true;
        }
        match state.pending_loads.remove(&frame) {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }

    /// Let `count` more injections succeed, then reject the rest.
    pub fn fail_injections_after(&self, count: usize) {
        self.state.borrow_mut().injections_left = Some(count);
    }

    /// Simulate a document without a content container.
    pub fn detach_content_area(&self) {
        self.state.borrow_mut().content_detached = true;
    }

    pub fn set_tab_width(&self, id: &str, width: f32) {
        self.state
            .borrow_mut()
            .tab_widths
            .insert(TabId::from(id), width);
    }

    pub fn set_strip_width(&self, width: f32) {
        self.strip_width.set(width);
    }

    pub fn head_nodes(&self) -> Vec<HeadNode> {
        self.state.borrow().head.clone()
    }

    pub fn nodes_owned_by(&self, id: &str) -> usize {
        self.state
            .borrow()
            .head
            .iter()
            .filter(|node| node.owner.as_str() == id)
            .count()
    }

    pub fn frames(&self) -> Vec<FrameNode> {
        self.state.borrow().frames.values().cloned().collect()
    }

    pub fn frame_for(&self, id: &str) -> Option<FrameNode> {
        self.state
            .borrow()
            .frames
            .values()
            .find(|node| node.owner.as_str() == id)
            .cloned()
    }

    pub fn visible_frames(&self) -> Vec<FrameHandle> {
        self.state
            .borrow()
            .frames
            .values()
            .filter(|node| node.visible)
            .map(|node| node.handle)
            .collect()
    }

    pub fn content(&self) -> ContentSnapshot {
        self.state
            .borrow()
            .content
            .clone()
            .unwrap_or(ContentSnapshot::Welcome)
    }

    pub fn title(&self) -> String {
        self.state.borrow().title.clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.state.borrow().notices.clone()
    }

    pub fn tab_strip(&self) -> Option<TabStripFrame> {
        self.state.borrow().tab_strip.clone()
    }
}

impl DocumentHost for InMemoryDocument {
    fn inject(
        &self,
        tag: ResourceTag<'_>,
        resource: InjectedResource<'_>,
    ) -> Result<NodeHandle, HostError> {
        let mut state = self.state.borrow_mut();
        if let Some(left) = state.injections_left.as_mut() {
            if *left == 0 {
                return Err(HostError::Dom("head rejected the element".into()));
            }
            *left -= 1;
        }
        let handle = NodeHandle(state.next_handle());
        let kind = match resource {
            InjectedResource::Style { css } => HeadNodeKind::Style(css.to_owned()),
            InjectedResource::Script(record) => HeadNodeKind::Script(record.clone()),
        };
        state.head.push(HeadNode {
            handle,
            owner: tag.owner.clone(),
            index: tag.index,
            kind,
        });
        Ok(handle)
    }

    fn remove_node(&self, node: NodeHandle) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.head.len();
        state.head.retain(|existing| existing.handle != node);
        state.head.len() != before
    }

    fn set_content(&self, view: ContentView<'_>) {
        let snapshot = match view {
            ContentView::Welcome => ContentSnapshot::Welcome,
            ContentView::Loading { id } => ContentSnapshot::Loading(id.clone()),
            ContentView::Markup { id, html } => ContentSnapshot::Markup {
                id: id.clone(),
                html: html.to_owned(),
            },
            ContentView::Frames => ContentSnapshot::Frames,
            ContentView::Failed { id, message, .. } => ContentSnapshot::Failed {
                id: id.clone(),
                message: message.to_owned(),
            },
        };
        self.state.borrow_mut().content = Some(snapshot);
    }

    fn create_frame(&self, owner: &TabId, url: &str) -> Result<FrameHandle, HostError> {
        let mut state = self.state.borrow_mut();
        if state.content_detached {
            return Err(HostError::MissingElement("content"));
        }
        let handle = FrameHandle(state.next_handle());
        state.frames.insert(
            handle,
            FrameNode {
                handle,
                owner: owner.clone(),
                src: url.to_owned(),
                visible: false,
                loaded: false,
            },
        );
        Ok(handle)
    }

    fn frame_loaded(&self, frame: FrameHandle) -> LocalBoxFuture<'static, Result<(), HostError>> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let Some(node) = state.frames.get_mut(&frame) else {
            return future::ready(Err(HostError::Detached)).boxed_local();
        };
        match self.frame_load_mode.get() {
            FrameLoadMode::Immediate => {
                node.loaded = true;
                future::ready(Ok(())).boxed_local()
            },
            FrameLoadMode::Fail => {
                future::ready(Err(HostError::FrameLoad(format!("{} is unreachable", node.src))))
                    .boxed_local()
            },
            FrameLoadMode::Manual => {
                let (sender, receiver) = oneshot::channel();
                state.pending_loads.insert(frame, sender);
                receiver
                    .map(|outcome| outcome.unwrap_or(Err(HostError::Detached)))
                    .boxed_local()
            },
        }
    }

    fn set_frame_visible(&self, frame: FrameHandle, visible: bool) {
        if let Some(node) = self.state.borrow_mut().frames.get_mut(&frame) {
            node.visible = visible;
        }
    }

    fn remove_frame(&self, frame: FrameHandle) -> bool {
        let mut state = self.state.borrow_mut();
        state.pending_loads.remove(&frame);
        state.frames.remove(&frame).is_some()
    }

    fn measure_tab_strip(&self, ids: &[TabId]) -> TabStripMetrics {
        let state = self.state.borrow();
        let mut left = 0.0;
        let extents = ids
            .iter()
            .map(|id| {
                let width = state
                    .tab_widths
                    .get(id)
                    .copied()
                    .unwrap_or(DEFAULT_TAB_WIDTH);
                let extent = TabExtent {
                    id: id.clone(),
                    left,
                    width,
                };
                left += width;
                extent
            })
            .collect();
        TabStripMetrics {
            visible_width: self.strip_width.get(),
            extents,
        }
    }

    fn render_tab_strip(&self, frame: &TabStripFrame) {
        self.state.borrow_mut().tab_strip = Some(frame.clone());
    }

    fn set_title(&self, title: &str) {
        self.state.borrow_mut().title = title.to_owned();
    }

    fn notify(&self, notice: Notice) {
        self.state.borrow_mut().notices.push(notice);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed_local()
    }
}
