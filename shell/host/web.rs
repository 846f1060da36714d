/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Browser document host and the JS-facing shell handle.
//!
//! Expects the workspace page layout: `#content-area`, `#iframe-container`,
//! `#welcome-screen`, `#loading`, `#tab-container`, `#tab-scroll-left`,
//! `#tab-scroll-right` and `#tab-count`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use futures_channel::oneshot;
use futures_util::FutureExt;
use futures_util::future::{self, LocalBoxFuture};
use js_sys::{Function, Promise};
use log::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise, spawn_local};
use web_sys::{Document, Element, HtmlElement, HtmlIFrameElement, HtmlScriptElement, Window};

use crate::model::page::ScriptRecord;
use crate::model::tab::{DropPosition, TabId};
use crate::prefs::ShellPrefs;
use crate::services::page_fetch::HttpPageFetcher;
use crate::shell::host::{
    ContentView, DocumentHost, FrameHandle, HostError, InjectedResource, NodeHandle, Notice,
    NoticeLevel, ResourceTag,
};
use crate::shell::lifecycle::CleanupError;
use crate::shell::tab_controller::{ShellHandle, Shortcut};
use crate::shell::workbench::tab_bar::{
    ScrollButton, TabExtent, TabItem, TabStripFrame, TabStripMetrics,
};
use crate::with_shell;

const CONTENT_AREA: &str = "content-area";
const FRAME_CONTAINER: &str = "iframe-container";
const WELCOME_SCREEN: &str = "welcome-screen";
const LOADING: &str = "loading";
const TAB_CONTAINER: &str = "tab-container";
const SCROLL_LEFT: &str = "tab-scroll-left";
const SCROLL_RIGHT: &str = "tab-scroll-right";
const TAB_COUNT: &str = "tab-count";

const ESTIMATED_TAB_WIDTH: f32 = 120.0;
const TOAST_LIFETIME_MS: i32 = 3_000;

pub struct WebDocument {
    window: Window,
    document: Document,
    nodes: RefCell<HashMap<NodeHandle, Element>>,
    frames: RefCell<HashMap<FrameHandle, HtmlIFrameElement>>,
    next_handle: Cell<u64>,
}

impl WebDocument {
    pub fn new() -> Result<Self, HostError> {
        let window = web_sys::window().ok_or(HostError::MissingElement("window"))?;
        let document = window
            .document()
            .ok_or(HostError::MissingElement("document"))?;
        Ok(Self {
            window,
            document,
            nodes: RefCell::new(HashMap::new()),
            frames: RefCell::new(HashMap::new()),
            next_handle: Cell::new(0),
        })
    }

    fn next_handle(&self) -> u64 {
        let next = self.next_handle.get() + 1;
        self.next_handle.set(next);
        next
    }

    fn element(&self, id: &'static str) -> Result<HtmlElement, HostError> {
        self.document
            .get_element_by_id(id)
            .and_then(|element| element.dyn_into::<HtmlElement>().ok())
            .ok_or(HostError::MissingElement(id))
    }

    fn create(&self, tag: &str) -> Result<Element, HostError> {
        self.document.create_element(tag).map_err(dom_error)
    }

    fn set_hidden(&self, id: &'static str, hidden: bool) {
        if let Ok(element) = self.element(id) {
            element.set_hidden(hidden);
        }
    }

    fn show_only(&self, visible: &'static str) {
        for id in [CONTENT_AREA, FRAME_CONTAINER, WELCOME_SCREEN, LOADING] {
            self.set_hidden(id, id != visible);
        }
    }

    fn render_failure(&self, id: &TabId, message: &str, retryable: bool) -> Result<(), HostError> {
        let area = self.element(CONTENT_AREA)?;
        area.set_inner_html("");
        let panel = self.create("div")?;
        panel.set_class_name("page-error");
        let text = self.create("p")?;
        text.set_text_content(Some(message));
        panel.append_child(&text).map_err(dom_error)?;
        if retryable {
            let button = self.create("button")?;
            button.set_text_content(Some("Retry"));
            button
                .set_attribute("data-action", "retry")
                .map_err(dom_error)?;
            button
                .set_attribute("data-tab-id", id.as_str())
                .map_err(dom_error)?;
            panel.append_child(&button).map_err(dom_error)?;
        }
        area.append_child(&panel).map_err(dom_error)?;
        Ok(())
    }

    fn render_tab(&self, container: &HtmlElement, item: &TabItem) -> Result<(), HostError> {
        let tab = self.create("div")?;
        tab.set_class_name(if item.active { "tab active" } else { "tab" });
        tab.set_attribute("data-tab-id", item.id.as_str())
            .map_err(dom_error)?;
        tab.set_attribute("draggable", "true").map_err(dom_error)?;

        let title = self.create("span")?;
        title.set_class_name("tab-title");
        title.set_text_content(Some(&item.title));
        tab.append_child(&title).map_err(dom_error)?;

        if item.closable {
            let close = self.create("button")?;
            close.set_class_name("tab-close");
            close.set_text_content(Some("\u{00d7}"));
            close
                .set_attribute("data-action", "close")
                .map_err(dom_error)?;
            close
                .set_attribute("data-tab-id", item.id.as_str())
                .map_err(dom_error)?;
            tab.append_child(&close).map_err(dom_error)?;
        }
        container.append_child(&tab).map_err(dom_error)?;
        Ok(())
    }

    fn render_scroll_button(&self, id: &'static str, button: ScrollButton) {
        let Ok(element) = self.element(id) else {
            return;
        };
        element.set_hidden(!button.visible);
        let style = element.style();
        let _ = style.set_property("opacity", &button.opacity.to_string());
        let _ = if button.enabled {
            element.remove_attribute("disabled")
        } else {
            element.set_attribute("disabled", "")
        };
    }

    fn dismiss_later(&self, toast: Element) {
        let remove = Closure::once_into_js(move || toast.remove());
        let scheduled = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                remove.unchecked_ref(),
                TOAST_LIFETIME_MS,
            );
        if scheduled.is_err() {
            warn!("cannot schedule toast removal");
        }
    }
}

fn dom_error(err: JsValue) -> HostError {
    HostError::Dom(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

impl DocumentHost for WebDocument {
    fn inject(
        &self,
        tag: ResourceTag<'_>,
        resource: InjectedResource<'_>,
    ) -> Result<NodeHandle, HostError> {
        let element = match resource {
            InjectedResource::Style { css } => {
                let style = self.create("style")?;
                style.set_text_content(Some(css));
                style
            },
            InjectedResource::Script(record) => {
                let script = self
                    .create("script")?
                    .dyn_into::<HtmlScriptElement>()
                    .map_err(|_| HostError::Dom("not a script element".into()))?;
                // Keep execution in source order.
                script.set_async(false);
                match record {
                    ScriptRecord::External { src } => script.set_src(src),
                    ScriptRecord::Inline { content } => {
                        script.set_text(content).map_err(dom_error)?;
                    },
                }
                script.into()
            },
        };
        element
            .set_attribute("data-page", tag.owner.as_str())
            .map_err(dom_error)?;
        element
            .set_attribute("data-page-index", &tag.index.to_string())
            .map_err(dom_error)?;

        let head = self
            .document
            .head()
            .ok_or(HostError::MissingElement("head"))?;
        head.append_child(&element).map_err(dom_error)?;

        let handle = NodeHandle(self.next_handle());
        self.nodes.borrow_mut().insert(handle, element);
        Ok(handle)
    }

    fn remove_node(&self, node: NodeHandle) -> bool {
        let removed = self.nodes.borrow_mut().remove(&node);
        removed.map(|element| element.remove()).is_some()
    }

    fn set_content(&self, view: ContentView<'_>) {
        let rendered = match view {
            ContentView::Welcome => {
                self.show_only(WELCOME_SCREEN);
                Ok(())
            },
            ContentView::Loading { .. } => {
                self.show_only(LOADING);
                Ok(())
            },
            ContentView::Markup { html, .. } => self.element(CONTENT_AREA).map(|area| {
                area.set_inner_html(html);
                self.show_only(CONTENT_AREA);
            }),
            ContentView::Frames => {
                self.show_only(FRAME_CONTAINER);
                Ok(())
            },
            ContentView::Failed {
                id,
                message,
                retryable,
            } => self.render_failure(id, message, retryable).map(|()| {
                self.show_only(CONTENT_AREA);
            }),
        };
        if let Err(err) = rendered {
            warn!("cannot update content area: {err}");
        }
    }

    fn create_frame(&self, owner: &TabId, url: &str) -> Result<FrameHandle, HostError> {
        let container = self.element(FRAME_CONTAINER)?;
        let frame = self
            .create("iframe")?
            .dyn_into::<HtmlIFrameElement>()
            .map_err(|_| HostError::Dom("not an iframe element".into()))?;
        frame.set_src(url);
        frame
            .set_attribute("data-page", owner.as_str())
            .map_err(dom_error)?;
        frame.set_class_name("page-frame");
        frame.set_hidden(true);
        container.append_child(&frame).map_err(dom_error)?;

        let handle = FrameHandle(self.next_handle());
        self.frames.borrow_mut().insert(handle, frame);
        Ok(handle)
    }

    fn frame_loaded(&self, frame: FrameHandle) -> LocalBoxFuture<'static, Result<(), HostError>> {
        let Some(element) = self.frames.borrow().get(&frame).cloned() else {
            return future::ready(Err(HostError::Detached)).boxed_local();
        };
        let (sender, receiver) = oneshot::channel();
        let sender = Rc::new(RefCell::new(Some(sender)));

        let on_load = {
            let sender = Rc::clone(&sender);
            Closure::<dyn FnMut()>::new(move || {
                if let Some(sender) = sender.borrow_mut().take() {
                    let _ = sender.send(Ok(()));
                }
            })
        };
        let on_error = {
            let sender = Rc::clone(&sender);
            Closure::<dyn FnMut()>::new(move || {
                if let Some(sender) = sender.borrow_mut().take() {
                    let _ = sender.send(Err(HostError::FrameLoad("error event".into())));
                }
            })
        };
        element.set_onload(Some(on_load.as_ref().unchecked_ref()));
        element.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        async move {
            let outcome = receiver.await.unwrap_or(Err(HostError::Detached));
            element.set_onload(None);
            element.set_onerror(None);
            drop((on_load, on_error));
            outcome
        }
        .boxed_local()
    }

    fn set_frame_visible(&self, frame: FrameHandle, visible: bool) {
        if let Some(element) = self.frames.borrow().get(&frame) {
            element.set_hidden(!visible);
        }
    }

    fn remove_frame(&self, frame: FrameHandle) -> bool {
        let removed = self.frames.borrow_mut().remove(&frame);
        removed.map(|element| element.remove()).is_some()
    }

    fn measure_tab_strip(&self, ids: &[TabId]) -> TabStripMetrics {
        let Ok(container) = self.element(TAB_CONTAINER) else {
            return TabStripMetrics::default();
        };
        let mut rendered = HashMap::new();
        let children = container.children();
        for index in 0..children.length() {
            let Some(child) = children
                .item(index)
                .and_then(|child| child.dyn_into::<HtmlElement>().ok())
            else {
                continue;
            };
            if let Some(id) = child.get_attribute("data-tab-id") {
                rendered.insert(id, (child.offset_left() as f32, child.offset_width() as f32));
            }
        }

        // Tabs not rendered yet are laid out after the last known one.
        let mut cursor = 0.0_f32;
        let extents = ids
            .iter()
            .map(|id| {
                let (left, width) = rendered
                    .get(id.as_str())
                    .copied()
                    .unwrap_or((cursor, ESTIMATED_TAB_WIDTH));
                cursor = cursor.max(left + width);
                TabExtent {
                    id: id.clone(),
                    left,
                    width,
                }
            })
            .collect();
        TabStripMetrics {
            visible_width: container.client_width() as f32,
            extents,
        }
    }

    fn render_tab_strip(&self, frame: &TabStripFrame) {
        let Ok(container) = self.element(TAB_CONTAINER) else {
            return;
        };
        container.set_inner_html("");
        for item in &frame.items {
            if let Err(err) = self.render_tab(&container, item) {
                warn!("cannot render tab {}: {err}", item.id);
            }
        }
        container.set_scroll_left(frame.scroll_position.round() as i32);
        self.render_scroll_button(SCROLL_LEFT, frame.buttons.left);
        self.render_scroll_button(SCROLL_RIGHT, frame.buttons.right);

        if let Ok(count) = self.element(TAB_COUNT) {
            count.set_text_content(Some(&format!("{}/{}", frame.count.open, frame.count.max)));
            let level = serde_json::to_value(frame.count.level)
                .ok()
                .and_then(|level| level.as_str().map(str::to_owned))
                .unwrap_or_default();
            count.set_class_name(&format!("tab-count {level}"));
        }
    }

    fn set_title(&self, title: &str) {
        self.document.set_title(title);
    }

    fn notify(&self, notice: Notice) {
        let level = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        let Ok(toast) = self.create("div") else {
            return;
        };
        toast.set_class_name(&format!("toast toast-{level}"));
        toast.set_text_content(Some(&format!("{}: {}", notice.title, notice.message)));
        let Some(body) = self.document.body() else {
            return;
        };
        if body.append_child(&toast).is_ok() {
            self.dismiss_later(toast);
        }
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let window = self.window.clone();
        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let promise = Promise::new(&mut |resolve, _reject| {
            if window
                .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
                .is_err()
            {
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        async move {
            let _ = JsFuture::from(promise).await;
        }
        .boxed_local()
    }
}

fn to_js(value: &serde_json::Value) -> JsValue {
    js_sys::JSON::parse(&value.to_string()).unwrap_or(JsValue::NULL)
}

fn to_js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Shell handle exported to the page script.
#[wasm_bindgen]
pub struct TabShell {
    shell: ShellHandle,
}

#[wasm_bindgen]
impl TabShell {
    /// `prefs` is an optional TOML document; page and API requests go to the
    /// document's own origin unless it sets `endpoints.base_url`.
    #[wasm_bindgen(constructor)]
    pub fn new(prefs: Option<String>) -> Result<TabShell, JsValue> {
        let prefs = match prefs {
            Some(raw) => ShellPrefs::from_toml_str(&raw).map_err(to_js_error)?,
            None => ShellPrefs::default(),
        };
        prefs.validate().map_err(to_js_error)?;

        let host = Rc::new(WebDocument::new().map_err(to_js_error)?);
        let base = match prefs.base_url().map_err(to_js_error)? {
            Some(base) => base,
            None => {
                let origin = host.window.location().origin()?;
                url::Url::parse(&origin).map_err(to_js_error)?
            },
        };
        let fetcher = Rc::new(HttpPageFetcher::new(base));
        let shell = ShellHandle::build(&prefs, host, fetcher).map_err(to_js_error)?;
        debug!("tab shell attached with the {} strategy", shell.kind());
        Ok(Self { shell })
    }

    #[wasm_bindgen(js_name = loadMenu)]
    pub fn load_menu(&self, endpoint: String) -> Promise {
        let shell = self.shell.clone();
        future_to_promise(async move {
            let endpoint = url::Url::parse(&endpoint).map_err(to_js_error)?;
            let source = crate::services::menu_source::HttpMenuSource::new(endpoint);
            let origin = shell.load_menu(&source).await;
            Ok(JsValue::from_str(&format!("{origin:?}").to_lowercase()))
        })
    }

    #[wasm_bindgen(js_name = openTab)]
    pub fn open_tab(&self, id: String) -> Promise {
        let shell = self.shell.clone();
        future_to_promise(async move {
            shell.open_tab(&id).await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = closeTab)]
    pub fn close_tab(&self, id: String) -> Promise {
        let shell = self.shell.clone();
        future_to_promise(async move {
            shell.close_tab(&id).await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = closeAll)]
    pub fn close_all(&self) -> Promise {
        let shell = self.shell.clone();
        future_to_promise(async move { Ok(JsValue::from(shell.close_all().await as u32)) })
    }

    pub fn retry(&self, id: String) -> Promise {
        let shell = self.shell.clone();
        future_to_promise(async move {
            shell.retry(&id).await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Returns whether the key was a shell shortcut.
    #[wasm_bindgen(js_name = handleKey)]
    pub fn handle_key(&self, ctrl: bool, key: String) -> bool {
        let Some(shortcut) = Shortcut::from_key(ctrl, &key) else {
            return false;
        };
        let shell = self.shell.clone();
        spawn_local(async move {
            if let Err(err) = shell.handle_shortcut(shortcut).await {
                debug!("{shortcut:?} did nothing: {err}");
            }
        });
        true
    }

    pub fn reorder(&self, dragged: String, target: String, after: bool) -> Result<(), JsValue> {
        let position = if after {
            DropPosition::After
        } else {
            DropPosition::Before
        };
        with_shell!(&self.shell, shell => shell.reorder(&dragged, &target, position))
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = scrollTabsLeft)]
    pub fn scroll_tabs_left(&self) -> f32 {
        with_shell!(&self.shell, shell => shell.scroll_tabs_left())
    }

    #[wasm_bindgen(js_name = scrollTabsRight)]
    pub fn scroll_tabs_right(&self) -> f32 {
        with_shell!(&self.shell, shell => shell.scroll_tabs_right())
    }

    #[wasm_bindgen(js_name = scrollTabsByWheel)]
    pub fn scroll_tabs_by_wheel(&self, delta: f32) -> f32 {
        with_shell!(&self.shell, shell => shell.scroll_tabs_by_wheel(delta))
    }

    pub fn relayout(&self) {
        with_shell!(&self.shell, shell => shell.relayout())
    }

    /// Run `callback` when `id`'s page is torn down. A thrown exception is
    /// logged and does not stop the teardown.
    #[wasm_bindgen(js_name = registerCleanup)]
    pub fn register_cleanup(&self, id: String, callback: Function) {
        self.shell.register_cleanup(&id, move || {
            callback
                .call0(&JsValue::NULL)
                .map(drop)
                .map_err(|err| CleanupError(format!("{err:?}")))
        });
    }

    pub fn status(&self) -> JsValue {
        to_js(&self.shell.status_json())
    }

    pub fn list(&self) -> Vec<String> {
        self.shell
            .cached_ids()
            .into_iter()
            .map(|id| id.as_str().to_owned())
            .collect()
    }

    pub fn clear(&self) -> u32 {
        self.shell.clear_cache() as u32
    }

    pub fn remove(&self, id: String) -> Promise {
        let shell = self.shell.clone();
        future_to_promise(async move {
            let existed = with_shell!(&shell, shell => shell.debug().remove(&id).await);
            Ok(JsValue::from_bool(existed))
        })
    }

    #[wasm_bindgen(js_name = setMaxCache)]
    pub fn set_max_cache(&self, capacity: u32) -> Result<(), JsValue> {
        with_shell!(&self.shell, shell => shell.set_max_cache(capacity as usize))
            .map_err(to_js_error)
    }
}
