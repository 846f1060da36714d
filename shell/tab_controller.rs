/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Tab and page coordinator.
//!
//! [`Shell`] ties the tab set, the page cache and a [`PageMaterializer`]
//! together. Every operation follows the same shape: mutate state under a
//! short `RefCell` borrow, release it, then perform host side effects and
//! teardowns. No borrow is held across an await or while page cleanup hooks
//! run, so hooks and host callbacks may call back into the shell.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, Shared};
use log::{debug, info, warn};

use crate::app::{ContentState, ShellState};
use crate::model::menu::MenuIndex;
use crate::model::page::PageSource;
use crate::model::tab::{DropPosition, TabId, TabOpen, TabSetError};
use crate::prefs::ShellPrefs;
use crate::services::menu_source::{MenuOrigin, MenuSource, load_menu_index};
use crate::services::page_cache::{CacheError, CacheStatus};
use crate::services::page_fetch::PageFetcher;
use crate::shell::host::{ContentView, DocumentHost, Notice};
use crate::shell::lifecycle::{
    CleanupError, CleanupRegistry, FrameMaterializer, InjectionMaterializer, MaterializerKind,
    PageError, PageMaterializer,
};
use crate::shell::runtime::debug_surface::DebugSurface;
use crate::shell::runtime::diagnostics::{DiagnosticEvent, emit_event};

const LOAD_FAILED_MESSAGE: &str = "This page could not be loaded.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    UnknownMenu(TabId),
    NotOpenable(TabId),
    Tabs(TabSetError),
    Page(PageError),
    Cache(CacheError),
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMenu(id) => write!(f, "no menu entry with id '{id}'"),
            Self::NotOpenable(id) => write!(f, "menu entry '{id}' is a group, not a page"),
            Self::Tabs(err) => write!(f, "{err}"),
            Self::Page(err) => write!(f, "{err}"),
            Self::Cache(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ShellError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tabs(err) => Some(err),
            Self::Page(err) => Some(err),
            Self::Cache(err) => Some(err),
            Self::UnknownMenu(_) | Self::NotOpenable(_) => None,
        }
    }
}

impl From<TabSetError> for ShellError {
    fn from(err: TabSetError) -> Self {
        Self::Tabs(err)
    }
}

impl From<PageError> for ShellError {
    fn from(err: PageError) -> Self {
        Self::Page(err)
    }
}

impl From<CacheError> for ShellError {
    fn from(err: CacheError) -> Self {
        Self::Cache(err)
    }
}

/// Keyboard shortcuts the shell handles itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Ctrl+W
    CloseActive,
    /// Ctrl+Tab
    NextTab,
}

impl Shortcut {
    pub fn from_key(ctrl: bool, key: &str) -> Option<Self> {
        if !ctrl {
            return None;
        }
        match key {
            "w" | "W" => Some(Self::CloseActive),
            "Tab" => Some(Self::NextTab),
            _ => None,
        }
    }
}

type SharedLoad<P> = Shared<LocalBoxFuture<'static, Result<P, PageError>>>;

struct ShellInner<M: PageMaterializer> {
    state: RefCell<ShellState<M::Payload>>,
    materializer: RefCell<M>,
    host: Rc<dyn DocumentHost>,
    cleanup: CleanupRegistry,
    in_flight: RefCell<HashMap<TabId, SharedLoad<M::Payload>>>,
    app_title: String,
    menu_retries: usize,
}

/// Cheap to clone; clones drive the same shell.
pub struct Shell<M: PageMaterializer> {
    inner: Rc<ShellInner<M>>,
}

impl<M: PageMaterializer> Clone for Shell<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Shell<InjectionMaterializer> {
    pub fn with_injection(
        prefs: &ShellPrefs,
        host: Rc<dyn DocumentHost>,
        fetcher: Rc<dyn PageFetcher>,
    ) -> Result<Self, ShellError> {
        let materializer =
            InjectionMaterializer::new(Rc::clone(&host), fetcher, prefs.fetch_timeout());
        Self::new(prefs, host, materializer)
    }
}

impl Shell<FrameMaterializer> {
    pub fn with_frames(prefs: &ShellPrefs, host: Rc<dyn DocumentHost>) -> Result<Self, ShellError> {
        let materializer = FrameMaterializer::new(Rc::clone(&host), prefs.frame_load_timeout());
        Self::new(prefs, host, materializer)
    }
}

impl<M: PageMaterializer + 'static> Shell<M> {
    pub fn new(
        prefs: &ShellPrefs,
        host: Rc<dyn DocumentHost>,
        materializer: M,
    ) -> Result<Self, ShellError> {
        let shell = Self {
            inner: Rc::new(ShellInner {
                state: RefCell::new(ShellState::new(prefs)?),
                materializer: RefCell::new(materializer),
                host,
                cleanup: CleanupRegistry::new(),
                in_flight: RefCell::new(HashMap::new()),
                app_title: prefs.app_title.clone(),
                menu_retries: prefs.menu_retries,
            }),
        };
        info!(
            "tab shell ready ({} strategy, {} cached pages, {} tabs)",
            shell.kind(),
            prefs.max_cached_pages,
            prefs.max_tabs
        );
        shell.show_welcome();
        Ok(shell)
    }

    pub fn kind(&self) -> MaterializerKind {
        self.inner.materializer.borrow().kind()
    }

    pub fn host(&self) -> &Rc<dyn DocumentHost> {
        &self.inner.host
    }

    /// Read-only access to the shell state.
    pub fn inspect<R>(&self, read: impl FnOnce(&ShellState<M::Payload>) -> R) -> R {
        read(&self.inner.state.borrow())
    }

    /// Read-only access to the materializer.
    pub fn inspect_materializer<R>(&self, read: impl FnOnce(&M) -> R) -> R {
        read(&self.inner.materializer.borrow())
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.inspect(|state| state.tabs.active().cloned())
    }

    pub fn open_tab_ids(&self) -> Vec<TabId> {
        self.inspect(|state| state.tabs.ids().cloned().collect())
    }

    pub fn content(&self) -> ContentState {
        self.inspect(|state| state.content().clone())
    }

    pub fn is_loading(&self, id: &str) -> bool {
        self.inner.in_flight.borrow().contains_key(id)
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.inspect(ShellState::cache_status)
    }

    pub fn cleanup_registry(&self) -> &CleanupRegistry {
        &self.inner.cleanup
    }

    /// Register a hook run when `id`'s page is torn down.
    pub fn register_cleanup<F>(&self, id: &str, hook: F)
    where
        F: FnOnce() -> Result<(), CleanupError> + 'static,
    {
        self.inner.cleanup.register(TabId::from(id), hook);
    }

    pub fn set_menu(&self, menu: MenuIndex) {
        self.inner.state.borrow_mut().menu = menu;
    }

    pub async fn load_menu(&self, source: &dyn MenuSource) -> MenuOrigin {
        let host = Rc::clone(&self.inner.host);
        let (menu, origin) =
            load_menu_index(source, self.inner.menu_retries, move |delay| host.sleep(delay)).await;
        self.set_menu(menu);
        origin
    }

    /// Open the menu destination `id` as a tab and activate it.
    pub async fn open_tab(&self, id: &str) -> Result<TabOpen, ShellError> {
        let source = {
            let state = self.inner.state.borrow();
            let entry = state
                .menu
                .find_by_id(id)
                .ok_or_else(|| ShellError::UnknownMenu(TabId::from(id)))?;
            PageSource::from_menu_entry(entry)
                .ok_or_else(|| ShellError::NotOpenable(TabId::from(id)))?
        };

        let opened = self.inner.state.borrow_mut().tabs.open(
            source.id.clone(),
            source.title.clone(),
            Some(source.location.clone()),
        );
        let opened = match opened {
            Ok(opened) => opened,
            Err(err @ TabSetError::LimitReached { max_tabs }) => {
                warn!("refusing to open {id}: {err}");
                emit_event(DiagnosticEvent::TabLimitRejected {
                    id: source.id.clone(),
                    max_tabs,
                });
                self.inner.host.notify(Notice::warning(
                    "Tab limit",
                    format!("At most {max_tabs} tabs can be open. Close a tab and try again."),
                ));
                return Err(err.into());
            },
            Err(err) => return Err(err.into()),
        };
        debug!("tab {id} {opened:?}");

        self.activate(id).await?;
        Ok(opened)
    }

    /// Make `id` the active tab and bring its page on screen, loading it on a
    /// cache miss.
    pub async fn activate(&self, id: &str) -> Result<(), ShellError> {
        let source = {
            let mut state = self.inner.state.borrow_mut();
            state.tabs.activate(id)?;
            let tab = state
                .tabs
                .active_tab()
                .ok_or_else(|| TabSetError::NotOpen(TabId::from(id)))?;
            let location = match &tab.url {
                Some(url) => Some(url.clone()),
                None => state
                    .menu
                    .find_by_id(id)
                    .and_then(|entry| entry.path.clone()),
            };
            let Some(location) = location else {
                return Err(ShellError::NotOpenable(TabId::from(id)));
            };
            PageSource {
                id: tab.id.clone(),
                title: tab.title.clone(),
                location,
            }
        };

        self.inner
            .host
            .set_title(&format!("{} - {}", source.title, self.inner.app_title));
        self.refresh_tab_strip(Some(&source.id));

        let cached = self.inner.state.borrow_mut().cache.get(id).cloned();
        if let Some(payload) = cached {
            debug!("cache hit for {id}");
            emit_event(DiagnosticEvent::PageCacheHit {
                id: source.id.clone(),
            });
            self.present(&source.id, &payload);
            return Ok(());
        }

        self.hide_shown();
        self.set_content(ContentState::Loading {
            id: source.id.clone(),
        });
        self.inner
            .host
            .set_content(ContentView::Loading { id: &source.id });

        match self.load_deduplicated(&source).await {
            Ok(payload) => {
                self.store_loaded(&source.id, payload);
                Ok(())
            },
            Err(err) => {
                self.surface_load_failure(&source.id, &err);
                Err(err.into())
            },
        }
    }

    pub async fn close_tab(&self, id: &str) -> Result<(), ShellError> {
        self.close_tab_with(id, false).await
    }

    /// Close `id` and drop its cached page even when the strategy would keep it.
    pub async fn close_tab_evicting(&self, id: &str) -> Result<(), ShellError> {
        self.close_tab_with(id, true).await
    }

    async fn close_tab_with(&self, id: &str, evict: bool) -> Result<(), ShellError> {
        let closed = self.inner.state.borrow_mut().tabs.close(id);
        let closed = match closed {
            Ok(closed) => closed,
            Err(err) => {
                debug!("close {id} refused: {err}");
                return Err(err.into());
            },
        };
        info!("closed tab {id}");

        if self.inner.state.borrow().is_shown(id) {
            self.hide_page(&closed.tab.id);
        }
        self.release_closed(&closed.tab.id, evict);

        if closed.was_active {
            self.refocus(closed.next_active).await;
        } else {
            self.refresh_tab_strip(None);
        }
        Ok(())
    }

    /// Close every tab the last-tab policy and permanent tabs allow.
    pub async fn close_all(&self) -> usize {
        let (closed, next_active, active_changed) = {
            let mut state = self.inner.state.borrow_mut();
            let before = state.tabs.active().cloned();
            let closed = state.tabs.close_all();
            let after = state.tabs.active().cloned();
            let changed = before != after;
            (closed, after, changed)
        };
        for tab in &closed {
            if self.inner.state.borrow().is_shown(tab.id.as_str()) {
                self.hide_page(&tab.id);
            }
            self.release_closed(&tab.id, false);
        }
        info!("closed {} tabs", closed.len());

        if active_changed || next_active.is_none() {
            self.refocus(next_active).await;
        } else {
            self.refresh_tab_strip(None);
        }
        closed.len()
    }

    /// Drop any stale cached page for `id` and load it again.
    pub async fn retry(&self, id: &str) -> Result<(), ShellError> {
        info!("retrying page {id}");
        self.teardown(id);
        if !self.inspect(|state| state.tabs.contains(id)) {
            return Ok(());
        }
        self.activate(id).await
    }

    pub async fn activate_next(&self) -> Result<(), ShellError> {
        let next = self.inspect(|state| state.tabs.next_id().cloned());
        match next {
            Some(next) => self.activate(next.as_str()).await,
            None => Ok(()),
        }
    }

    pub async fn handle_shortcut(&self, shortcut: Shortcut) -> Result<(), ShellError> {
        match shortcut {
            Shortcut::CloseActive => match self.active_tab() {
                Some(active) => self.close_tab(active.as_str()).await,
                None => Ok(()),
            },
            Shortcut::NextTab => self.activate_next().await,
        }
    }

    pub fn reorder(
        &self,
        dragged: &str,
        target: &str,
        position: DropPosition,
    ) -> Result<(), ShellError> {
        self.inner
            .state
            .borrow_mut()
            .tabs
            .reorder(dragged, target, position)?;
        self.refresh_tab_strip(None);
        Ok(())
    }

    pub fn scroll_tabs_left(&self) -> f32 {
        self.scroll_tabs(|state| state.tab_bar.scroll_left())
    }

    pub fn scroll_tabs_right(&self) -> f32 {
        self.scroll_tabs(|state| state.tab_bar.scroll_right())
    }

    pub fn scroll_tabs_by_wheel(&self, delta: f32) -> f32 {
        self.scroll_tabs(|state| state.tab_bar.scroll_by_wheel(delta))
    }

    /// Re-measure the strip, e.g. after the window was resized.
    pub fn relayout(&self) {
        self.refresh_tab_strip(None);
    }

    /// Remove `id`'s cached page and reverse all of its document effects.
    ///
    /// Returns whether a cached page existed. Calling it again is a no-op.
    pub fn teardown(&self, id: &str) -> bool {
        if self.inner.state.borrow().is_shown(id) {
            self.hide_page(&TabId::from(id));
        }
        let removed = self.inner.state.borrow_mut().cache.remove(id);
        let existed = removed.is_some();
        self.teardown_page(&TabId::from(id), removed);
        existed
    }

    /// Drop every cached page whose tab is not open.
    pub fn clear_cache(&self) -> usize {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let pinned = state.pinned();
            state.cache.clear(&pinned)
        };
        let count = removed.len();
        for (id, payload) in removed {
            self.teardown_page(&id, Some(payload));
        }
        info!("cleared {count} cached pages");
        count
    }

    /// Takes effect at the next insertion; nothing is evicted immediately.
    pub fn set_max_cache(&self, capacity: usize) -> Result<(), CacheError> {
        self.inner.state.borrow_mut().cache.set_capacity(capacity)?;
        info!("page cache capacity set to {capacity}");
        Ok(())
    }

    pub fn debug(&self) -> DebugSurface<M> {
        DebugSurface::new(self.clone())
    }

    pub fn cached_ids(&self) -> Vec<TabId> {
        self.inspect(|state| state.cache.ids())
    }

    async fn load_deduplicated(&self, source: &PageSource) -> Result<M::Payload, PageError> {
        let shared = {
            let mut in_flight = self.inner.in_flight.borrow_mut();
            match in_flight.get(&source.id) {
                Some(existing) => {
                    debug!("joining in-flight load of {}", source.id);
                    existing.clone()
                },
                None => {
                    let load = self
                        .inner
                        .materializer
                        .borrow()
                        .load(&source.id, source)
                        .shared();
                    in_flight.insert(source.id.clone(), load.clone());
                    load
                },
            }
        };

        let result = shared.clone().await;

        let mut in_flight = self.inner.in_flight.borrow_mut();
        if in_flight
            .get(&source.id)
            .is_some_and(|current| current.ptr_eq(&shared))
        {
            in_flight.remove(&source.id);
        }
        result
    }

    fn store_loaded(&self, id: &TabId, payload: M::Payload) {
        let retains_closed = self.inner.materializer.borrow().retains_closed_pages();
        let outcome = {
            let mut state = self.inner.state.borrow_mut();
            if state.cache.contains(id.as_str()) {
                // A concurrent activation of the same load stored it first.
                None
            } else if !state.tabs.contains(id.as_str()) && !retains_closed {
                Some(Err(payload))
            } else {
                let pinned = state.pinned();
                Some(Ok(state.cache.put(id.clone(), payload, &pinned)))
            }
        };

        let fresh = match outcome {
            None => false,
            Some(Err(payload)) => {
                debug!("{id} closed while loading; discarding its page");
                emit_event(DiagnosticEvent::StaleLoadDiscarded { id: id.clone() });
                self.inner.materializer.borrow_mut().discard(payload);
                return;
            },
            Some(Ok(outcome)) => {
                if let Some(replaced) = outcome.replaced {
                    self.inner.materializer.borrow_mut().discard(replaced);
                }
                for (evicted, payload) in outcome.evicted {
                    info!("evicting cached page {evicted}");
                    emit_event(DiagnosticEvent::PageEvicted {
                        id: evicted.clone(),
                    });
                    self.teardown_page(&evicted, Some(payload));
                }
                true
            },
        };

        let (active, payload) = {
            let mut state = self.inner.state.borrow_mut();
            let active = state.tabs.is_active(id.as_str());
            (active, state.cache.get(id.as_str()).cloned())
        };
        if let Some(payload) = payload
            && active
            && !self.inner.state.borrow().is_shown(id.as_str())
        {
            self.present(id, &payload);
        } else if !active {
            debug!("{id} finished loading in the background");
        }

        if fresh {
            emit_event(DiagnosticEvent::PageLoaded {
                id: id.clone(),
                resources: self.inner.materializer.borrow().attached_resources(id),
            });
        }
    }

    fn present(&self, id: &TabId, payload: &M::Payload) {
        let previous = self.inner.state.borrow().shown().cloned();
        if let Some(previous) = previous.filter(|previous| previous != id) {
            self.hide_page(&previous);
        }

        let shown = self.inner.materializer.borrow_mut().show(id, payload);
        match shown {
            Ok(()) => {
                let mut state = self.inner.state.borrow_mut();
                state.set_shown(Some(id.clone()));
                state.set_content(ContentState::Page { id: id.clone() });
            },
            Err(err) => self.surface_load_failure(id, &err),
        }
    }

    fn hide_shown(&self) {
        let shown = self.inner.state.borrow().shown().cloned();
        if let Some(shown) = shown {
            self.hide_page(&shown);
        }
    }

    fn hide_page(&self, id: &TabId) {
        let payload = {
            let mut state = self.inner.state.borrow_mut();
            if state.is_shown(id.as_str()) {
                state.set_shown(None);
            }
            state.cache.peek(id.as_str()).cloned()
        };
        if let Some(payload) = payload {
            self.inner.materializer.borrow_mut().hide(id, &payload);
        }

        let stopped = self.inner.materializer.borrow().releases_on_hide();
        if stopped {
            let report = self.inner.cleanup.run(id);
            if report.ran > 0 {
                debug!(
                    "hid {id}: {} cleanup hooks, {} failed",
                    report.ran, report.failed
                );
            }
        }
    }

    /// Drop a closed tab's page unless the strategy keeps closed pages cached.
    fn release_closed(&self, id: &TabId, evict: bool) {
        let keep = !evict && self.inner.materializer.borrow().retains_closed_pages();
        if keep {
            return;
        }
        let removed = self.inner.state.borrow_mut().cache.remove(id.as_str());
        if removed.is_some() {
            self.teardown_page(id, removed);
        }
    }

    fn teardown_page(&self, id: &TabId, payload: Option<M::Payload>) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.is_shown(id.as_str()) {
                state.set_shown(None);
            }
        }
        let released = self.inner.materializer.borrow_mut().teardown(id, payload);
        let report = self.inner.cleanup.run(id);
        debug!(
            "tore down {id}: {released} resources, {} cleanup hooks",
            report.ran
        );
        emit_event(DiagnosticEvent::PageTornDown {
            id: id.clone(),
            released,
            cleanups_run: report.ran,
            cleanups_failed: report.failed,
        });
    }

    fn surface_load_failure(&self, id: &TabId, err: &PageError) {
        warn!("page {id} failed: {err}");
        if err.is_frame_failure() {
            self.inner
                .host
                .notify(Notice::error("Page failed to load", err.to_string()));
        }
        if !self.inspect(|state| state.tabs.is_active(id.as_str())) {
            return;
        }
        self.set_content(ContentState::Failed {
            id: id.clone(),
            message: LOAD_FAILED_MESSAGE.to_owned(),
        });
        self.inner.host.set_content(ContentView::Failed {
            id,
            message: LOAD_FAILED_MESSAGE,
            retryable: true,
        });
    }

    async fn refocus(&self, next: Option<TabId>) {
        match next {
            Some(next) => {
                if let Err(err) = self.activate(next.as_str()).await {
                    debug!("refocusing {next} did not complete: {err}");
                }
            },
            None => self.show_welcome(),
        }
    }

    fn show_welcome(&self) {
        self.hide_shown();
        {
            let mut state = self.inner.state.borrow_mut();
            state.set_content(ContentState::Welcome);
            state.tab_bar.reset();
        }
        self.inner.host.set_content(ContentView::Welcome);
        self.inner.host.set_title(&self.inner.app_title);
        self.refresh_tab_strip(None);
    }

    fn set_content(&self, content: ContentState) {
        self.inner.state.borrow_mut().set_content(content);
    }

    fn scroll_tabs(&self, scroll: impl FnOnce(&mut ShellState<M::Payload>) -> f32) -> f32 {
        let (position, frame) = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let position = scroll(&mut *state);
            (position, state.tab_bar.frame(&state.tabs))
        };
        self.inner.host.render_tab_strip(&frame);
        position
    }

    fn refresh_tab_strip(&self, reveal: Option<&TabId>) {
        let ids = self.open_tab_ids();
        let metrics = self.inner.host.measure_tab_strip(&ids);
        let frame = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            state.tab_bar.set_metrics(metrics);
            if let Some(id) = reveal {
                state.tab_bar.scroll_to_tab(id.as_str());
            }
            state.tab_bar.frame(&state.tabs)
        };
        self.inner.host.render_tab_strip(&frame);
    }
}

/// A shell whose strategy was picked from [`ShellPrefs::materializer`].
#[derive(Clone)]
pub enum ShellHandle {
    Injection(Shell<InjectionMaterializer>),
    Frame(Shell<FrameMaterializer>),
}

/// Run the same expression against whichever shell a [`ShellHandle`] holds.
#[macro_export]
macro_rules! with_shell {
    ($handle:expr, $shell:ident => $body:expr) => {
        match $handle {
            $crate::shell::tab_controller::ShellHandle::Injection($shell) => $body,
            $crate::shell::tab_controller::ShellHandle::Frame($shell) => $body,
        }
    };
}

impl ShellHandle {
    pub fn build(
        prefs: &ShellPrefs,
        host: Rc<dyn DocumentHost>,
        fetcher: Rc<dyn PageFetcher>,
    ) -> Result<Self, ShellError> {
        Ok(match prefs.materializer {
            MaterializerKind::Injection => {
                Self::Injection(Shell::with_injection(prefs, host, fetcher)?)
            },
            MaterializerKind::Frame => Self::Frame(Shell::with_frames(prefs, host)?),
        })
    }

    pub fn kind(&self) -> MaterializerKind {
        with_shell!(self, shell => shell.kind())
    }

    pub async fn open_tab(&self, id: &str) -> Result<TabOpen, ShellError> {
        with_shell!(self, shell => shell.open_tab(id).await)
    }

    pub async fn close_tab(&self, id: &str) -> Result<(), ShellError> {
        with_shell!(self, shell => shell.close_tab(id).await)
    }

    pub async fn close_all(&self) -> usize {
        with_shell!(self, shell => shell.close_all().await)
    }

    pub async fn retry(&self, id: &str) -> Result<(), ShellError> {
        with_shell!(self, shell => shell.retry(id).await)
    }

    pub async fn handle_shortcut(&self, shortcut: Shortcut) -> Result<(), ShellError> {
        with_shell!(self, shell => shell.handle_shortcut(shortcut).await)
    }

    pub async fn load_menu(&self, source: &dyn MenuSource) -> MenuOrigin {
        with_shell!(self, shell => shell.load_menu(source).await)
    }

    pub fn register_cleanup<F>(&self, id: &str, hook: F)
    where
        F: FnOnce() -> Result<(), CleanupError> + 'static,
    {
        with_shell!(self, shell => shell.register_cleanup(id, hook))
    }

    pub fn active_tab(&self) -> Option<TabId> {
        with_shell!(self, shell => shell.active_tab())
    }

    pub fn open_tab_ids(&self) -> Vec<TabId> {
        with_shell!(self, shell => shell.open_tab_ids())
    }

    pub fn content(&self) -> ContentState {
        with_shell!(self, shell => shell.content())
    }

    pub fn status_json(&self) -> serde_json::Value {
        with_shell!(self, shell => shell.debug().status_json())
    }

    pub fn cached_ids(&self) -> Vec<TabId> {
        with_shell!(self, shell => shell.cached_ids())
    }

    pub fn clear_cache(&self) -> usize {
        with_shell!(self, shell => shell.clear_cache())
    }
}
