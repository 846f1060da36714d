/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Application state owned by one shell instance.

use std::collections::HashSet;

use serde::Serialize;

use crate::model::menu::MenuIndex;
use crate::model::tab::{TabId, TabSet};
use crate::prefs::ShellPrefs;
use crate::services::page_cache::{CacheError, CacheStatus, PageCache};
use crate::shell::workbench::tab_bar::TabBarView;

/// What the content area currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ContentState {
    #[default]
    Welcome,
    Loading {
        id: TabId,
    },
    Page {
        id: TabId,
    },
    Failed {
        id: TabId,
        message: String,
    },
}

pub struct ShellState<P> {
    /// Open tabs, in render order.
    pub tabs: TabSet,

    /// Materialized pages keyed by tab id.
    pub cache: PageCache<P>,

    pub tab_bar: TabBarView,

    pub menu: MenuIndex,

    /// Page whose resources are currently attached to the document.
    shown: Option<TabId>,

    content: ContentState,
}

impl<P> ShellState<P> {
    pub fn new(prefs: &ShellPrefs) -> Result<Self, CacheError> {
        Ok(Self {
            tabs: TabSet::new(prefs.max_tabs, prefs.last_tab_policy)
                .with_permanent(prefs.permanent_tabs.iter().map(String::as_str)),
            cache: PageCache::with_capacity(prefs.max_cached_pages)?,
            tab_bar: TabBarView::new(prefs.tab_scroll_step),
            menu: MenuIndex::fallback(),
            shown: None,
            content: ContentState::Welcome,
        })
    }

    pub fn shown(&self) -> Option<&TabId> {
        self.shown.as_ref()
    }

    pub fn is_shown(&self, id: &str) -> bool {
        self.shown.as_ref().is_some_and(|shown| shown.as_str() == id)
    }

    pub(crate) fn set_shown(&mut self, id: Option<TabId>) {
        self.shown = id;
    }

    pub fn content(&self) -> &ContentState {
        &self.content
    }

    pub(crate) fn set_content(&mut self, content: ContentState) {
        self.content = content;
    }

    /// Open tab ids, which the cache must never evict.
    pub fn pinned(&self) -> HashSet<TabId> {
        self.tabs.id_set()
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.cache.status(self.tabs.len())
    }
}
