/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Open-tab state machine.
//!
//! A tab moves `absent -> open-inactive -> open-active -> absent`. At most one
//! tab is active; an empty set has no active tab and the host shows its
//! welcome view instead.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TABS: usize = 10;

/// Identifier shared by a menu entry, its tab and its cached page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TabId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TabId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TabId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Whether the last open tab may be closed.
///
/// Exactly one policy is active for a given [`TabSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LastTabPolicy {
    /// Any tab may close; an empty set falls back to the welcome view.
    #[default]
    AllowEmpty,
    /// The only remaining tab cannot be closed.
    KeepOne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPosition {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabOpen {
    Created,
    Activated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabClose {
    pub tab: Tab,
    pub index: usize,
    pub was_active: bool,
    pub next_active: Option<TabId>,
}

/// Badge level for the open-tab counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TabCountLevel {
    Normal,
    Busy,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabSetError {
    LimitReached { max_tabs: usize },
    NotOpen(TabId),
    LastTab(TabId),
    NotClosable(TabId),
}

impl fmt::Display for TabSetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LimitReached { max_tabs } => {
                write!(f, "at most {max_tabs} tabs can be open at once")
            },
            Self::NotOpen(id) => write!(f, "tab '{id}' is not open"),
            Self::LastTab(id) => write!(f, "tab '{id}' is the last open tab and must stay open"),
            Self::NotClosable(id) => write!(f, "tab '{id}' cannot be closed"),
        }
    }
}

impl std::error::Error for TabSetError {}

#[derive(Debug, Clone)]
pub struct TabSet {
    tabs: Vec<Tab>,
    active: Option<TabId>,
    max_tabs: usize,
    policy: LastTabPolicy,
    permanent: HashSet<TabId>,
}

impl Default for TabSet {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TABS, LastTabPolicy::default())
    }
}

impl TabSet {
    pub fn new(max_tabs: usize, policy: LastTabPolicy) -> Self {
        Self {
            tabs: Vec::new(),
            active: None,
            max_tabs: max_tabs.max(1),
            policy,
            permanent: HashSet::new(),
        }
    }

    /// Mark ids whose tabs render without a close affordance.
    pub fn with_permanent<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TabId>,
    {
        self.permanent = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_tabs(&self) -> usize {
        self.max_tabs
    }

    pub fn policy(&self) -> LastTabPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active(&self) -> Option<&TabId> {
        self.active.as_ref()
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        let active = self.active.as_ref()?;
        self.tabs.iter().find(|tab| &tab.id == active)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.as_ref().is_some_and(|active| active.as_str() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id.as_str() == id)
    }

    pub fn is_closable(&self, id: &str) -> bool {
        !self.permanent.contains(id)
    }

    /// Ids of every open tab, i.e. the cache's pinned set.
    pub fn id_set(&self) -> HashSet<TabId> {
        self.tabs.iter().map(|tab| tab.id.clone()).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TabId> {
        self.tabs.iter().map(|tab| &tab.id)
    }

    pub fn open(
        &mut self,
        id: TabId,
        title: impl Into<String>,
        url: Option<String>,
    ) -> Result<TabOpen, TabSetError> {
        if self.contains(id.as_str()) {
            self.active = Some(id);
            return Ok(TabOpen::Activated);
        }
        if self.tabs.len() >= self.max_tabs {
            return Err(TabSetError::LimitReached {
                max_tabs: self.max_tabs,
            });
        }
        self.tabs.push(Tab {
            id: id.clone(),
            title: title.into(),
            url,
        });
        self.active = Some(id);
        Ok(TabOpen::Created)
    }

    /// Returns whether the active tab changed.
    pub fn activate(&mut self, id: &str) -> Result<bool, TabSetError> {
        let Some(index) = self.index_of(id) else {
            return Err(TabSetError::NotOpen(TabId::from(id)));
        };
        if self.is_active(id) {
            return Ok(false);
        }
        self.active = Some(self.tabs[index].id.clone());
        Ok(true)
    }

    pub fn close(&mut self, id: &str) -> Result<TabClose, TabSetError> {
        let Some(index) = self.index_of(id) else {
            return Err(TabSetError::NotOpen(TabId::from(id)));
        };
        if !self.is_closable(id) {
            return Err(TabSetError::NotClosable(TabId::from(id)));
        }
        if self.policy == LastTabPolicy::KeepOne && self.tabs.len() == 1 {
            return Err(TabSetError::LastTab(TabId::from(id)));
        }

        let tab = self.tabs.remove(index);
        let was_active = self.is_active(id);
        if was_active {
            self.active = if self.tabs.is_empty() {
                None
            } else {
                Some(self.tabs[index.saturating_sub(1)].id.clone())
            };
        }
        Ok(TabClose {
            tab,
            index,
            was_active,
            next_active: self.active.clone(),
        })
    }

    /// Close every closable tab the policy allows to close.
    ///
    /// Under [`LastTabPolicy::KeepOne`] the active tab (or the first tab when
    /// none is active) survives along with permanent tabs.
    pub fn close_all(&mut self) -> Vec<Tab> {
        let keep_one = match self.policy {
            LastTabPolicy::AllowEmpty => None,
            LastTabPolicy::KeepOne => self
                .active
                .clone()
                .or_else(|| self.tabs.first().map(|tab| tab.id.clone())),
        };
        let (kept, closed): (Vec<Tab>, Vec<Tab>) = self.tabs.drain(..).partition(|tab| {
            self.permanent.contains(&tab.id) || keep_one.as_ref() == Some(&tab.id)
        });
        self.tabs = kept;
        let active_survived = self
            .active
            .as_ref()
            .is_some_and(|active| self.tabs.iter().any(|tab| &tab.id == active));
        if !active_survived {
            self.active = self.tabs.first().map(|tab| tab.id.clone());
        }
        closed
    }

    pub fn reorder(
        &mut self,
        dragged: &str,
        target: &str,
        position: DropPosition,
    ) -> Result<(), TabSetError> {
        let Some(from) = self.index_of(dragged) else {
            return Err(TabSetError::NotOpen(TabId::from(dragged)));
        };
        if !self.contains(target) {
            return Err(TabSetError::NotOpen(TabId::from(target)));
        }
        if dragged == target {
            return Ok(());
        }
        let tab = self.tabs.remove(from);
        // Target index is looked up again after the splice.
        let to = self.index_of(target).unwrap_or(self.tabs.len());
        let insert_at = match position {
            DropPosition::Before => to,
            DropPosition::After => to + 1,
        };
        self.tabs.insert(insert_at.min(self.tabs.len()), tab);
        Ok(())
    }

    /// Tab after the active one, wrapping to the start.
    pub fn next_id(&self) -> Option<&TabId> {
        if self.tabs.is_empty() {
            return None;
        }
        let next = match self.active.as_ref().and_then(|id| self.index_of(id.as_str())) {
            Some(index) => (index + 1) % self.tabs.len(),
            None => 0,
        };
        Some(&self.tabs[next].id)
    }

    pub fn count_level(&self) -> TabCountLevel {
        let open = self.tabs.len();
        if open >= self.max_tabs {
            TabCountLevel::Full
        } else if open * 10 >= self.max_tabs * 7 {
            TabCountLevel::Busy
        } else {
            TabCountLevel::Normal
        }
    }
}
