/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! LRU page cache with pinning.
//!
//! Ids that are open as tabs are pinned and never evicted, so capacity is a
//! soft target: when every cached id is pinned the cache may stay over it.
//! The cache only stores payloads. Whatever it hands back from `put`,
//! `remove` or `clear` has left the cache and must be torn down by the caller.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::model::tab::TabId;

pub const DEFAULT_MAX_CACHED_PAGES: usize = 10;

#[derive(Debug, Clone)]
pub struct CacheEntry<P> {
    pub payload: P,
    pub last_access: u64,
}

#[derive(Debug)]
pub struct PutOutcome<P> {
    /// Payload previously stored under the same id, if any.
    pub replaced: Option<P>,
    /// Unpinned entries removed to get back under capacity, oldest first.
    pub evicted: Vec<(TabId, P)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub cached: usize,
    pub max_cache: usize,
    pub open_tabs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    ZeroCapacity,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "page cache capacity must be a positive integer"),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Debug)]
pub struct PageCache<P> {
    entries: HashMap<TabId, CacheEntry<P>>,
    capacity: usize,
    clock: u64,
}

impl<P> Default for PageCache<P> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            capacity: DEFAULT_MAX_CACHED_PAGES,
            clock: 0,
        }
    }
}

impl<P> PageCache<P> {
    pub fn with_capacity(capacity: usize) -> Result<Self, CacheError> {
        let mut cache = Self::default();
        cache.set_capacity(capacity)?;
        Ok(cache)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Takes effect at the next `put`; nothing is evicted here.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), CacheError> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        self.capacity = capacity;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Cache hit refreshes the entry's recency.
    pub fn get(&mut self, id: &str) -> Option<&P> {
        let now = self.tick();
        let entry = self.entries.get_mut(id)?;
        entry.last_access = now;
        Some(&entry.payload)
    }

    /// Lookup without touching recency.
    pub fn peek(&self, id: &str) -> Option<&P> {
        self.entries.get(id).map(|entry| &entry.payload)
    }

    pub fn last_access(&self, id: &str) -> Option<u64> {
        self.entries.get(id).map(|entry| entry.last_access)
    }

    pub fn put(&mut self, id: TabId, payload: P, pinned: &HashSet<TabId>) -> PutOutcome<P> {
        let last_access = self.tick();
        let replaced = self
            .entries
            .insert(
                id,
                CacheEntry {
                    payload,
                    last_access,
                },
            )
            .map(|previous| previous.payload);
        PutOutcome {
            replaced,
            evicted: self.evict_over_capacity(pinned),
        }
    }

    fn evict_over_capacity(&mut self, pinned: &HashSet<TabId>) -> Vec<(TabId, P)> {
        if self.entries.len() <= self.capacity {
            return Vec::new();
        }
        let overflow = self.entries.len() - self.capacity;
        let mut candidates: Vec<(u64, TabId)> = self
            .entries
            .iter()
            .filter(|(id, _)| !pinned.contains(*id))
            .map(|(id, entry)| (entry.last_access, id.clone()))
            .collect();
        candidates.sort_unstable();

        candidates
            .into_iter()
            .take(overflow)
            .filter_map(|(_, id)| {
                let entry = self.entries.remove(&id)?;
                Some((id, entry.payload))
            })
            .collect()
    }

    /// Missing ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<P> {
        self.entries.remove(id).map(|entry| entry.payload)
    }

    /// Remove every entry not listed in `except`.
    pub fn clear(&mut self, except: &HashSet<TabId>) -> Vec<(TabId, P)> {
        let doomed: Vec<TabId> = self
            .entries
            .keys()
            .filter(|id| !except.contains(*id))
            .cloned()
            .collect();
        doomed
            .into_iter()
            .filter_map(|id| {
                let entry = self.entries.remove(&id)?;
                Some((id, entry.payload))
            })
            .collect()
    }

    /// Cached ids, least recently used first.
    pub fn ids(&self) -> Vec<TabId> {
        let mut ids: Vec<(u64, &TabId)> = self
            .entries
            .iter()
            .map(|(id, entry)| (entry.last_access, id))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id.clone()).collect()
    }

    pub fn status(&self, open_tabs: usize) -> CacheStatus {
        CacheStatus {
            cached: self.entries.len(),
            max_cache: self.capacity,
            open_tabs,
        }
    }
}
