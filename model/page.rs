/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Page representations shared by the fetcher, the cache and the materializers.

use serde::Serialize;

use crate::model::menu::MenuEntry;
use crate::model::tab::TabId;

/// Where a page comes from. Derived from an openable [`MenuEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSource {
    pub id: TabId,
    pub title: String,
    pub location: String,
}

impl PageSource {
    pub fn from_menu_entry(entry: &MenuEntry) -> Option<Self> {
        if !entry.is_openable() {
            return None;
        }
        Some(Self {
            id: entry.id.clone(),
            title: entry.title.clone(),
            location: entry.path.clone()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptRecord {
    External { src: String },
    Inline { content: String },
}

/// A fetched fragment with its scripts and styles lifted out, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedPage {
    pub markup: String,
    pub scripts: Vec<ScriptRecord>,
    pub styles: Vec<String>,
}

impl ParsedPage {
    /// Number of document resources materializing this page creates.
    pub fn resource_count(&self) -> usize {
        self.scripts.len() + self.styles.len()
    }
}
