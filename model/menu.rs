/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Menu tree that supplies openable page destinations.

use serde::{Deserialize, Serialize};

use crate::model::tab::TabId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub id: TabId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuEntry>,
}

impl MenuEntry {
    pub fn page(id: &str, title: &str, path: &str) -> Self {
        Self {
            id: TabId::from(id),
            title: title.to_owned(),
            icon: None,
            path: Some(path.to_owned()),
            children: Vec::new(),
        }
    }

    pub fn group(id: &str, title: &str, children: Vec<MenuEntry>) -> Self {
        Self {
            id: TabId::from(id),
            title: title.to_owned(),
            icon: None,
            path: None,
            children,
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_owned());
        self
    }

    /// Groups are navigation-only; only leaves with a location open as tabs.
    pub fn is_openable(&self) -> bool {
        self.children.is_empty() && self.path.as_deref().is_some_and(|path| !path.is_empty())
    }
}

/// Menu record as served by `GET /api/menus/active`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMenu {
    pub menu_id: String,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, alias = "url")]
    pub path: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<ApiMenu>>,
}

impl From<ApiMenu> for MenuEntry {
    fn from(menu: ApiMenu) -> Self {
        Self {
            id: TabId::new(menu.menu_id),
            title: menu.title,
            icon: menu.icon,
            path: menu.path.map(|path| page_path_for_route(&path)),
            children: menu
                .children
                .unwrap_or_default()
                .into_iter()
                .map(MenuEntry::from)
                .collect(),
        }
    }
}

/// Server routes (`/tasks`) are served as static page files (`pages/tasks.html`).
fn page_path_for_route(path: &str) -> String {
    if path.starts_with('/') {
        format!("pages{path}.html")
    } else {
        path.to_owned()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuIndex {
    roots: Vec<MenuEntry>,
}

impl MenuIndex {
    pub fn new(roots: Vec<MenuEntry>) -> Self {
        Self { roots }
    }

    pub fn from_api(menus: Vec<ApiMenu>) -> Self {
        Self::new(menus.into_iter().map(MenuEntry::from).collect())
    }

    pub fn roots(&self) -> &[MenuEntry] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Depth-first lookup; the first match in tree order wins.
    pub fn find_by_id(&self, id: &str) -> Option<&MenuEntry> {
        fn search<'a>(entries: &'a [MenuEntry], id: &str) -> Option<&'a MenuEntry> {
            entries.iter().find_map(|entry| {
                if entry.id.as_str() == id {
                    Some(entry)
                } else {
                    search(&entry.children, id)
                }
            })
        }
        search(&self.roots, id)
    }

    pub fn openable(&self) -> Vec<&MenuEntry> {
        fn collect<'a>(entries: &'a [MenuEntry], out: &mut Vec<&'a MenuEntry>) {
            for entry in entries {
                if entry.is_openable() {
                    out.push(entry);
                }
                collect(&entry.children, out);
            }
        }
        let mut out = Vec::new();
        collect(&self.roots, &mut out);
        out
    }

    /// Built-in navigation used when the menu API is unreachable.
    pub fn fallback() -> Self {
        Self::new(vec![
            MenuEntry::page("dashboard", "Dashboard", "pages/dashboard.html")
                .with_icon("bx-tachometer"),
            MenuEntry::group(
                "project-group",
                "Projects",
                vec![
                    MenuEntry::page("projects", "Project List", "pages/projects.html"),
                    MenuEntry::page("project-new", "New Project", "pages/project-new.html"),
                    MenuEntry::page(
                        "project-templates",
                        "Project Templates",
                        "pages/project-templates.html",
                    ),
                    MenuEntry::page(
                        "project-archive",
                        "Archived Projects",
                        "pages/project-archive.html",
                    ),
                ],
            )
            .with_icon("bx-folder"),
            MenuEntry::group(
                "task-group",
                "Tasks",
                vec![
                    MenuEntry::page("tasks", "Task Board", "pages/tasks.html"),
                    MenuEntry::page("task-calendar", "Task Calendar", "pages/task-calendar.html"),
                    MenuEntry::page("task-timeline", "Timeline", "pages/task-timeline.html"),
                    MenuEntry::page("task-my", "My Tasks", "pages/task-my.html"),
                ],
            )
            .with_icon("bx-task"),
            MenuEntry::page("reports", "Reports", "pages/reports.html")
                .with_icon("bx-bar-chart-alt-2"),
            MenuEntry::group(
                "system",
                "System",
                vec![MenuEntry::page(
                    "menu-management",
                    "Menu Management",
                    "pages/menu-management.html",
                )],
            )
            .with_icon("bx-cog"),
            MenuEntry::page("settings", "Settings", "pages/settings.html").with_icon("bx-cog"),
        ])
    }
}
