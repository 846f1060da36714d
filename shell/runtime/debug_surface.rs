/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Cache inspection and maintenance hooks for a running shell.
//!
//! Every operation goes through the shell, so teardown and pinning rules
//! apply exactly as they do for user-driven changes.

use log::{debug, info};
use serde_json::{Value, json};

use crate::model::tab::TabId;
use crate::services::page_cache::{CacheError, CacheStatus};
use crate::shell::lifecycle::PageMaterializer;
use crate::shell::tab_controller::Shell;

pub struct DebugSurface<M: PageMaterializer> {
    shell: Shell<M>,
}

impl<M: PageMaterializer + 'static> DebugSurface<M> {
    pub(crate) fn new(shell: Shell<M>) -> Self {
        Self { shell }
    }

    pub fn status(&self) -> CacheStatus {
        self.shell.cache_status()
    }

    pub fn status_json(&self) -> Value {
        let status = self.status();
        json!({
            "cached": status.cached,
            "maxCache": status.max_cache,
            "openTabs": status.open_tabs,
            "strategy": self.shell.kind().to_string(),
            "active": self.shell.active_tab(),
            "cachedIds": self.list(),
        })
    }

    /// Drops every cached page whose tab is closed. Open tabs stay cached.
    pub fn clear(&self) -> usize {
        self.shell.clear_cache()
    }

    /// Cached ids, least recently used first.
    pub fn list(&self) -> Vec<TabId> {
        self.shell.cached_ids()
    }

    /// Remove one cached page. The active tab is reloaded right away.
    pub async fn remove(&self, id: &str) -> bool {
        let existed = self.shell.teardown(id);
        if self.shell.active_tab().is_some_and(|active| active.as_str() == id) {
            info!("reloading active page {id} after removal");
            if let Err(err) = self.shell.activate(id).await {
                debug!("reload of {id} failed: {err}");
            }
        }
        existed
    }

    /// Takes effect at the next insertion; nothing is evicted immediately.
    pub fn set_max_cache(&self, capacity: usize) -> Result<(), CacheError> {
        self.shell.set_max_cache(capacity)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::prefs::ShellPrefs;
    use crate::services::page_fetch::MemoryPageFetcher;
    use crate::shell::host::memory::InMemoryDocument;
    use crate::shell::lifecycle::InjectionMaterializer;

    fn shell() -> (Shell<InjectionMaterializer>, MemoryPageFetcher) {
        let fetcher = ["dashboard", "tasks", "reports"]
            .iter()
            .fold(MemoryPageFetcher::new(), |fetcher, id| {
                fetcher.with_page(
                    &format!("pages/{id}.html"),
                    &format!("<p>{id}</p><script>boot()</script>"),
                )
            });
        let shell = Shell::with_injection(
            &ShellPrefs::default(),
            Rc::new(InMemoryDocument::new()),
            Rc::new(fetcher.clone()),
        )
        .unwrap();
        (shell, fetcher)
    }

    #[tokio::test]
    async fn test_clear_keeps_open_tabs() {
        let (shell, _) = shell();
        shell.open_tab("tasks").await.unwrap();
        shell.open_tab("reports").await.unwrap();
        shell.close_tab("tasks").await.unwrap();

        let debug = shell.debug();
        assert_eq!(debug.status().cached, 2);
        assert_eq!(debug.clear(), 1);
        assert_eq!(debug.list(), vec![TabId::from("reports")]);
    }

    #[tokio::test]
    async fn test_remove_active_reloads_it() {
        let (shell, fetcher) = shell();
        shell.open_tab("tasks").await.unwrap();

        let debug = shell.debug();
        assert!(debug.remove("tasks").await);
        assert_eq!(fetcher.request_count("pages/tasks.html"), 2);
        assert_eq!(debug.list(), vec![TabId::from("tasks")]);
        assert!(!debug.remove("missing").await);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_rejected() {
        let (shell, _) = shell();
        let debug = shell.debug();
        assert_eq!(debug.set_max_cache(0), Err(CacheError::ZeroCapacity));
        assert_eq!(debug.status().max_cache, 10);
        assert!(debug.set_max_cache(3).is_ok());
        assert_eq!(debug.status().max_cache, 3);
    }

    #[tokio::test]
    async fn test_status_json_uses_camel_case_keys() {
        let (shell, _) = shell();
        shell.open_tab("dashboard").await.unwrap();
        let status = shell.debug().status_json();
        assert_eq!(status["cached"], 1);
        assert_eq!(status["maxCache"], 10);
        assert_eq!(status["openTabs"], 1);
        assert_eq!(status["active"], "dashboard");
        assert_eq!(status["strategy"], "injection");
    }
}
