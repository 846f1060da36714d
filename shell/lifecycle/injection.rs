/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Shared-document strategy: fetched fragments are parsed, their markup is
//! written into the content area and their scripts and styles are injected
//! into the document head.
//!
//! Injected elements are tracked in an explicit registry keyed by page id
//! rather than rediscovered by attribute, so releasing a page removes exactly
//! what materializing it added.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{Either, LocalBoxFuture, select};
use log::{debug, warn};

use crate::model::page::{PageSource, ParsedPage};
use crate::model::tab::TabId;
use crate::services::page_fetch::PageFetcher;
use crate::services::page_parse::split_page;
use crate::shell::host::{
    ContentView, DocumentHost, HostError, InjectedResource, NodeHandle, ResourceTag,
};
use crate::shell::lifecycle::{MaterializerKind, PageError, PageMaterializer};

pub struct InjectionMaterializer {
    host: Rc<dyn DocumentHost>,
    fetcher: Rc<dyn PageFetcher>,
    fetch_timeout: Duration,
    injected: HashMap<TabId, Vec<NodeHandle>>,
}

impl InjectionMaterializer {
    pub fn new(
        host: Rc<dyn DocumentHost>,
        fetcher: Rc<dyn PageFetcher>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            host,
            fetcher,
            fetch_timeout,
            injected: HashMap::new(),
        }
    }

    pub fn injected_count(&self, id: &str) -> usize {
        self.injected.get(id).map_or(0, Vec::len)
    }

    /// Write `page` into the document: markup first, then styles, then
    /// scripts, each group in source order.
    ///
    /// Anything previously injected for `id` is released first. If the host
    /// rejects an element partway, the ones already appended are removed again.
    pub fn materialize(&mut self, id: &TabId, page: &ParsedPage) -> Result<usize, HostError> {
        self.release(id);
        self.host.set_content(ContentView::Markup {
            id,
            html: &page.markup,
        });

        let resources = page
            .styles
            .iter()
            .map(|css| InjectedResource::Style { css })
            .enumerate()
            .chain(
                page.scripts
                    .iter()
                    .map(InjectedResource::Script)
                    .enumerate(),
            );

        let mut handles = Vec::with_capacity(page.resource_count());
        for (index, resource) in resources {
            match self.host.inject(ResourceTag { owner: id, index }, resource) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warn!("injecting resources for {id} failed at #{index}: {err}");
                    for handle in handles {
                        self.host.remove_node(handle);
                    }
                    return Err(err);
                },
            }
        }

        let count = handles.len();
        if count > 0 {
            self.injected.insert(id.clone(), handles);
        }
        debug!("materialized {id} with {count} injected resources");
        Ok(count)
    }

    fn release(&mut self, id: &TabId) -> usize {
        let Some(handles) = self.injected.remove(id) else {
            return 0;
        };
        handles
            .into_iter()
            .filter(|handle| self.host.remove_node(*handle))
            .count()
    }
}

impl PageMaterializer for InjectionMaterializer {
    type Payload = Rc<ParsedPage>;

    fn kind(&self) -> MaterializerKind {
        MaterializerKind::Injection
    }

    fn load(
        &self,
        id: &TabId,
        source: &PageSource,
    ) -> LocalBoxFuture<'static, Result<Self::Payload, PageError>> {
        let fetch = self.fetcher.fetch(&source.location);
        let timer = self.host.sleep(self.fetch_timeout);
        let after = self.fetch_timeout;
        let id = id.clone();
        async move {
            match select(fetch, timer).await {
                Either::Left((Ok(fetched), _)) => {
                    Ok(Rc::new(split_page(&fetched.body, fetched.url.as_ref())))
                },
                Either::Left((Err(err), _)) => Err(PageError::Fetch(err)),
                Either::Right(((), _)) => Err(PageError::FetchTimeout { id, after }),
            }
        }
        .boxed_local()
    }

    fn show(&mut self, id: &TabId, payload: &Self::Payload) -> Result<(), PageError> {
        self.materialize(id, payload)?;
        Ok(())
    }

    fn hide(&mut self, id: &TabId, _payload: &Self::Payload) {
        self.release(id);
    }

    fn teardown(&mut self, id: &TabId, _payload: Option<Self::Payload>) -> usize {
        self.release(id)
    }

    fn attached_resources(&self, id: &TabId) -> usize {
        self.injected_count(id.as_str())
    }

    fn discard(&mut self, _payload: Self::Payload) {}

    fn retains_closed_pages(&self) -> bool {
        true
    }

    // Showing again re-runs the page scripts.
    fn releases_on_hide(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::page::ScriptRecord;
    use crate::services::page_fetch::{FetchError, MemoryPageFetcher};
    use crate::shell::host::memory::{ContentSnapshot, InMemoryDocument};

    fn page() -> ParsedPage {
        ParsedPage {
            markup: "<div id=\"board\"></div>".into(),
            scripts: vec![
                ScriptRecord::External {
                    src: "/js/board.js".into(),
                },
                ScriptRecord::Inline {
                    content: "initBoard()".into(),
                },
            ],
            styles: vec![".board{}".into()],
        }
    }

    fn materializer(host: &Rc<InMemoryDocument>, fetcher: MemoryPageFetcher) -> InjectionMaterializer {
        InjectionMaterializer::new(host.clone(), Rc::new(fetcher), Duration::from_secs(30))
    }

    #[test]
    fn test_materialize_injects_styles_then_scripts_in_order() {
        let host = Rc::new(InMemoryDocument::new());
        let mut injection = materializer(&host, MemoryPageFetcher::new());
        let id = TabId::from("tasks");

        assert_eq!(injection.materialize(&id, &page()).unwrap(), 3);

        let nodes = host.head_nodes();
        let tags: Vec<_> = nodes.iter().map(|node| (node.kind.label(), node.index)).collect();
        assert_eq!(tags, vec![("style", 0), ("script", 0), ("script", 1)]);
        assert!(nodes.iter().all(|node| node.owner == id));
        assert_eq!(
            host.content(),
            ContentSnapshot::Markup {
                id: id.clone(),
                html: "<div id=\"board\"></div>".into()
            }
        );
    }

    #[test]
    fn test_rematerialize_does_not_duplicate() {
        let host = Rc::new(InMemoryDocument::new());
        let mut injection = materializer(&host, MemoryPageFetcher::new());
        let id = TabId::from("tasks");

        injection.materialize(&id, &page()).unwrap();
        injection.materialize(&id, &page()).unwrap();
        assert_eq!(host.nodes_owned_by("tasks"), 3);
        assert_eq!(injection.injected_count("tasks"), 3);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let host = Rc::new(InMemoryDocument::new());
        let mut injection = materializer(&host, MemoryPageFetcher::new());
        let id = TabId::from("tasks");
        injection.materialize(&id, &page()).unwrap();

        assert_eq!(injection.teardown(&id, None), 3);
        assert_eq!(injection.teardown(&id, None), 0);
        assert_eq!(host.nodes_owned_by("tasks"), 0);
    }

    #[test]
    fn test_partial_injection_rolls_back() {
        let host = Rc::new(InMemoryDocument::new());
        host.fail_injections_after(2);
        let mut injection = materializer(&host, MemoryPageFetcher::new());

        let result = injection.materialize(&TabId::from("tasks"), &page());
        assert!(result.is_err());
        assert_eq!(host.nodes_owned_by("tasks"), 0);
        assert_eq!(injection.injected_count("tasks"), 0);
    }

    #[tokio::test]
    async fn test_load_parses_fetched_fragment() {
        let host = Rc::new(InMemoryDocument::new());
        let fetcher = MemoryPageFetcher::new()
            .with_page("pages/tasks.html", "<p>tasks</p><script>go()</script>");
        let injection = materializer(&host, fetcher);
        let source = PageSource {
            id: TabId::from("tasks"),
            title: "Tasks".into(),
            location: "pages/tasks.html".into(),
        };

        let parsed = injection.load(&source.id, &source).await.unwrap();
        assert_eq!(parsed.markup, "<p>tasks</p>");
        assert_eq!(parsed.scripts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let host = Rc::new(InMemoryDocument::new());
        let fetcher = MemoryPageFetcher::new().with_page("pages/slow.html", "<p>slow</p>");
        fetcher.set_latency(Duration::from_secs(45));
        let injection = materializer(&host, fetcher);
        let source = PageSource {
            id: TabId::from("slow"),
            title: "Slow".into(),
            location: "pages/slow.html".into(),
        };

        assert_eq!(
            injection.load(&source.id, &source).await,
            Err(PageError::FetchTimeout {
                id: TabId::from("slow"),
                after: Duration::from_secs(30)
            })
        );
    }

    #[tokio::test]
    async fn test_missing_page_is_a_fetch_error() {
        let host = Rc::new(InMemoryDocument::new());
        let injection = materializer(&host, MemoryPageFetcher::new());
        let source = PageSource {
            id: TabId::from("gone"),
            title: "Gone".into(),
            location: "pages/gone.html".into(),
        };
        assert_eq!(
            injection.load(&source.id, &source).await,
            Err(PageError::Fetch(FetchError::NotFound("pages/gone.html".into())))
        );
    }
}
