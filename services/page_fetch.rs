/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Page fragment retrieval.

use std::fmt;

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use log::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final location of the page, used to resolve relative script sources.
    pub url: Option<Url>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    InvalidLocation { location: String, reason: String },
    Transport(String),
    Status { status: u16, location: String },
    NotFound(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLocation { location, reason } => {
                write!(f, "invalid page location '{location}': {reason}")
            },
            Self::Transport(message) => write!(f, "page request failed: {message}"),
            Self::Status { status, location } => {
                write!(f, "page request for '{location}' returned HTTP {status}")
            },
            Self::NotFound(location) => write!(f, "page '{location}' does not exist"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Source of raw page fragments.
///
/// Futures are `!Send`; the shell drives them on a single-threaded executor.
pub trait PageFetcher {
    fn fetch(&self, location: &str) -> LocalBoxFuture<'static, Result<FetchedPage, FetchError>>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
    base: Url,
}

impl HttpPageFetcher {
    pub fn new(base: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base)
    }

    pub fn with_client(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    pub fn resolve(&self, location: &str) -> Result<Url, FetchError> {
        self.base
            .join(location)
            .map_err(|err| FetchError::InvalidLocation {
                location: location.to_owned(),
                reason: err.to_string(),
            })
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch(&self, location: &str) -> LocalBoxFuture<'static, Result<FetchedPage, FetchError>> {
        let client = self.client.clone();
        let resolved = self.resolve(location);
        let location = location.to_owned();
        async move {
            let url = resolved?;
            debug!("fetching page {url}");
            let response = client
                .get(url.clone())
                .send()
                .await
                .map_err(|err| FetchError::Transport(err.to_string()))?;
            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound(location));
            }
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    location,
                });
            }
            let body = response
                .text()
                .await
                .map_err(|err| FetchError::Transport(err.to_string()))?;
            Ok(FetchedPage {
                url: Some(url),
                body,
            })
        }
        .boxed_local()
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::{DirectoryPageFetcher, MemoryPageFetcher};

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::path::{Component, Path, PathBuf};
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;

    /// Serves page files from a local directory, for headless runs against a
    /// checked-out static tree.
    pub struct DirectoryPageFetcher {
        root: PathBuf,
    }

    impl DirectoryPageFetcher {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        pub(crate) fn path_for(&self, location: &str) -> Result<PathBuf, FetchError> {
            let relative = Path::new(location.trim_start_matches('/'));
            if relative
                .components()
                .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir))
            {
                return Err(FetchError::InvalidLocation {
                    location: location.to_owned(),
                    reason: "location escapes the page directory".into(),
                });
            }
            Ok(self.root.join(relative))
        }
    }

    impl PageFetcher for DirectoryPageFetcher {
        fn fetch(
            &self,
            location: &str,
        ) -> LocalBoxFuture<'static, Result<FetchedPage, FetchError>> {
            let path = self.path_for(location);
            let location = location.to_owned();
            async move {
                let path = path?;
                match tokio::fs::read_to_string(&path).await {
                    Ok(body) => Ok(FetchedPage {
                        url: Url::from_file_path(&path).ok(),
                        body,
                    }),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        Err(FetchError::NotFound(location))
                    },
                    Err(err) => Err(FetchError::Transport(err.to_string())),
                }
            }
            .boxed_local()
        }
    }

    /// In-memory page table with optional latency and a request log.
    #[derive(Clone, Default)]
    pub struct MemoryPageFetcher {
        inner: Rc<MemoryPages>,
    }

    #[derive(Default)]
    struct MemoryPages {
        pages: RefCell<HashMap<String, Result<String, FetchError>>>,
        latency: Cell<Duration>,
        requests: RefCell<Vec<String>>,
    }

    impl MemoryPageFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(self, location: &str, body: &str) -> Self {
            self.insert(location, Ok(body.to_owned()));
            self
        }

        pub fn insert(&self, location: &str, page: Result<String, FetchError>) {
            self.inner.pages.borrow_mut().insert(location.to_owned(), page);
        }

        /// Delay applied to every response (on the tokio clock).
        pub fn set_latency(&self, latency: Duration) {
            self.inner.latency.set(latency);
        }

        pub fn requests(&self) -> Vec<String> {
            self.inner.requests.borrow().clone()
        }

        pub fn request_count(&self, location: &str) -> usize {
            self.inner
                .requests
                .borrow()
                .iter()
                .filter(|requested| requested.as_str() == location)
                .count()
        }
    }

    impl PageFetcher for MemoryPageFetcher {
        fn fetch(
            &self,
            location: &str,
        ) -> LocalBoxFuture<'static, Result<FetchedPage, FetchError>> {
            self.inner.requests.borrow_mut().push(location.to_owned());
            let inner = Rc::clone(&self.inner);
            let location = location.to_owned();
            async move {
                let latency = inner.latency.get();
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                let page = inner.pages.borrow().get(&location).cloned();
                match page {
                    Some(Ok(body)) => Ok(FetchedPage { url: None, body }),
                    Some(Err(err)) => Err(err),
                    None => Err(FetchError::NotFound(location)),
                }
            }
            .boxed_local()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_fetcher_resolves_relative_locations() {
        let fetcher = HttpPageFetcher::new(Url::parse("http://localhost:8080/").unwrap());
        assert_eq!(
            fetcher.resolve("pages/tasks.html").unwrap().as_str(),
            "http://localhost:8080/pages/tasks.html"
        );
        assert_eq!(
            fetcher.resolve("/pages/tasks.html").unwrap().as_str(),
            "http://localhost:8080/pages/tasks.html"
        );
    }

    #[test]
    fn test_directory_fetcher_rejects_parent_segments() {
        let fetcher = DirectoryPageFetcher::new("/srv/static");
        assert!(matches!(
            fetcher.path_for("../secrets.html"),
            Err(FetchError::InvalidLocation { .. })
        ));
        assert_eq!(
            fetcher.path_for("/pages/tasks.html").unwrap(),
            std::path::PathBuf::from("/srv/static/pages/tasks.html")
        );
    }

    #[tokio::test]
    async fn test_directory_fetcher_reads_page_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pages")).unwrap();
        std::fs::write(dir.path().join("pages/tasks.html"), "<p>tasks</p>").unwrap();
        let fetcher = DirectoryPageFetcher::new(dir.path());

        let page = fetcher.fetch("pages/tasks.html").await.unwrap();
        assert_eq!(page.body, "<p>tasks</p>");
        assert!(page.url.is_some());

        assert_eq!(
            fetcher.fetch("pages/missing.html").await,
            Err(FetchError::NotFound("pages/missing.html".into()))
        );
    }

    #[tokio::test]
    async fn test_memory_fetcher_records_requests() {
        let fetcher = MemoryPageFetcher::new().with_page("pages/a.html", "<p>a</p>");
        assert_eq!(fetcher.fetch("pages/a.html").await.unwrap().body, "<p>a</p>");
        assert!(fetcher.fetch("pages/b.html").await.is_err());
        assert_eq!(fetcher.requests(), vec!["pages/a.html", "pages/b.html"]);
        assert_eq!(fetcher.request_count("pages/a.html"), 1);
    }
}
