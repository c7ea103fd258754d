//! # Resource Loader
//!
//! Turns a window location into a live document tree.
//!
//! ```text
//!   set_location(loc) ──▶ `location` event ──▶ ResourceLoader
//!                                                 │
//!        path / file://  ── read from disk ───────┤
//!        http / https    ── reqwest on the pool ──┤
//!                                                 ▼
//!                          parse markup → build nodes → initialize
//!                          → set_root → request focus on the new root
//! ```
//!
//! Initialization attaches a [`NavigationController`] to every `container`.

use log::{debug, error, info};
use reqwest::Url;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use super::focus::request_focus;
use super::navigation::{NavigationController, NavigationTheme};
use crate::core::future::AsyncResult;
use crate::dom::event::types;
use crate::dom::markup;
use crate::dom::{Document, DomError, Event, EventDetail, NodeId, NodeKind, listener};

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    Parse(serde_json::Error),
    Http(reqwest::Error),
    Status(u16),
    UnsupportedScheme(String),
    Dom(DomError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "could not read resource: {e}"),
            LoadError::Parse(e) => write!(f, "malformed markup: {e}"),
            LoadError::Http(e) => write!(f, "HTTP request failed: {e}"),
            LoadError::Status(code) => write!(f, "failed to load URL, response code: {code}"),
            LoadError::UnsupportedScheme(scheme) if scheme.len() == 1 => write!(
                f,
                "unrecognized URL scheme: {scheme}. Did you pass in a windows path? Use file:///C:/..."
            ),
            LoadError::UnsupportedScheme(scheme) => write!(f, "unrecognized URL scheme: {scheme}"),
            LoadError::Dom(e) => write!(f, "could not build document: {e}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<DomError> for LoadError {
    fn from(e: DomError) -> Self {
        LoadError::Dom(e)
    }
}

// ============================================================================
// Locations
// ============================================================================

/// Where a location points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    File(PathBuf),
    Http(Url),
}

impl Resource {
    pub fn classify(location: &str) -> Result<Self, LoadError> {
        let url = match Url::parse(location) {
            Ok(url) => url,
            // No scheme at all: a plain path.
            Err(_) => return Ok(Resource::File(PathBuf::from(location))),
        };
        match url.scheme() {
            "http" | "https" => Ok(Resource::Http(url)),
            "file" => url
                .to_file_path()
                .map(Resource::File)
                .map_err(|_| LoadError::UnsupportedScheme("file".to_string())),
            scheme => Err(LoadError::UnsupportedScheme(scheme.to_string())),
        }
    }
}

// ============================================================================
// Loader
// ============================================================================

pub struct ResourceLoader {
    client: reqwest::Client,
    default_theme: NavigationTheme,
}

impl ResourceLoader {
    pub fn new(default_theme: NavigationTheme) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_theme,
        }
    }

    /// Creates a loader that follows `location` events on the window.
    pub fn install(doc: &Document, default_theme: NavigationTheme) -> Result<Arc<Self>, DomError> {
        let loader = Arc::new(Self::new(default_theme));
        let handler = Arc::clone(&loader);
        doc.add_event_listener(
            doc.window(),
            types::LOCATION,
            listener(move |doc, event| handler.on_location_change(doc, event)),
            false,
        )?;
        Ok(loader)
    }

    /// Loads `location` and installs it as the document. File loads finish
    /// before returning; HTTP loads finish on the worker pool. The result is
    /// fulfilled with the new root, or cancelled if the load fails.
    pub fn load(
        self: &Arc<Self>,
        doc: &Document,
        location: &str,
    ) -> Result<AsyncResult<NodeId>, LoadError> {
        let resource = Resource::classify(location)?;
        info!("Loading resource: {}", location);
        let pool = doc.dispatcher().pool().clone();
        let result = AsyncResult::new(pool.clone());
        match resource {
            Resource::File(path) => {
                let source = fs::read_to_string(&path).map_err(LoadError::Io)?;
                let root = self.install_markup(doc, &source)?;
                let _ = result.fulfill(root);
            }
            Resource::Http(url) => {
                let loader = Arc::clone(self);
                let doc = doc.clone();
                let pending = result.clone();
                pool.spawn(async move {
                    let loaded = match loader.fetch(url.clone()).await {
                        Ok(source) => loader.install_markup(&doc, &source),
                        Err(e) => Err(e),
                    };
                    match loaded {
                        Ok(root) => {
                            let _ = pending.fulfill(root);
                        }
                        Err(e) => {
                            error!("Failed to load {}: {}", url, e);
                            let _ = pending.cancel();
                        }
                    }
                });
            }
        }
        Ok(result)
    }

    /// Downloads the markup at `url`.
    pub async fn fetch(&self, url: Url) -> Result<String, LoadError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(LoadError::Http)?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(LoadError::Status(status.as_u16()));
        }
        response.text().await.map_err(LoadError::Http)
    }

    /// Parses and builds `source`, initializes it, swaps it in as the root
    /// and requests focus on it.
    pub fn install_markup(&self, doc: &Document, source: &str) -> Result<NodeId, LoadError> {
        let markup = markup::parse(source).map_err(LoadError::Parse)?;
        let root = markup::build(doc, &markup)?;
        if let Err(e) = self.initialize(doc, root).and_then(|()| doc.set_root(root)) {
            let _ = doc.remove(root);
            return Err(e.into());
        }
        info!("Loaded document {}", doc.describe(root));
        request_focus(doc, root)?;
        Ok(root)
    }

    fn initialize(&self, doc: &Document, root: NodeId) -> Result<(), DomError> {
        let mut containers = Vec::new();
        doc.dfs_do(root, |id, node| {
            if matches!(node.kind(), NodeKind::Container(_)) {
                containers.push(id);
            }
        });
        for container in containers {
            NavigationController::attach(doc, container, self.default_theme)?;
        }
        Ok(())
    }

    fn on_location_change(self: &Arc<Self>, doc: &Document, event: &mut Event) {
        let EventDetail::Location { new, .. } = event.detail() else {
            return;
        };
        let location = new.clone();
        if let Err(e) = self.load(doc, &location) {
            error!("Failed to load {}: {}", location, e);
        }
    }
}
