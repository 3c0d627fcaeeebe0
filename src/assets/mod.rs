//! Static file serving for the proxy's own pages.
//!
//! # Responsibilities
//! - Serve the landing page and supporting assets from the public directory
//! - Keep request paths inside that directory
//! - Serve a custom 404 page when one is present
//!
//! # Design Decisions
//! - `index.html` and `404.html` can be cached in memory at startup; other
//!   files are read per request
//! - Path sanitization rejects anything but plain path components, so
//!   traversal never reaches the filesystem

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tokio::fs;

const FALLBACK_NOT_FOUND: &str = "<!DOCTYPE html><html><body><h1>404 Not Found</h1></body></html>";

/// One servable file: its bytes and the content type to label them with.
pub struct StaticFile {
    pub body: Bytes,
    pub content_type: &'static str,
}

/// Serves files beneath a public directory.
pub struct StaticFiles {
    root: PathBuf,
    index: Option<Bytes>,
    not_found: Option<Bytes>,
}

impl StaticFiles {
    /// Open a public directory, optionally preloading the index and 404 pages.
    pub async fn new(root: impl Into<PathBuf>, cache_static: bool) -> Self {
        let root = root.into();
        let (index, not_found) = if cache_static {
            (
                fs::read(root.join("index.html")).await.ok().map(Bytes::from),
                fs::read(root.join("404.html")).await.ok().map(Bytes::from),
            )
        } else {
            (None, None)
        };
        Self { root, index, not_found }
    }

    /// Read the file for a request path. `None` means not found (including
    /// paths that try to escape the public directory).
    pub async fn read(&self, request_path: &str) -> Option<StaticFile> {
        let relative = if request_path == "/" {
            "index.html"
        } else {
            request_path.trim_start_matches('/')
        };

        if relative == "index.html" {
            if let Some(cached) = &self.index {
                return Some(StaticFile {
                    body: cached.clone(),
                    content_type: content_type_for(relative),
                });
            }
        }

        let path = sanitize(&self.root, relative)?;
        let body = fs::read(&path).await.ok()?;
        Some(StaticFile {
            body: Bytes::from(body),
            content_type: content_type_for(relative),
        })
    }

    /// The 404 page: the cached or on-disk `404.html`, or a built-in fallback.
    pub async fn not_found_page(&self) -> StaticFile {
        if let Some(cached) = &self.not_found {
            return StaticFile {
                body: cached.clone(),
                content_type: "text/html; charset=utf-8",
            };
        }
        match fs::read(self.root.join("404.html")).await {
            Ok(body) => StaticFile {
                body: Bytes::from(body),
                content_type: "text/html; charset=utf-8",
            },
            Err(_) => StaticFile {
                body: Bytes::from_static(FALLBACK_NOT_FOUND.as_bytes()),
                content_type: "text/html; charset=utf-8",
            },
        }
    }
}

/// Join a request path onto the root, refusing anything that is not a plain
/// chain of normal components.
fn sanitize(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

fn content_type_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    match extension {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" => "text/plain; charset=utf-8",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
