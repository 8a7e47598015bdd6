/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Ready-made handlers that configuration files can mount on a router.
//!
//! Directory-backed routes map the URL path under a root directory and
//! refuse paths that try to climb out of it.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;
use url::Url;

use crate::runtime::protocols::request::ProtocolRequest;
use crate::runtime::protocols::responder::Responder;
use crate::runtime::protocols::response::{
    DescribedResponse, FileResponse, HandlerResponse, HttpDelegation, StreamResponse,
};
use crate::runtime::protocols::router::{SchemeHandler, SchemeRouter};
use crate::runtime::protocols::stream::stream_channel;
use crate::shell::config::{ConfigError, RouteConfig, RouteKind, RouteMode};

/// Chunk size used when streaming files.
pub const FILE_CHUNK_SIZE: usize = 32 * 1024;

/// Chromium `net::ERR_FAILED`.
pub const ERR_FAILED: i32 = -2;
/// Chromium `net::ERR_FILE_NOT_FOUND`.
pub const ERR_FILE_NOT_FOUND: i32 = -6;
/// Chromium `net::ERR_ACCESS_DENIED`.
pub const ERR_ACCESS_DENIED: i32 = -10;

const INDEX_FILE: &str = "index.html";

pub struct TextRoute {
    body: String,
    mime_type: Option<String>,
}

impl TextRoute {
    pub fn new(body: impl Into<String>, mime_type: Option<String>) -> Self {
        Self {
            body: body.into(),
            mime_type,
        }
    }
}

impl SchemeHandler for TextRoute {
    fn handle(&self, _request: &ProtocolRequest, responder: Responder) {
        let mut described = DescribedResponse::text(self.body.clone());
        described.mime_type = self.mime_type.clone();
        responder.respond(described);
    }
}

pub struct BufferRoute {
    bytes: Bytes,
    mime_type: Option<String>,
}

impl BufferRoute {
    pub fn new(bytes: impl Into<Bytes>, mime_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type,
        }
    }

    pub fn from_file(path: &Path, mime_type: Option<String>) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime_type = mime_type.or_else(|| {
            mime_guess::from_path(path)
                .first_raw()
                .map(str::to_owned)
        });
        Ok(Self::new(bytes, mime_type))
    }
}

impl SchemeHandler for BufferRoute {
    fn handle(&self, _request: &ProtocolRequest, responder: Responder) {
        let mut described = DescribedResponse::bytes(self.bytes.clone());
        described.mime_type = self.mime_type.clone();
        responder.respond(described);
    }
}

pub struct DirectoryRoute {
    root: PathBuf,
}

impl DirectoryRoute {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SchemeHandler for DirectoryRoute {
    fn handle(&self, request: &ProtocolRequest, responder: Responder) {
        match resolve_under_root(&self.root, request.url()) {
            Some(path) => responder.respond(FileResponse::new(path)),
            None => responder.respond(HandlerResponse::Error {
                code: ERR_ACCESS_DENIED,
            }),
        };
    }
}

/// Serves files from a directory as chunked streams.
///
/// Reads run on the tokio runtime captured at construction, or on the
/// runtime current at dispatch time when none was captured.
pub struct StreamDirectoryRoute {
    root: PathBuf,
    chunk_size: usize,
    runtime: Option<Handle>,
}

impl StreamDirectoryRoute {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: FILE_CHUNK_SIZE,
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

impl SchemeHandler for StreamDirectoryRoute {
    fn handle(&self, request: &ProtocolRequest, responder: Responder) {
        let Some(path) = resolve_under_root(&self.root, request.url()) else {
            responder.respond(HandlerResponse::Error {
                code: ERR_ACCESS_DENIED,
            });
            return;
        };
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            log::error!("protocol: stream route for {} has no tokio runtime", request.url());
            responder.respond(HandlerResponse::Error { code: ERR_FAILED });
            return;
        };
        let chunk_size = self.chunk_size;

        runtime.spawn(async move {
            let mut file = match tokio::fs::File::open(&path).await {
                Ok(file) => file,
                Err(e) => {
                    log::debug!("protocol: stream route cannot open {}: {e}", path.display());
                    responder.respond(HandlerResponse::Error {
                        code: ERR_FILE_NOT_FOUND,
                    });
                    return;
                }
            };

            let (tx, rx) = stream_channel();
            let mut response = StreamResponse::new(rx);
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                response.headers.insert(CONTENT_TYPE, value);
            }
            responder.respond(response);

            let mut buffer = vec![0u8; chunk_size];
            loop {
                match file.read(&mut buffer).await {
                    Ok(0) => break,
                    Ok(read) => {
                        if !tx.push(Bytes::copy_from_slice(&buffer[..read])) {
                            break;
                        }
                    }
                    Err(e) => {
                        tx.abort(format!("reading {}: {e}", path.display()));
                        return;
                    }
                }
            }
            tx.end();
        });
    }
}

/// Delegates every request to the same path under an upstream base URL.
pub struct UpstreamRoute {
    base: Url,
}

impl UpstreamRoute {
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

impl SchemeHandler for UpstreamRoute {
    fn handle(&self, request: &ProtocolRequest, responder: Responder) {
        let url = request.url();
        let mut relative = url.path().trim_start_matches('/').to_string();
        if let Some(query) = url.query() {
            relative.push('?');
            relative.push_str(query);
        }
        match self.base.join(&relative) {
            Ok(target) => responder.respond(HttpDelegation::new(target.to_string())),
            Err(e) => {
                log::warn!("protocol: cannot map {url} onto {}: {e}", self.base);
                responder.respond(HandlerResponse::Error {
                    code: ERR_ACCESS_DENIED,
                })
            }
        };
    }
}

/// Maps the decoded URL path under `root`; `None` when a segment would
/// escape the root or is not valid UTF-8.
pub fn resolve_under_root(root: &Path, url: &Url) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut joined_any = false;
    for segment in url.path_segments().into_iter().flatten() {
        let segment = percent_decode_str(segment).decode_utf8().ok()?;
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." || segment.contains('/') || segment.contains('\\') {
            return None;
        }
        path.push(&*segment);
        joined_any = true;
    }
    if !joined_any {
        path.push(INDEX_FILE);
    }
    Some(path)
}

/// Registers or intercepts every configured route.
pub fn mount_routes(router: &SchemeRouter, routes: &[RouteConfig]) -> Result<usize, ConfigError> {
    for route in routes {
        let handler = build_handler(route)?;
        let kind = route.kind.into();
        let result = match route.mode {
            RouteMode::Register => router.register(&route.scheme, kind, BoxedHandler(handler)),
            RouteMode::Intercept => router.intercept(&route.scheme, kind, BoxedHandler(handler)),
        };
        result.map_err(|e| invalid(route, e.to_string()))?;
        log::info!("protocol: mounted {:?} route for '{}' as {kind}", route.mode, route.scheme);
    }
    Ok(routes.len())
}

struct BoxedHandler(Box<dyn SchemeHandler>);

impl SchemeHandler for BoxedHandler {
    fn handle(&self, request: &ProtocolRequest, responder: Responder) {
        self.0.handle(request, responder)
    }
}

fn build_handler(route: &RouteConfig) -> Result<Box<dyn SchemeHandler>, ConfigError> {
    let handler: Box<dyn SchemeHandler> = match route.kind {
        RouteKind::String => {
            let body = route
                .body
                .clone()
                .ok_or_else(|| invalid(route, "string routes need `body`"))?;
            Box::new(TextRoute::new(body, route.mime_type.clone()))
        }
        RouteKind::Buffer => {
            let path = route
                .path
                .as_deref()
                .ok_or_else(|| invalid(route, "buffer routes need `path`"))?;
            let buffer = BufferRoute::from_file(path, route.mime_type.clone())
                .map_err(|e| invalid(route, format!("reading {}: {e}", path.display())))?;
            Box::new(buffer)
        }
        RouteKind::File => Box::new(DirectoryRoute::new(required_root(route)?)),
        RouteKind::Stream => Box::new(StreamDirectoryRoute::new(required_root(route)?)),
        RouteKind::Http => {
            let upstream = route
                .upstream
                .as_deref()
                .ok_or_else(|| invalid(route, "http routes need `upstream`"))?;
            let base = Url::parse(upstream).map_err(|e| invalid(route, format!("upstream: {e}")))?;
            Box::new(UpstreamRoute::new(base))
        }
    };
    Ok(handler)
}

fn required_root(route: &RouteConfig) -> Result<PathBuf, ConfigError> {
    route
        .root
        .clone()
        .ok_or_else(|| invalid(route, "directory routes need `root`"))
}

fn invalid(route: &RouteConfig, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidRoute {
        scheme: route.scheme.clone(),
        reason: reason.into(),
    }
}
