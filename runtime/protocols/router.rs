/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Scheme request router.
//!
//! Owns the scheme table and mediates between the host's request pipeline
//! and application handlers. The router is an explicitly constructed value;
//! clones share one table.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use headers::{ContentType, HeaderMapExt};
use http::StatusCode;
use parking_lot::RwLock;
use register_protocol::{RegistrationError, ResponseKind, SchemeMode, SchemeTable};

use super::error::NetworkError;
use super::request::ProtocolRequest;
use super::responder::Responder;
use super::response::{ProtocolResponse, ResponseBody, UpstreamSession};
use super::translate::{Translation, allow_any_origin, load_file, translate};
use super::upstream::{ReqwestFetcher, UpstreamFetcher, UpstreamOptions, UpstreamRequest};
use crate::runtime::diagnostics::{
    CHANNEL_PROTOCOL_REQUEST_COMPLETED, CHANNEL_PROTOCOL_REQUEST_DISPATCHED,
    CHANNEL_PROTOCOL_REQUEST_FAILED, CHANNEL_PROTOCOL_REQUEST_FALLTHROUGH,
    CHANNEL_PROTOCOL_REQUEST_REDIRECTED, CHANNEL_PROTOCOL_SCHEME_INTERCEPTED,
    CHANNEL_PROTOCOL_SCHEME_REGISTERED, CHANNEL_PROTOCOL_SCHEME_UNINTERCEPTED,
    CHANNEL_PROTOCOL_SCHEME_UNREGISTERED, DiagnosticEvent, DiagnosticsSink, emit_event,
};

/// Application code answering requests for one scheme.
///
/// Called once per matching request. The handler answers through the
/// [`Responder`], immediately or from a task it spawns.
pub trait SchemeHandler: Send + Sync {
    fn handle(&self, request: &ProtocolRequest, responder: Responder);
}

impl<F> SchemeHandler for F
where
    F: Fn(&ProtocolRequest, Responder) + Send + Sync,
{
    fn handle(&self, request: &ProtocolRequest, responder: Responder) {
        self(request, responder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOptions {
    /// Limit for stream-handler redirects; also applied to upstream fetches.
    pub max_redirects: usize,
    pub upstream: UpstreamOptions,
}

impl Default for RouterOptions {
    fn default() -> Self {
        let upstream = UpstreamOptions::default();
        Self {
            max_redirects: upstream.max_redirects,
            upstream,
        }
    }
}

type HandlerSlot = Arc<dyn SchemeHandler>;

struct RouterInner {
    table: RwLock<SchemeTable<HandlerSlot>>,
    fetcher: Arc<dyn UpstreamFetcher>,
    options: RouterOptions,
    diagnostics: Option<DiagnosticsSink>,
}

#[derive(Clone)]
pub struct SchemeRouter {
    inner: Arc<RouterInner>,
}

pub struct SchemeRouterBuilder {
    options: RouterOptions,
    fetcher: Option<Arc<dyn UpstreamFetcher>>,
    diagnostics: Option<Sender<DiagnosticEvent>>,
}

impl SchemeRouterBuilder {
    /// Replaces the `reqwest` fetcher used for http delegation and default
    /// `http`/`https` handling.
    pub fn fetcher(mut self, fetcher: Arc<dyn UpstreamFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn diagnostics(mut self, sender: Sender<DiagnosticEvent>) -> Self {
        self.diagnostics = Some(sender);
        self
    }

    pub fn build(self) -> Result<SchemeRouter, NetworkError> {
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => {
                let mut upstream = self.options.upstream.clone();
                upstream.max_redirects = self.options.max_redirects;
                Arc::new(ReqwestFetcher::new(upstream)?)
            }
        };
        Ok(SchemeRouter {
            inner: Arc::new(RouterInner {
                table: RwLock::new(SchemeTable::new()),
                fetcher,
                options: self.options,
                diagnostics: self.diagnostics.map(DiagnosticsSink::new),
            }),
        })
    }
}

impl SchemeRouter {
    pub fn builder(options: RouterOptions) -> SchemeRouterBuilder {
        SchemeRouterBuilder {
            options,
            fetcher: None,
            diagnostics: None,
        }
    }

    pub fn new(options: RouterOptions) -> Result<Self, NetworkError> {
        Self::builder(options).build()
    }

    pub fn options(&self) -> &RouterOptions {
        &self.inner.options
    }

    /// Claims a scheme that nothing handles yet.
    pub fn register<H>(&self, scheme: &str, kind: ResponseKind, handler: H) -> Result<(), RegistrationError>
    where
        H: SchemeHandler + 'static,
    {
        self.claim(SchemeMode::Registered, scheme, kind, Arc::new(handler))
    }

    /// Takes over a scheme ahead of its registered or built-in handling.
    pub fn intercept<H>(&self, scheme: &str, kind: ResponseKind, handler: H) -> Result<(), RegistrationError>
    where
        H: SchemeHandler + 'static,
    {
        self.claim(SchemeMode::Intercepted, scheme, kind, Arc::new(handler))
    }

    pub fn unregister(&self, scheme: &str) -> Result<(), RegistrationError> {
        self.release(SchemeMode::Registered, scheme)
    }

    pub fn unintercept(&self, scheme: &str) -> Result<(), RegistrationError> {
        self.release(SchemeMode::Intercepted, scheme)
    }

    pub fn is_handled(&self, scheme: &str) -> bool {
        self.inner.table.read().is_handled(scheme)
    }

    pub fn is_registered(&self, scheme: &str) -> bool {
        self.inner.table.read().contains(SchemeMode::Registered, scheme)
    }

    pub fn is_intercepted(&self, scheme: &str) -> bool {
        self.inner.table.read().contains(SchemeMode::Intercepted, scheme)
    }

    pub fn registered_schemes(&self) -> Vec<String> {
        self.inner.table.read().schemes(SchemeMode::Registered)
    }

    pub fn intercepted_schemes(&self) -> Vec<String> {
        self.inner.table.read().schemes(SchemeMode::Intercepted)
    }

    /// Drops every registration. Requests already routed keep their handler
    /// and run to completion.
    pub fn shutdown(&self) {
        let mut table = self.inner.table.write();
        log::debug!("protocol: router shutdown, dropping {} registrations", table.len());
        table.clear();
    }

    /// Routes one request and waits for its response.
    ///
    /// There is no timeout: a handler that keeps its responder without
    /// answering keeps the request pending.
    pub async fn dispatch(&self, request: ProtocolRequest) -> Result<ProtocolResponse, NetworkError> {
        let started = Instant::now();
        let url = request.url().to_string();
        let result = self.dispatch_following_redirects(request).await;
        let latency_us = started.elapsed().as_micros() as u64;

        match &result {
            Ok(response) => {
                log::debug!("protocol: {url} -> {}", response.status);
                self.emit(DiagnosticEvent::MessageReceived {
                    channel_id: CHANNEL_PROTOCOL_REQUEST_COMPLETED,
                    latency_us,
                });
            }
            Err(error) => {
                log::warn!("protocol: {url} failed ({}): {error}", error.label());
                self.emit(DiagnosticEvent::MessageReceived {
                    channel_id: CHANNEL_PROTOCOL_REQUEST_FAILED,
                    latency_us,
                });
            }
        }
        result
    }

    fn claim(
        &self,
        mode: SchemeMode,
        scheme: &str,
        kind: ResponseKind,
        handler: HandlerSlot,
    ) -> Result<(), RegistrationError> {
        self.inner.table.write().insert(mode, scheme, kind, handler)?;
        let channel_id = match mode {
            SchemeMode::Registered => CHANNEL_PROTOCOL_SCHEME_REGISTERED,
            SchemeMode::Intercepted => CHANNEL_PROTOCOL_SCHEME_INTERCEPTED,
        };
        self.emit(DiagnosticEvent::MessageSent {
            channel_id,
            byte_len: scheme.len(),
        });
        Ok(())
    }

    fn release(&self, mode: SchemeMode, scheme: &str) -> Result<(), RegistrationError> {
        self.inner.table.write().remove(mode, scheme)?;
        let channel_id = match mode {
            SchemeMode::Registered => CHANNEL_PROTOCOL_SCHEME_UNREGISTERED,
            SchemeMode::Intercepted => CHANNEL_PROTOCOL_SCHEME_UNINTERCEPTED,
        };
        self.emit(DiagnosticEvent::MessageSent {
            channel_id,
            byte_len: scheme.len(),
        });
        Ok(())
    }

    async fn dispatch_following_redirects(
        &self,
        mut request: ProtocolRequest,
    ) -> Result<ProtocolResponse, NetworkError> {
        let mut redirects = 0usize;
        loop {
            match self.dispatch_once(&request).await? {
                Translation::Response(response) => return Ok(response),
                Translation::Redirect { url: next, status } => {
                    redirects += 1;
                    if redirects > self.inner.options.max_redirects {
                        return Err(NetworkError::TooManyRedirects(self.inner.options.max_redirects));
                    }
                    log::debug!("protocol: {} redirected ({status}) to {next}", request.url());
                    self.emit(DiagnosticEvent::MessageSent {
                        channel_id: CHANNEL_PROTOCOL_REQUEST_REDIRECTED,
                        byte_len: next.as_str().len(),
                    });
                    request = request.redirected(next, status);
                }
            }
        }
    }

    async fn dispatch_once(&self, request: &ProtocolRequest) -> Result<Translation, NetworkError> {
        let registration = self
            .inner
            .table
            .read()
            .lookup(request.scheme())
            .map(|registration| (registration.kind, Arc::clone(&registration.handler)));

        let Some((kind, handler)) = registration else {
            self.emit(DiagnosticEvent::MessageSent {
                channel_id: CHANNEL_PROTOCOL_REQUEST_FALLTHROUGH,
                byte_len: request.url().as_str().len(),
            });
            return self.default_handling(request).await.map(Translation::Response);
        };

        self.emit(DiagnosticEvent::MessageSent {
            channel_id: CHANNEL_PROTOCOL_REQUEST_DISPATCHED,
            byte_len: request.url().as_str().len(),
        });

        let (responder, answer) = Responder::channel(request.url().as_str());
        handler.handle(request, responder);
        let answer = answer.await.map_err(|_| NetworkError::HandlerDropped)?;

        match translate(kind, request, answer, self.inner.fetcher.as_ref()).await? {
            Translation::Response(mut response) => {
                allow_any_origin(&mut response.headers);
                Ok(Translation::Response(response))
            }
            redirect => Ok(redirect),
        }
    }

    /// What the host network layer does for schemes nobody claimed.
    async fn default_handling(&self, request: &ProtocolRequest) -> Result<ProtocolResponse, NetworkError> {
        let url = request.url();
        match url.scheme() {
            "http" | "https" => {
                let upstream = self
                    .inner
                    .fetcher
                    .fetch(UpstreamRequest {
                        url: url.clone(),
                        method: request.method().clone(),
                        headers: request.headers().clone(),
                        body: request.body_bytes(),
                        session: UpstreamSession::Shared,
                    })
                    .await?;
                let mut response = ProtocolResponse::new(upstream.final_url, upstream.status, upstream.body);
                response.headers = upstream.headers;
                Ok(response)
            }
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| NetworkError::InvalidUrl(url.to_string()))?;
                let (bytes, mime) = load_file(&path).await?;
                let mut response = ProtocolResponse::new(url.clone(), StatusCode::OK, ResponseBody::Full(bytes));
                response.mime_type = Some(mime.essence_str().to_string());
                response.headers.typed_insert(ContentType::from(mime));
                Ok(response)
            }
            "about" if url.path() == "blank" => {
                let mut response = ProtocolResponse::new(url.clone(), StatusCode::OK, ResponseBody::Empty);
                response.mime_type = Some("text/html".to_string());
                Ok(response)
            }
            _ => Err(NetworkError::NoHandler(url.scheme().to_string())),
        }
    }

    fn emit(&self, event: DiagnosticEvent) {
        emit_event(self.inner.diagnostics.as_ref(), event);
    }
}

impl std::fmt::Debug for SchemeRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.inner.table.read();
        f.debug_struct("SchemeRouter")
            .field("registered", &table.schemes(SchemeMode::Registered))
            .field("intercepted", &table.schemes(SchemeMode::Intercepted))
            .field("options", &self.inner.options)
            .finish()
    }
}
