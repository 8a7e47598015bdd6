/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Outbound HTTP used by http-kind handlers and by the default handling of
//! `http`/`https` requests nobody intercepted.

use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::StreamExt;
use http::header::HOST;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use super::error::NetworkError;
use super::response::{ResponseBody, UpstreamSession};

#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub session: UpstreamSession,
}

#[derive(Debug)]
pub struct UpstreamResponse {
    /// Where the upstream chain ended after following redirects.
    pub final_url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

pub trait UpstreamFetcher: Send + Sync {
    fn fetch(&self, request: UpstreamRequest) -> BoxFuture<'static, Result<UpstreamResponse, NetworkError>>;
}

impl<F> UpstreamFetcher for F
where
    F: Fn(UpstreamRequest) -> BoxFuture<'static, Result<UpstreamResponse, NetworkError>> + Send + Sync,
{
    fn fetch(&self, request: UpstreamRequest) -> BoxFuture<'static, Result<UpstreamResponse, NetworkError>> {
        self(request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamOptions {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
    /// Honor `HTTP_PROXY`-style environment variables.
    pub system_proxy: bool,
}

impl Default for UpstreamOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 20,
            user_agent: format!("schemeshell/{}", env!("CARGO_PKG_VERSION")),
            system_proxy: true,
        }
    }
}

/// `reqwest`-backed fetcher; follows redirects up to the configured limit
/// and streams the upstream body back as it arrives.
pub struct ReqwestFetcher {
    client: reqwest::Client,
    options: UpstreamOptions,
}

impl ReqwestFetcher {
    pub fn new(options: UpstreamOptions) -> Result<Self, NetworkError> {
        let client = build_client(&options)?;
        Ok(Self { client, options })
    }
}

fn build_client(options: &UpstreamOptions) -> Result<reqwest::Client, NetworkError> {
    let mut builder = reqwest::Client::builder()
        .timeout(options.timeout)
        .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
        .user_agent(options.user_agent.clone());
    if !options.system_proxy {
        builder = builder.no_proxy();
    }
    builder
        .build()
        .map_err(|e| NetworkError::UpstreamFetchFailure(format!("client setup: {e}")))
}

impl UpstreamFetcher for ReqwestFetcher {
    fn fetch(&self, request: UpstreamRequest) -> BoxFuture<'static, Result<UpstreamResponse, NetworkError>> {
        let client = match request.session {
            UpstreamSession::Shared => Ok(self.client.clone()),
            UpstreamSession::Isolated => build_client(&self.options),
        };

        Box::pin(async move {
            let client = client?;
            let url = request.url;
            let mut headers = request.headers;
            headers.remove(HOST);

            let mut builder = client.request(request.method, url.clone()).headers(headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| NetworkError::UpstreamFetchFailure(format!("{url}: {e}")))?;

            let final_url = response.url().clone();
            let status = response.status();
            let headers = response.headers().clone();
            log::debug!("protocol: upstream {url} answered {status} from {final_url}");

            let body = response
                .bytes_stream()
                .map(move |chunk| {
                    chunk.map_err(|e| NetworkError::UpstreamFetchFailure(format!("body of {url}: {e}")))
                })
                .boxed();

            Ok(UpstreamResponse {
                final_url,
                status,
                headers,
                body: ResponseBody::Streaming(body),
            })
        })
    }
}
