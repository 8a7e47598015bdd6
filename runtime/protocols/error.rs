/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::path::PathBuf;

use register_protocol::ResponseKind;

/// A request that failed at the network layer.
///
/// The requesting page observes these the same way it observes a DNS or
/// connection failure; they never escape as process-level faults.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("no handler for scheme '{0}'")]
    NoHandler(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("{kind} handler answered with unsupported response type {found}")]
    UnsupportedResponseType {
        kind: ResponseKind,
        found: &'static str,
    },
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("upstream fetch failed: {0}")]
    UpstreamFetchFailure(String),
    #[error("handler failed the request with code {0}")]
    HandlerFailed(i32),
    #[error("handler dropped its responder without answering")]
    HandlerDropped,
    #[error("redirect limit of {0} exceeded")]
    TooManyRedirects(usize),
    #[error("stream aborted: {0}")]
    StreamAborted(String),
    #[error("i/o error: {0}")]
    Io(String),
}

impl NetworkError {
    /// Short stable label used for diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoHandler(_) => "no_handler",
            Self::InvalidUrl(_) => "invalid_url",
            Self::UnsupportedResponseType { .. } => "unsupported_response_type",
            Self::FileNotFound(_) => "file_not_found",
            Self::UpstreamFetchFailure(_) => "upstream_fetch_failure",
            Self::HandlerFailed(_) => "handler_failed",
            Self::HandlerDropped => "handler_dropped",
            Self::TooManyRedirects(_) => "too_many_redirects",
            Self::StreamAborted(_) => "stream_aborted",
            Self::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}
