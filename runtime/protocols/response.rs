/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt;
use std::path::PathBuf;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{BoxStream, StreamExt};
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use super::error::NetworkError;
use super::request::UploadData;
use super::stream::ChunkReceiver;

/// What a handler answers through its [`Responder`](super::responder::Responder).
#[derive(Debug)]
pub enum HandlerResponse {
    /// Body text; a file path for file-kind handlers.
    Text(String),
    Bytes(Bytes),
    Described(DescribedResponse),
    File(FileResponse),
    Http(HttpDelegation),
    Stream(StreamResponse),
    /// Handler-declared network failure code.
    Error { code: i32 },
    /// The handler answered with nothing.
    Empty,
    /// A value of a type the router cannot translate.
    Unsupported { type_name: &'static str },
}

impl HandlerResponse {
    pub fn unsupported<T: ?Sized>() -> Self {
        Self::Unsupported {
            type_name: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Described(_) => "described",
            Self::File(_) => "file",
            Self::Http(_) => "http",
            Self::Stream(_) => "stream",
            Self::Error { .. } => "error",
            Self::Empty => "empty",
            Self::Unsupported { type_name } => type_name,
        }
    }
}

impl From<String> for HandlerResponse {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for HandlerResponse {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Bytes> for HandlerResponse {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for HandlerResponse {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<&'static [u8]> for HandlerResponse {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(bytes))
    }
}

impl From<PathBuf> for HandlerResponse {
    fn from(path: PathBuf) -> Self {
        Self::File(FileResponse::new(path))
    }
}

impl From<DescribedResponse> for HandlerResponse {
    fn from(described: DescribedResponse) -> Self {
        Self::Described(described)
    }
}

impl From<FileResponse> for HandlerResponse {
    fn from(file: FileResponse) -> Self {
        Self::File(file)
    }
}

impl From<HttpDelegation> for HandlerResponse {
    fn from(delegation: HttpDelegation) -> Self {
        Self::Http(delegation)
    }
}

impl From<StreamResponse> for HandlerResponse {
    fn from(stream: StreamResponse) -> Self {
        Self::Stream(stream)
    }
}

impl From<()> for HandlerResponse {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

/// Payload of a [`DescribedResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescribedData {
    Text(String),
    Bytes(Bytes),
}

/// Body plus the metadata the handler wants on the response.
#[derive(Debug, Clone, Default)]
pub struct DescribedResponse {
    pub data: Option<DescribedData>,
    pub mime_type: Option<String>,
    pub charset: Option<String>,
    pub headers: HeaderMap,
    pub status_code: Option<StatusCode>,
}

impl DescribedResponse {
    pub fn text(data: impl Into<String>) -> Self {
        Self {
            data: Some(DescribedData::Text(data.into())),
            ..Self::default()
        }
    }

    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(DescribedData::Bytes(data.into())),
            ..Self::default()
        }
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// Disk file answer for file-kind handlers.
#[derive(Debug, Clone, Default)]
pub struct FileResponse {
    pub path: PathBuf,
    pub headers: HeaderMap,
    pub status_code: Option<StatusCode>,
}

impl FileResponse {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Which upstream client an HTTP delegation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpstreamSession {
    /// The router's long-lived client.
    #[default]
    Shared,
    /// A fresh client built for this request only.
    Isolated,
}

/// Upstream URL an http-kind handler forwards the request to.
#[derive(Debug, Clone)]
pub struct HttpDelegation {
    pub url: String,
    pub method: Option<Method>,
    pub upload_data: Option<UploadData>,
    pub session: UpstreamSession,
}

impl HttpDelegation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            upload_data: None,
            session: UpstreamSession::default(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn upload(mut self, upload: UploadData) -> Self {
        self.upload_data = Some(upload);
        self
    }

    pub fn session(mut self, session: UpstreamSession) -> Self {
        self.session = session;
        self
    }
}

/// Streamed answer. A 3xx status with a `Location` header and no data
/// redirects instead of producing a body.
#[derive(Debug, Default)]
pub struct StreamResponse {
    pub status_code: Option<StatusCode>,
    pub headers: HeaderMap,
    pub data: Option<ChunkReceiver>,
}

impl StreamResponse {
    pub fn new(data: ChunkReceiver) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn redirect(status: StatusCode, location: &str) -> Result<Self, http::header::InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::LOCATION, location.parse()?);
        Ok(Self {
            status_code: Some(status),
            headers,
            data: None,
        })
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// Body of a translated response.
pub enum ResponseBody {
    Empty,
    Full(Bytes),
    Streaming(BoxStream<'static, Result<Bytes, NetworkError>>),
}

impl ResponseBody {
    /// Drains the body, concatenating chunks in arrival order.
    pub async fn collect(self) -> Result<Bytes, NetworkError> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Full(bytes) => Ok(bytes),
            Self::Streaming(mut stream) => {
                let mut buffer = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buffer.extend_from_slice(&chunk?);
                }
                Ok(buffer.freeze())
            }
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Streaming(_) => f.write_str("Streaming(<chunks>)"),
        }
    }
}

/// Network response delivered back to the requesting page.
#[derive(Debug)]
pub struct ProtocolResponse {
    /// URL the page sees; stays the original request URL across redirects.
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub mime_type: Option<String>,
    pub body: ResponseBody,
}

impl ProtocolResponse {
    pub fn new(url: Url, status: StatusCode, body: ResponseBody) -> Self {
        Self {
            url,
            status,
            headers: HeaderMap::new(),
            mime_type: None,
            body,
        }
    }

    pub fn header_str(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub async fn text(self) -> Result<String, NetworkError> {
        let bytes = self.body.collect().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| NetworkError::StreamAborted(format!("body is not utf-8: {e}")))
    }
}
