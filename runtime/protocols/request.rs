/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderName, HeaderValue, REFERER};
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use super::error::NetworkError;

/// One element of a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadData {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadData {
    pub fn new(content_type: Option<&str>, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.map(str::to_owned),
            bytes: bytes.into(),
        }
    }
}

/// Request descriptor handed to scheme handlers.
///
/// Built once per incoming request and never mutated afterwards; handlers
/// that answer later clone what they need.
#[derive(Debug, Clone)]
pub struct ProtocolRequest {
    url: Url,
    method: Method,
    headers: HeaderMap,
    upload_data: Vec<UploadData>,
}

impl ProtocolRequest {
    pub fn new(url: Url, method: Method) -> Self {
        Self {
            url,
            method,
            headers: HeaderMap::new(),
            upload_data: Vec::new(),
        }
    }

    pub fn get(url: &str) -> Result<Self, NetworkError> {
        let url = Url::parse(url).map_err(|e| NetworkError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new(url, Method::GET))
    }

    /// Appends a header value, keeping earlier values for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_upload(mut self, upload: UploadData) -> Self {
        self.upload_data.push(upload);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn upload_data(&self) -> &[UploadData] {
        &self.upload_data
    }

    pub fn referrer(&self) -> Option<&str> {
        self.headers
            .get(REFERER)
            .and_then(|value| value.to_str().ok())
    }

    /// Concatenated upload payload, or `None` for body-less requests.
    pub fn body_bytes(&self) -> Option<Bytes> {
        match self.upload_data.as_slice() {
            [] => None,
            [single] => Some(single.bytes.clone()),
            many => Some(
                many.iter()
                    .flat_map(|upload| upload.bytes.iter().copied())
                    .collect::<Vec<u8>>()
                    .into(),
            ),
        }
    }

    /// Same request aimed at `url`; used when following handler redirects.
    ///
    /// A 303 turns anything but `HEAD` into a body-less `GET`, and so does a
    /// 301 or 302 answering a `POST`.
    pub(crate) fn redirected(&self, url: Url, status: StatusCode) -> Self {
        let mut next = self.clone();
        next.url = url;
        let becomes_get = match status {
            StatusCode::SEE_OTHER => next.method != Method::HEAD && next.method != Method::GET,
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => next.method == Method::POST,
            _ => false,
        };
        if becomes_get {
            next.method = Method::GET;
            next.upload_data.clear();
            next.headers.remove(CONTENT_TYPE);
            next.headers.remove(CONTENT_LENGTH);
        }
        next
    }
}
