/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Turns a handler's answer into a network response.

use std::path::Path;

use headers::{ContentType, HeaderMapExt};
use http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, LOCATION,
};
use http::{HeaderMap, StatusCode};
use register_protocol::ResponseKind;
use url::Url;

use super::error::NetworkError;
use super::request::ProtocolRequest;
use super::response::{
    DescribedData, DescribedResponse, FileResponse, HandlerResponse, HttpDelegation,
    ProtocolResponse, ResponseBody, StreamResponse,
};
use super::upstream::{UpstreamFetcher, UpstreamRequest};

const DEFAULT_MIME_TYPE: &str = "text/html";

pub(crate) enum Translation {
    Response(ProtocolResponse),
    /// A stream handler asked for the request to be re-dispatched.
    Redirect { url: Url, status: StatusCode },
}

pub(crate) async fn translate(
    kind: ResponseKind,
    request: &ProtocolRequest,
    answer: HandlerResponse,
    fetcher: &dyn UpstreamFetcher,
) -> Result<Translation, NetworkError> {
    let response = match (kind, answer) {
        (_, HandlerResponse::Error { code }) => return Err(NetworkError::HandlerFailed(code)),
        (ResponseKind::String, HandlerResponse::Text(text)) => {
            described_response(request, DescribedResponse::text(text))
        }
        (ResponseKind::Buffer, HandlerResponse::Bytes(bytes)) => {
            described_response(request, DescribedResponse::bytes(bytes))
        }
        (ResponseKind::String | ResponseKind::Buffer, HandlerResponse::Described(described)) => {
            described_response(request, described)
        }
        (ResponseKind::File, HandlerResponse::Text(path)) => {
            file_response(request, FileResponse::new(path)).await?
        }
        (ResponseKind::File, HandlerResponse::File(file)) => file_response(request, file).await?,
        (ResponseKind::Http, HandlerResponse::Http(delegation)) => {
            delegated_response(request, delegation, fetcher).await?
        }
        (ResponseKind::Stream, HandlerResponse::Stream(stream)) => {
            return stream_response(request, stream);
        }
        (kind, other) => {
            return Err(NetworkError::UnsupportedResponseType {
                kind,
                found: other.shape(),
            });
        }
    };
    Ok(Translation::Response(response))
}

/// Lets pages on other origins read handler-produced responses.
pub(crate) fn allow_any_origin(headers: &mut HeaderMap) {
    if !headers.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    }
}

fn described_response(request: &ProtocolRequest, described: DescribedResponse) -> ProtocolResponse {
    let body = match described.data {
        Some(DescribedData::Text(text)) => ResponseBody::Full(text.into()),
        Some(DescribedData::Bytes(bytes)) => ResponseBody::Full(bytes),
        None => ResponseBody::Empty,
    };
    let status = described.status_code.unwrap_or(StatusCode::OK);
    let mut response = ProtocolResponse::new(request.url().clone(), status, body);
    response.headers = described.headers;

    let mime_type = described
        .mime_type
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
    if !response.headers.contains_key(CONTENT_TYPE) {
        let content_type = match &described.charset {
            Some(charset) => format!("{mime_type}; charset={charset}"),
            None => mime_type.clone(),
        };
        match HeaderValue::from_str(&content_type) {
            Ok(value) => {
                response.headers.insert(CONTENT_TYPE, value);
            }
            Err(_) => log::warn!("protocol: dropping unusable mime type '{content_type}'"),
        }
    }
    response.mime_type = Some(mime_type);
    response
}

async fn file_response(
    request: &ProtocolRequest,
    file: FileResponse,
) -> Result<ProtocolResponse, NetworkError> {
    let (bytes, mime) = load_file(&file.path).await?;
    let status = file.status_code.unwrap_or(StatusCode::OK);
    let mut response = ProtocolResponse::new(request.url().clone(), status, ResponseBody::Full(bytes));
    response.headers = file.headers;
    if !response.headers.contains_key(CONTENT_TYPE) {
        response.headers.typed_insert(ContentType::from(mime.clone()));
    }
    response.mime_type = Some(mime.essence_str().to_string());
    Ok(response)
}

/// Reads a whole file and guesses its mime type from the extension.
pub(crate) async fn load_file(path: &Path) -> Result<(bytes::Bytes, mime_guess::Mime), NetworkError> {
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(NetworkError::FileNotFound(path.to_path_buf()));
    }
    let bytes = tokio::fs::read(path).await?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok((bytes.into(), mime))
}

async fn delegated_response(
    request: &ProtocolRequest,
    delegation: HttpDelegation,
    fetcher: &dyn UpstreamFetcher,
) -> Result<ProtocolResponse, NetworkError> {
    let url = Url::parse(&delegation.url).map_err(|e| {
        NetworkError::UpstreamFetchFailure(format!("invalid upstream url '{}': {e}", delegation.url))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(NetworkError::UpstreamFetchFailure(format!(
            "upstream url '{url}' is not http(s)"
        )));
    }

    let mut headers = request.headers().clone();
    let body = match delegation.upload_data {
        Some(upload) => {
            replace_body_headers(&mut headers, upload.content_type.as_deref());
            Some(upload.bytes)
        }
        None => request.body_bytes(),
    };
    let upstream = fetcher
        .fetch(UpstreamRequest {
            url,
            method: delegation.method.unwrap_or_else(|| request.method().clone()),
            headers,
            body,
            session: delegation.session,
        })
        .await?;

    let mut response = ProtocolResponse::new(request.url().clone(), upstream.status, upstream.body);
    response.mime_type = mime_of(&upstream.headers);
    response.headers = upstream.headers;
    Ok(response)
}

/// Swaps the page's body headers for those of a handler-supplied upload.
fn replace_body_headers(headers: &mut HeaderMap, content_type: Option<&str>) {
    headers.remove(CONTENT_LENGTH);
    headers.remove(CONTENT_TYPE);
    let Some(content_type) = content_type else {
        return;
    };
    match HeaderValue::from_str(content_type) {
        Ok(value) => {
            headers.insert(CONTENT_TYPE, value);
        }
        Err(_) => log::warn!("protocol: dropping unusable upload content type '{content_type}'"),
    }
}

fn stream_response(
    request: &ProtocolRequest,
    stream: StreamResponse,
) -> Result<Translation, NetworkError> {
    let status = stream.status_code.unwrap_or(StatusCode::OK);
    if status.is_redirection() {
        if let Some(location) = stream.headers.get(LOCATION).and_then(|value| value.to_str().ok()) {
            let next = request.url().join(location).map_err(|e| {
                NetworkError::InvalidUrl(format!("redirect target '{location}': {e}"))
            })?;
            return Ok(Translation::Redirect { url: next, status });
        }
    }

    let body = match stream.data {
        Some(receiver) => ResponseBody::Streaming(receiver.into_stream()),
        None => ResponseBody::Empty,
    };
    let mut response = ProtocolResponse::new(request.url().clone(), status, body);
    response.mime_type = mime_of(&stream.headers);
    response.headers = stream.headers;
    Ok(Translation::Response(response))
}

fn mime_of(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<ContentType>()
        .map(|content_type| mime_guess::Mime::from(content_type).essence_str().to_string())
}
