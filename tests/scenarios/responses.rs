use std::time::SystemTime;

use http::StatusCode;
use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use schemeshell::{
    DescribedResponse, HandlerResponse, NetworkError, ProtocolRequest, Responder, ResponseKind,
};
use tempfile::TempDir;

use crate::local_router;

#[tokio::test]
async fn string_handler_answers_with_cors_header() {
    let router = local_router();
    router
        .register("atom", ResponseKind::String, |_: &ProtocolRequest, responder: Responder| {
            responder.respond("valar morghulis");
        })
        .expect("register");

    let response = router
        .dispatch(ProtocolRequest::get("atom://host/page").expect("url"))
        .await
        .expect("response");

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header_str(ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
    assert_eq!(response.text().await.expect("body"), "valar morghulis");
}

#[tokio::test]
async fn handler_sees_request_details() {
    let router = local_router();
    router
        .register("atom", ResponseKind::String, |request: &ProtocolRequest, responder: Responder| {
            let body = request
                .body_bytes()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            responder.respond(format!("{} {} {body}", request.method(), request.url().path()));
        })
        .expect("register");

    let url = url::Url::parse("atom://host/form").expect("url");
    let request = ProtocolRequest::new(url, http::Method::POST)
        .with_upload(schemeshell::UploadData::new(Some("text/plain"), "payload"));

    let response = router.dispatch(request).await.expect("response");
    assert_eq!(response.text().await.expect("body"), "POST /form payload");
}

#[tokio::test]
async fn described_response_carries_mime_and_status() {
    let router = local_router();
    router
        .register("atom", ResponseKind::Buffer, |_: &ProtocolRequest, responder: Responder| {
            responder.respond(
                DescribedResponse::bytes(&b"{\"ok\":true}"[..])
                    .mime_type("application/json")
                    .status(StatusCode::CREATED),
            );
        })
        .expect("register");

    let response = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect("response");

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.header_str(CONTENT_TYPE), Some("application/json"));
    assert_eq!(response.text().await.expect("body"), "{\"ok\":true}");
}

#[tokio::test]
async fn value_of_unsupported_type_is_a_network_error() {
    let router = local_router();
    router
        .register("atom", ResponseKind::String, |_: &ProtocolRequest, responder: Responder| {
            responder.respond(HandlerResponse::unsupported::<SystemTime>());
        })
        .expect("register");

    let err = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect_err("unsupported answer");
    assert!(matches!(
        err,
        NetworkError::UnsupportedResponseType { kind: ResponseKind::String, .. }
    ));
}

#[tokio::test]
async fn bytes_answer_to_string_handler_is_rejected() {
    let router = local_router();
    router
        .register("atom", ResponseKind::String, |_: &ProtocolRequest, responder: Responder| {
            responder.respond(vec![1u8, 2, 3]);
        })
        .expect("register");

    let err = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect_err("kind mismatch");
    assert_eq!(
        err,
        NetworkError::UnsupportedResponseType {
            kind: ResponseKind::String,
            found: "bytes",
        }
    );
}

#[tokio::test]
async fn file_handler_serves_disk_content() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("index.html");
    std::fs::write(&path, "<p>from disk</p>").expect("write");

    let router = local_router();
    router
        .register("atom", ResponseKind::File, move |_: &ProtocolRequest, responder: Responder| {
            responder.respond(path.clone());
        })
        .expect("register");

    let response = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect("response");

    assert_eq!(response.header_str(CONTENT_TYPE), Some("text/html"));
    assert_eq!(response.text().await.expect("body"), "<p>from disk</p>");
}

#[tokio::test]
async fn missing_file_is_a_network_error() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("missing.html");

    let router = local_router();
    let answer = missing.to_string_lossy().into_owned();
    router
        .register("atom", ResponseKind::File, move |_: &ProtocolRequest, responder: Responder| {
            responder.respond(answer.clone());
        })
        .expect("register");

    let err = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect_err("missing file");
    assert_eq!(err, NetworkError::FileNotFound(missing));
}

#[tokio::test]
async fn handler_error_code_is_surfaced() {
    let router = local_router();
    router
        .register("atom", ResponseKind::String, |_: &ProtocolRequest, responder: Responder| {
            responder.respond(HandlerResponse::Error { code: -2 });
        })
        .expect("register");

    let err = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect_err("handler failure");
    assert_eq!(err, NetworkError::HandlerFailed(-2));
}

#[tokio::test]
async fn intercepted_builtin_scheme_takes_priority() {
    let router = local_router();
    router
        .intercept("https", ResponseKind::String, |request: &ProtocolRequest, responder: Responder| {
            responder.respond(format!("intercepted {}", request.url().host_str().unwrap_or("")));
        })
        .expect("intercept");

    let response = router
        .dispatch(ProtocolRequest::get("https://example.invalid/").expect("url"))
        .await
        .expect("response");
    assert_eq!(response.text().await.expect("body"), "intercepted example.invalid");
}

#[tokio::test]
async fn file_scheme_falls_through_to_disk() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("note.txt");
    std::fs::write(&path, "plain").expect("write");
    let url = url::Url::from_file_path(&path).expect("file url");

    let router = local_router();
    let response = router
        .dispatch(ProtocolRequest::new(url, http::Method::GET))
        .await
        .expect("response");

    assert_eq!(response.header_str(CONTENT_TYPE), Some("text/plain"));
    assert_eq!(response.text().await.expect("body"), "plain");
}
