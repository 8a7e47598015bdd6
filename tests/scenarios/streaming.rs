use std::time::Duration;

use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use schemeshell::{
    NetworkError, ProtocolRequest, Responder, ResponseKind, StreamResponse, stream_channel,
};

use crate::local_router;

#[tokio::test]
async fn stream_chunks_arrive_in_order() {
    let router = local_router();
    router
        .register("atom", ResponseKind::Stream, |_: &ProtocolRequest, responder: Responder| {
            let (sender, receiver) = stream_channel();
            responder.respond(
                StreamResponse::new(receiver)
                    .header(CONTENT_TYPE, HeaderValue::from_static("text/plain")),
            );
            tokio::spawn(async move {
                for chunk in ["val", "ar ", "morghulis"] {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    sender.push(chunk);
                }
                sender.end();
            });
        })
        .expect("register");

    let response = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect("response");

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_streaming());
    assert_eq!(response.header_str(CONTENT_TYPE), Some("text/plain"));
    assert_eq!(response.text().await.expect("body"), "valar morghulis");
}

#[tokio::test]
async fn aborted_stream_fails_the_body() {
    let router = local_router();
    router
        .register("atom", ResponseKind::Stream, |_: &ProtocolRequest, responder: Responder| {
            let (sender, receiver) = stream_channel();
            responder.respond(StreamResponse::new(receiver));
            sender.push("partial");
            sender.abort("disk unplugged");
        })
        .expect("register");

    let response = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect("headers arrive before the failure");

    let err = response.body.collect().await.expect_err("aborted");
    assert!(matches!(err, NetworkError::StreamAborted(reason) if reason.contains("disk unplugged")));
}

#[tokio::test]
async fn stream_redirect_is_dispatched_again() {
    let router = local_router();
    router
        .register("atom", ResponseKind::Stream, |request: &ProtocolRequest, responder: Responder| {
            if request.url().path() == "/old" {
                let redirect = StreamResponse::redirect(StatusCode::FOUND, "/new").expect("location");
                responder.respond(redirect);
                return;
            }
            let (sender, receiver) = stream_channel();
            responder.respond(StreamResponse::new(receiver));
            sender.push(format!("at {}", request.url().path()));
        })
        .expect("register");

    let response = router
        .dispatch(ProtocolRequest::get("atom://host/old").expect("url"))
        .await
        .expect("response");
    assert_eq!(response.text().await.expect("body"), "at /new");
}

#[tokio::test]
async fn dropped_responder_fails_the_request() {
    let router = local_router();
    router
        .register("atom", ResponseKind::Stream, |_: &ProtocolRequest, _responder: Responder| {})
        .expect("register");

    let err = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect_err("no answer");
    assert_eq!(err, NetworkError::HandlerDropped);
}
