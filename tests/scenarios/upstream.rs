use std::net::SocketAddr;

use axum::Router;
use axum::http::{StatusCode as AxumStatus, header as axum_header};
use axum::routing::{get, post};
use http::StatusCode;
use schemeshell::{HttpDelegation, ProtocolRequest, Responder, ResponseKind, UploadData};

use crate::local_router;

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/first",
            get(|| async { (AxumStatus::MOVED_PERMANENTLY, [(axum_header::LOCATION, "/second")]) }),
        )
        .route("/second", get(|| async { "second upstream" }))
        .route("/echo", post(|body: String| async move { format!("echo {body}") }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

#[tokio::test]
async fn http_delegation_follows_upstream_redirects() {
    let addr = spawn_upstream().await;
    let router = local_router();
    router
        .register("atom", ResponseKind::Http, move |_: &ProtocolRequest, responder: Responder| {
            responder.respond(HttpDelegation::new(format!("http://{addr}/first")));
        })
        .expect("register");

    let response = router
        .dispatch(ProtocolRequest::get("atom://host/page").expect("url"))
        .await
        .expect("response");

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.url.as_str(), "atom://host/page");
    assert_eq!(response.text().await.expect("body"), "second upstream");
}

#[tokio::test]
async fn http_delegation_forwards_upload_data() {
    let addr = spawn_upstream().await;
    let router = local_router();
    router
        .register("atom", ResponseKind::Http, move |_: &ProtocolRequest, responder: Responder| {
            responder.respond(
                HttpDelegation::new(format!("http://{addr}/echo"))
                    .method(http::Method::POST)
                    .upload(UploadData::new(Some("text/plain"), "ping")),
            );
        })
        .expect("register");

    let response = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect("response");
    assert_eq!(response.text().await.expect("body"), "echo ping");
}

#[tokio::test]
async fn unintercepted_http_reaches_the_network() {
    let addr = spawn_upstream().await;
    let router = local_router();
    let url = format!("http://{addr}/second");

    router
        .intercept("http", ResponseKind::String, |_: &ProtocolRequest, responder: Responder| {
            responder.respond("intercepted");
        })
        .expect("intercept");
    let intercepted = router
        .dispatch(ProtocolRequest::get(&url).expect("url"))
        .await
        .expect("intercepted response");
    assert_eq!(intercepted.text().await.expect("body"), "intercepted");

    router.unintercept("http").expect("unintercept");
    let network = router
        .dispatch(ProtocolRequest::get(&url).expect("url"))
        .await
        .expect("network response");
    assert_eq!(network.text().await.expect("body"), "second upstream");
}
