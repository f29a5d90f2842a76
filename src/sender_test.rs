use reqwest::StatusCode;

use super::*;
use crate::test_helpers::{CannedResponse, serve_http};

#[tokio::test]
async fn sends_headers_and_body_and_returns_response() {
    let canned = CannedResponse::new(StatusCode::UNAUTHORIZED, "denied").with_header("x-reason", "expired");
    let (base, server) = serve_http(vec![canned]).await;
    let sender = HttpSender::new(HttpTimeouts::default()).unwrap();

    let mut request = ApiRequest::post(format!("{base}/items")).with_body("hello");
    request.set_bearer("tok-1").unwrap();
    let response = sender.send(request).await.unwrap();

    assert!(response.is_unauthorized());
    assert_eq!(response.text(), "denied");
    assert_eq!(response.headers.get("x-reason").unwrap(), "expired");

    let recorded = server.await.unwrap().remove(0);
    assert_eq!(recorded.method, reqwest::Method::POST);
    assert_eq!(recorded.path_and_query, "/items");
    assert_eq!(recorded.header("authorization"), Some("Bearer tok-1"));
    assert_eq!(recorded.body, "hello");
}

#[tokio::test]
async fn unparsable_url_is_transport_error() {
    let sender = HttpSender::new(HttpTimeouts::default()).unwrap();
    let err = sender.send(ApiRequest::get("not a url")).await.unwrap_err();
    match err {
        ShellError::Transport { url, .. } => assert_eq!(url, "not a url"),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_connection_is_retryable_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sender = HttpSender::new(HttpTimeouts::default()).unwrap();
    let err = sender.send(ApiRequest::get(format!("http://{addr}/"))).await.unwrap_err();
    assert!(crate::error::ErrorCode::retryable(&err));
}
