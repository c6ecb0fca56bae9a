//! HyperTransport and generated services against a local HTTP/1.1 server.

use cloudnet::base::neterror::NetError;
use cloudnet::config::{HttpLogLevel, NetworkConfig};
use cloudnet::context::NetworkContext;
use cloudnet::http::{HttpRequest, HyperTransport, Transport, TransportConfig};
use cloudnet::service::ServiceDescriptor;
use cloudnet::storage::InMemoryStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

/// Serves `route(request_head)` on every connection and records the heads.
async fn serve(
    route: impl Fn(&str, &str) -> String + Send + Sync + 'static,
) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let heads = Arc::new(Mutex::new(Vec::new()));
    let route = Arc::new(route);

    let recorded = heads.clone();
    let server_url = base_url.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                continue;
            };
            let route = route.clone();
            let recorded = recorded.clone();
            let server_url = server_url.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                recorded.lock().push(head.clone());
                let response = route(&head, &server_url);
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    (base_url, heads)
}

fn ok(body: &str, extra: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        body.len(),
        extra,
        body
    )
}

#[tokio::test]
async fn test_get_round_trip() {
    let (base, heads) = serve(|_, _| ok("hello", "X-Server: local\r\n")).await;
    let transport = HyperTransport::default();

    let url = Url::parse(&format!("{}/v1/ping?x=1", base)).unwrap();
    let resp = transport.send(HttpRequest::get(url.clone())).await.unwrap();

    assert_eq!(resp.code(), 200);
    assert_eq!(resp.text().unwrap(), "hello");
    assert_eq!(resp.header("x-server"), Some("local"));
    assert_eq!(resp.url, url);

    let head = heads.lock()[0].clone();
    assert!(head.starts_with("GET /v1/ping?x=1 HTTP/1.1\r\n"), "{}", head);
    assert!(head.to_ascii_lowercase().contains("host: 127.0.0.1:"));
    assert!(head.to_ascii_lowercase().contains("user-agent: cloudnet/"));
}

#[tokio::test]
async fn test_redirect_is_returned_untouched() {
    let (base, heads) = serve(|_, url| {
        format!(
            "HTTP/1.1 302 Found\r\nLocation: {}/next\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            url
        )
    })
    .await;

    let url = Url::parse(&format!("{}/start", base)).unwrap();
    let resp = HyperTransport::default().send(HttpRequest::get(url)).await.unwrap();
    assert!(resp.is_redirect());
    assert_eq!(resp.location(), Some(format!("{}/next", base).as_str()));
    assert_eq!(heads.lock().len(), 1);
}

#[tokio::test]
async fn test_request_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let transport = HyperTransport::new(TransportConfig {
        request_timeout: Duration::from_millis(200),
        ..Default::default()
    });
    let url = Url::parse(&format!("http://{}/slow", addr)).unwrap();
    let err = transport.send(HttpRequest::get(url)).await.unwrap_err();
    assert_eq!(err, NetError::TimedOut);
}

#[tokio::test]
async fn test_service_follows_redirect_with_cookies() {
    let (base, heads) = serve(|head, url| {
        if head.starts_with("GET /login") {
            format!(
                "HTTP/1.1 302 Found\r\nLocation: {}/home\r\nSet-Cookie: sid=xyz; Path=/\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                url
            )
        } else {
            ok(r#"{"user":"ana"}"#, "Content-Type: application/json\r\n")
        }
    })
    .await;

    let ctx = NetworkContext::new(
        NetworkConfig {
            http_log_level: HttpLogLevel::Basic,
            ..Default::default()
        },
        Arc::new(InMemoryStore::new()),
    );
    ctx.set_session_id(Some("sess-1".into()));
    let api = ctx.generate_service(ServiceDescriptor::parse(&format!("{}/", base)).unwrap());

    let result: cloudnet::ApiResult<serde_json::Value> = api.get("login").call().await;
    assert_eq!(result.data().unwrap()["user"], "ana");

    let heads = heads.lock();
    assert_eq!(heads.len(), 2);
    let second = heads[1].to_ascii_lowercase();
    assert!(second.starts_with("get /home"));
    assert!(second.contains("cookie: sid=xyz;"));
    assert!(second.contains("__session: sess-1"));
}

#[tokio::test]
async fn test_refused_connection_becomes_api_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let ctx = NetworkContext::new(NetworkConfig::default(), Arc::new(InMemoryStore::new()));
    let api = ctx.generate_service(ServiceDescriptor::parse(&format!("http://{}/", addr)).unwrap());

    let result: cloudnet::ApiResult<serde_json::Value> = api.get("x").call().await;
    let err = result.error().unwrap();
    assert_eq!(err.code, -1);
    assert_eq!(err.cause, Some(NetError::ConnectionRefused));
    assert!(!err.is_loggable());
}
