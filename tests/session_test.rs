//! Session header and expiration behaviour through generated services.

use cloudnet::base::neterror::NetError;
use cloudnet::config::NetworkConfig;
use cloudnet::context::NetworkContext;
use cloudnet::http::{HttpRequest, HttpResponse, Transport};
use cloudnet::service::ServiceDescriptor;
use cloudnet::storage::InMemoryStore;
use futures::future::BoxFuture;
use http::StatusCode;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Responder = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Answers every request with `respond` and keeps a copy of what was sent.
struct Backend {
    respond: Responder,
    seen: Mutex<Vec<HttpRequest>>,
}

impl Backend {
    fn new(respond: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        })
    }
}

impl Transport for Backend {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, NetError>> {
        let response = (self.respond)(&request);
        self.seen.lock().push(request);
        Box::pin(async move { Ok(response) })
    }
}

fn context(backend: Arc<Backend>) -> (NetworkContext, Arc<AtomicUsize>) {
    let ctx = NetworkContext::new(NetworkConfig::default(), Arc::new(InMemoryStore::new()))
        .with_transport(backend);
    let expirations = Arc::new(AtomicUsize::new(0));
    let counter = expirations.clone();
    ctx.subscribe_session_expiration(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    (ctx, expirations)
}

fn service(ctx: &NetworkContext) -> cloudnet::ServiceClient {
    ctx.generate_service(
        ServiceDescriptor::parse("https://api.example.com/v1/")
            .unwrap()
            .session_expiration(true),
    )
}

#[tokio::test]
async fn test_atlas_unauthorized_fires_once() {
    let backend = Backend::new(|req| {
        HttpResponse::new(StatusCode::UNAUTHORIZED, req.url.clone())
            .with_header("identifier", "Atlas")
            .with_body(r#"{"message":"unauthorized"}"#)
    });
    let (ctx, expirations) = context(backend);

    let resp = service(&ctx).get("orders").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(expirations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ok_response_does_not_fire() {
    let backend = Backend::new(|req| {
        HttpResponse::new(StatusCode::OK, req.url.clone())
            .with_header("identifier", "atlas")
            .with_body(r#"{"items":[]}"#)
    });
    let (ctx, expirations) = context(backend);

    service(&ctx).get("orders").send().await.unwrap();
    assert_eq!(expirations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_legacy_logged_out_body_fires() {
    let backend = Backend::new(|req| {
        HttpResponse::new(StatusCode::OK, req.url.clone()).with_body(r#"  {"ISLOGGED":"0"}  "#)
    });
    let (ctx, expirations) = context(backend);

    service(&ctx).get("legacy/profile").send().await.unwrap();
    assert_eq!(expirations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_session_endpoints_are_ignored() {
    let backend = Backend::new(|req| {
        HttpResponse::new(StatusCode::UNAUTHORIZED, req.url.clone())
            .with_header("identifier", "atlas")
            .with_body("{}")
    });
    let (ctx, expirations) = context(backend);

    service(&ctx).post("sessions").body("{}").send().await.unwrap();
    service(&ctx).get("notification-feed-counter").send().await.unwrap();
    assert_eq!(expirations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_header_and_cookies_flow() {
    let backend = Backend::new(|req| {
        let resp = HttpResponse::new(StatusCode::OK, req.url.clone());
        if req.url.path() == "/sessions" {
            resp.with_header("set-cookie", "sid=s-123; Path=/")
        } else {
            resp
        }
    });
    let (ctx, _) = context(backend.clone());
    let api = ctx.generate_service(ServiceDescriptor::parse("https://api.example.com/").unwrap());

    ctx.set_session_id(Some("s-123".into()));
    api.post("/sessions").body("{}").send().await.unwrap();
    api.get("/v1/me").send().await.unwrap();

    let seen = backend.seen.lock();
    assert!(seen[0].header("__session").is_none());
    assert!(seen[0].header("cookie").is_none());
    assert_eq!(seen[1].header("__session"), Some("s-123"));
    assert_eq!(seen[1].header("cookie"), Some("sid=s-123;"));
    assert!(seen[1].header("x-vc-country").is_some());
    drop(seen);

    ctx.clear_session();
    api.get("/v1/me").send().await.unwrap();
    let seen = backend.seen.lock();
    assert!(seen[2].header("__session").is_none());
    assert!(seen[2].header("cookie").is_none());
}

#[tokio::test]
async fn test_unsubscribed_listener_is_silent() {
    let backend = Backend::new(|req| {
        HttpResponse::new(StatusCode::OK, req.url.clone()).with_body(r#"{"isLogged":"0"}"#)
    });
    let ctx = NetworkContext::new(NetworkConfig::default(), Arc::new(InMemoryStore::new()))
        .with_transport(backend);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let id = ctx.subscribe_session_expiration(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(ctx.unsubscribe_session_expiration(id));

    service(&ctx).get("orders").send().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
