use super::*;
use crate::replicate::{ReplicateConfig, ReplicateNamer};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fusion_engine::{NameFuture, NamingError, Tile};
use fusion_protocol::DragSource;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

enum Stub {
    Reply(&'static str),
    Fail(fn() -> NamingError),
}

impl Namer for Stub {
    fn name<'a>(&'a self, _first: &'a str, _second: &'a str) -> NameFuture<'a> {
        Box::pin(async move {
            match self {
                Stub::Reply(text) => Ok(text.to_string()),
                Stub::Fail(err) => Err(err()),
            }
        })
    }
}

fn state_with(stub: Stub) -> Arc<AppState> {
    Arc::new(AppState::new(Arc::new(stub)))
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn drop_label(state: &Arc<AppState>, label: &str, x: f64, y: f64) -> DropReport {
    drag_begin(
        State(state.clone()),
        Json(BeginDrag {
            source: DragSource::Sidebar(label.to_string()),
            x,
            y,
        }),
    )
    .await
    .unwrap();
    drag_end(
        State(state.clone()),
        Json(EndDrag {
            x,
            y,
            dropped_on_sidebar: false,
        }),
    )
    .await
    .0
}

async fn settled(state: &Arc<AppState>) -> Snapshot {
    for _ in 0..200 {
        let snap = canvas_snapshot(State(state.clone())).await.0;
        if snap.pending == 0 {
            return snap;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("combination never resolved");
}

#[tokio::test]
async fn health_and_page_are_served() {
    let app = build_router(AppState::new(Arc::new(Stub::Reply("{}"))));
    let resp = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains(routes::DRAG_BEGIN));
    assert!(html.contains(routes::DRAG_END));
}

#[tokio::test]
async fn proxy_rejects_missing_fields() {
    let app = build_router(AppState::new(Arc::new(Stub::Reply("{}"))));
    let (status, body) = post_json(app, routes::COMBINE, json!({ "item1": "🎨 Art" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Missing required fields" }));
}

#[tokio::test]
async fn proxy_returns_raw_response() {
    let app = build_router(AppState::new(Arc::new(Stub::Reply(r#"{"name":"MedArt"}"#))));
    let (status, body) = post_json(
        app,
        routes::COMBINE,
        json!({ "item1": "🏥 Health", "item2": "🎨 Art" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "response": r#"{"name":"MedArt"}"# }));
}

#[tokio::test]
async fn proxy_maps_naming_failures_to_500() {
    let cases: [(fn() -> NamingError, &str); 3] = [
        (
            || NamingError::Config("Missing REPLICATE_API_TOKEN".to_string()),
            "API configuration error - Missing REPLICATE_API_TOKEN",
        ),
        (
            || NamingError::Transport("connection reset".to_string()),
            "Error streaming response",
        ),
        (|| NamingError::Empty, "No response from AI"),
    ];
    for (fail, expected) in cases {
        let app = build_router(AppState::new(Arc::new(Stub::Fail(fail))));
        let (status, body) = post_json(
            app,
            routes::COMBINE,
            json!({ "item1": "🏥 Health", "item2": "🎨 Art" }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], expected);
    }

    let app = build_router(AppState::new(Arc::new(Stub::Reply(""))));
    let (status, body) = post_json(
        app,
        routes::COMBINE,
        json!({ "item1": "🏥 Health", "item2": "🎨 Art" }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "No response from AI");
}

#[test]
fn config_error_carries_details() {
    let err = ApiError::from(NamingError::Config("Missing REPLICATE_API_TOKEN".to_string()));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(err.body().details.as_deref().unwrap().contains("REPLICATE_API_TOKEN"));
}

#[tokio::test]
async fn sidebar_drop_places_tile() {
    let state = state_with(Stub::Reply("{}"));
    let report = drop_label(&state, "💻 Technology", 120.0, 80.0).await;

    assert!(matches!(report.outcome, DropOutcome::Placed { .. }));
    assert!(!report.snapshot.dragging);
    assert_eq!(report.snapshot.tiles.len(), 1);
    assert_eq!(report.snapshot.tiles[0].text, "💻 Technology");
    assert_eq!(report.snapshot.tiles[0].position, Point::new(120.0, 80.0));
}

#[tokio::test]
async fn overlapping_drop_combines_in_background() {
    let state = state_with(Stub::Reply(r#"{"name":"MedArt"}"#));
    drop_label(&state, "🏥 Health", 0.0, 0.0).await;
    let report = drop_label(&state, "🎨 Art", 30.0, 20.0).await;

    assert!(matches!(report.outcome, DropOutcome::Combine(_)));
    assert!(report.snapshot.tiles.is_empty());
    assert_eq!(report.snapshot.pending, 1);

    let snap = settled(&state).await;
    assert_eq!(snap.tiles.len(), 1);
    assert_eq!(snap.tiles[0].text, "MedArt");
    assert_eq!(snap.tiles[0].position, Point::new(0.0, 0.0));
    assert_eq!(snap.catalog.len(), 1);
    assert_eq!(snap.catalog[0].text, "MedArt");
}

#[tokio::test]
async fn unreachable_namer_still_produces_tile() {
    let state = state_with(Stub::Fail(|| {
        NamingError::Transport("connection refused".to_string())
    }));
    drop_label(&state, "🏥 Health", 0.0, 0.0).await;
    drop_label(&state, "🎨 Art", 10.0, 10.0).await;

    let snap = settled(&state).await;
    assert_eq!(snap.tiles.len(), 1);
    assert_eq!(snap.tiles[0].text, "🏥 Health + 🎨 Art");
}

#[tokio::test]
async fn canvas_tile_drag_round_trip() {
    let state = state_with(Stub::Reply("{}"));
    let report = drop_label(&state, "📚 Education", 50.0, 50.0).await;
    let id = report.snapshot.tiles[0].id.clone();

    drag_begin(
        State(state.clone()),
        Json(BeginDrag {
            source: DragSource::Tile(id.to_string()),
            x: 60.0,
            y: 70.0,
        }),
    )
    .await
    .unwrap();
    let snap = drag_move(State(state.clone()), Json(MoveDrag { x: 260.0, y: 170.0 }))
        .await
        .0;
    assert!(snap.dragging);
    assert_eq!(snap.tiles[0].position, Point::new(250.0, 150.0));

    let report = drag_end(
        State(state.clone()),
        Json(EndDrag {
            x: 900.0,
            y: 900.0,
            dropped_on_sidebar: true,
        }),
    )
    .await
    .0;
    assert!(matches!(report.outcome, DropOutcome::Discarded));
    assert_eq!(report.snapshot.tiles.len(), 1);
    assert_eq!(report.snapshot.tiles[0].position, Point::new(250.0, 150.0));
}

#[tokio::test]
async fn unknown_tile_drag_is_404() {
    let app = build_router(AppState::new(Arc::new(Stub::Reply("{}"))));
    let (status, body) = post_json(
        app,
        routes::DRAG_BEGIN,
        json!({ "source": { "tile": "tile-0-0" }, "x": 0, "y": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Unknown tile");
}

#[tokio::test]
async fn detail_view_opens_and_closes() {
    let state = state_with(Stub::Reply(r#"{"name":"MediaArt"}"#));
    drop_label(&state, "💻 Technology", 0.0, 0.0).await;
    drop_label(&state, "🎨 Art", 5.0, 5.0).await;
    settled(&state).await;

    let snap = detail_open(
        State(state.clone()),
        Json(OpenDetail {
            text: "MediaArt".to_string(),
        }),
    )
    .await
    .0;
    let detail = snap.detail.expect("detail view");
    assert_eq!(detail.text, "MediaArt");
    assert_eq!(detail.description, r#"{"name":"MediaArt"}"#);

    let snap = detail_close(State(state.clone())).await.0;
    assert!(snap.detail.is_none());
}

#[tokio::test]
async fn api_responses_are_not_cached() {
    let app = build_router(AppState::new(Arc::new(Stub::Reply("{}"))));
    let resp = app
        .oneshot(Request::get(routes::CANVAS).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-store");
}

#[test]
fn cors_accepts_only_local_origins() {
    let ok = |s: &'static str| is_allowed_local_origin(&HeaderValue::from_static(s));
    assert!(ok("http://localhost"));
    assert!(ok("http://localhost:3000"));
    assert!(ok("https://127.0.0.1:39334"));
    assert!(ok("http://[::1]:8080"));
    assert!(!ok("http://localhost.evil.com"));
    assert!(!ok("https://example.com"));
    assert!(!ok("null"));
}

// Replicate client, exercised against an in-process stub of the predictions API.

#[derive(Default)]
struct Upstream {
    base: Mutex<String>,
    requests: Mutex<Vec<(Option<String>, Value)>>,
    reply: Mutex<Value>,
}

async fn spawn_upstream(reply: Value) -> Arc<Upstream> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = Arc::new(Upstream::default());
    *upstream.base.lock() = format!("http://{}", listener.local_addr().unwrap());
    *upstream.reply.lock() = reply;

    let app = Router::new()
        .route(
            "/v1/models/{owner}/{name}/predictions",
            post(
                |State(up): State<Arc<Upstream>>,
                 headers: axum::http::HeaderMap,
                 Json(body): Json<Value>| async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    up.requests.lock().push((auth, body));
                    let reply = up.reply.lock().clone();
                    Json(reply)
                },
            ),
        )
        .route(
            "/v1/predictions/{id}",
            get(|| async {
                Json(json!({
                    "id": "p1",
                    "status": "succeeded",
                    "output": ["{\"name\":", "\"Bioacoustics\"}"],
                }))
            }),
        )
        .with_state(upstream.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    upstream
}

fn namer_for(upstream: &Upstream, token: Option<&str>) -> ReplicateNamer {
    ReplicateNamer::new(ReplicateConfig {
        token: token.map(str::to_string),
        base_url: upstream.base.lock().clone(),
        poll_interval: Duration::from_millis(5),
        poll_attempts: 3,
        ..ReplicateConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn replicate_joins_streamed_output() {
    let upstream = spawn_upstream(json!({
        "id": "p0",
        "status": "succeeded",
        "output": ["{\"name\"", ": \"Med", "Art\"}"],
    }))
    .await;
    let namer = namer_for(&upstream, Some("r8_test"));

    let text = namer.name("🏥 Health", "🎨 Art").await.unwrap();
    assert_eq!(text, r#"{"name": "MedArt"}"#);

    let requests = upstream.requests.lock();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer r8_test"));
    let prompt = body["input"]["prompt"].as_str().unwrap();
    assert!(prompt.contains("\"Health\" and \"Art\""));
    assert!(!prompt.contains('🎨'));
    assert_eq!(body["input"]["max_new_tokens"], 512);
}

#[tokio::test]
async fn replicate_polls_unfinished_predictions() {
    let upstream = spawn_upstream(Value::Null).await;
    let base = upstream.base.lock().clone();
    *upstream.reply.lock() = json!({
        "id": "p1",
        "status": "processing",
        "urls": { "get": format!("{base}/v1/predictions/p1") },
    });
    let namer = namer_for(&upstream, Some("r8_test"));

    let text = namer.name("🌿 Nature", "🎵 Music").await.unwrap();
    assert_eq!(text, r#"{"name":"Bioacoustics"}"#);
}

#[tokio::test]
async fn replicate_reports_failures() {
    let upstream = spawn_upstream(json!({ "status": "failed", "error": "model crashed" })).await;
    let namer = namer_for(&upstream, Some("r8_test"));
    let err = namer.name("a", "b").await.unwrap_err();
    assert!(matches!(err, NamingError::Upstream { ref message, .. } if message == "model crashed"));

    let upstream = spawn_upstream(json!({ "status": "succeeded", "output": [] })).await;
    let namer = namer_for(&upstream, Some("r8_test"));
    assert!(matches!(namer.name("a", "b").await, Err(NamingError::Empty)));
}

#[tokio::test]
async fn replicate_without_token_is_a_config_error() {
    let upstream = spawn_upstream(json!({})).await;
    let namer = namer_for(&upstream, None);
    assert!(matches!(namer.name("a", "b").await, Err(NamingError::Config(_))));
    assert!(upstream.requests.lock().is_empty());
}

#[tokio::test]
async fn replicate_transport_failure_falls_back_in_resolver() {
    let namer = ReplicateNamer::new(ReplicateConfig {
        token: Some("r8_test".to_string()),
        base_url: "http://127.0.0.1:1".to_string(),
        ..ReplicateConfig::default()
    })
    .unwrap();
    let a = Tile::new("🏥 Health", Point::new(0.0, 0.0));
    let b = Tile::new("🎨 Art", Point::new(10.0, 10.0));

    assert!(matches!(namer.name("a", "b").await, Err(NamingError::Transport(_))));
    let resolution = combine(&namer, &a, &b).await;
    assert_eq!(resolution.tile.text, "🏥 Health + 🎨 Art");
}
