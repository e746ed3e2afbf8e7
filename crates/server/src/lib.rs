use anyhow::Context;
use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use fusion_engine::{combine, Canvas, DropOutcome, Namer, PendingCombination, Point, Snapshot};
use fusion_protocol::{
    routes, BeginDrag, CombineRequest, CombineResponse, EndDrag, MoveDrag, OpenDetail,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

mod error;
pub mod replicate;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub canvas: Arc<Mutex<Canvas>>,
    pub namer: Arc<dyn Namer>,
}

impl AppState {
    pub fn new(namer: Arc<dyn Namer>) -> Self {
        Self {
            canvas: Arc::new(Mutex::new(Canvas::new())),
            namer,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(routes::COMBINE, post(combine_proxy))
        .route(routes::CANVAS, get(canvas_snapshot))
        .route(routes::DRAG_BEGIN, post(drag_begin))
        .route(routes::DRAG_MOVE, post(drag_move))
        .route(routes::DRAG_END, post(drag_end))
        .route(routes::DETAIL_OPEN, post(detail_open))
        .route(routes::DETAIL_CLOSE, post(detail_close))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Router::new()
        .route("/", get(game_page))
        .route("/health", get(health))
        .merge(api)
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
        // The canvas API mutates shared state; only pages served from this
        // machine may call it cross-origin.
        .layer(local_only_cors())
}

async fn health() -> &'static str {
    "ok"
}

async fn game_page() -> Html<&'static str> {
    Html(GAME_HTML)
}

/// `POST /api/replicate`: asks the naming collaborator for a name and returns
/// its raw text, leaving parsing to the caller.
async fn combine_proxy(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CombineRequest>,
) -> Result<Json<CombineResponse>, ApiError> {
    let Some((item1, item2)) = input.items() else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    let response = state.namer.name(item1, item2).await.map_err(|err| {
        tracing::error!(error = %err, "naming request failed");
        ApiError::from(err)
    })?;
    if response.is_empty() {
        return Err(fusion_engine::NamingError::Empty.into());
    }
    Ok(Json(CombineResponse { response }))
}

async fn canvas_snapshot(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.canvas.lock().snapshot())
}

async fn drag_begin(
    State(state): State<Arc<AppState>>,
    Json(input): Json<BeginDrag>,
) -> Result<Json<Snapshot>, ApiError> {
    let mut canvas = state.canvas.lock();
    canvas.begin_drag(&input.source, Point::new(input.x, input.y))?;
    Ok(Json(canvas.snapshot()))
}

async fn drag_move(
    State(state): State<Arc<AppState>>,
    Json(input): Json<MoveDrag>,
) -> Json<Snapshot> {
    let mut canvas = state.canvas.lock();
    canvas.update_drag(Point::new(input.x, input.y));
    Json(canvas.snapshot())
}

#[derive(Debug, Serialize)]
pub struct DropReport {
    pub outcome: DropOutcome,
    pub snapshot: Snapshot,
}

async fn drag_end(
    State(state): State<Arc<AppState>>,
    Json(input): Json<EndDrag>,
) -> Json<DropReport> {
    let (outcome, snapshot) = {
        let mut canvas = state.canvas.lock();
        let outcome = canvas.end_drag(Point::new(input.x, input.y), input.dropped_on_sidebar);
        (outcome, canvas.snapshot())
    };
    if let DropOutcome::Combine(pending) = &outcome {
        spawn_combination(state.clone(), pending.clone());
    }
    Json(DropReport { outcome, snapshot })
}

/// Resolves a combination in the background and patches the canvas when the
/// name arrives. Pointer handling is never blocked on the collaborator.
fn spawn_combination(state: Arc<AppState>, pending: PendingCombination) {
    tokio::spawn(async move {
        let resolution = combine(state.namer.as_ref(), &pending.resting, &pending.dragged).await;
        let name = resolution.tile.text.clone();
        let inserted = state.canvas.lock().apply_combination(&pending, resolution);
        tracing::info!(combination = %pending.id, %name, inserted, "combination resolved");
    });
}

async fn detail_open(
    State(state): State<Arc<AppState>>,
    Json(input): Json<OpenDetail>,
) -> Json<Snapshot> {
    let mut canvas = state.canvas.lock();
    canvas.open_detail(&input.text);
    Json(canvas.snapshot())
}

async fn detail_close(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    let mut canvas = state.canvas.lock();
    canvas.close_detail();
    Json(canvas.snapshot())
}

pub async fn serve(addr: SocketAddr, namer: Arc<dyn Namer>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    serve_listener(listener, namer, shutdown_signal()).await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    namer: Arc<dyn Namer>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let app = build_router(AppState::new(namer));
    let addr = listener.local_addr()?;
    tracing::info!("serving on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(addr)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(err) => {
            tracing::error!(error = %err, "cannot listen for ctrl-c; running until killed");
            std::future::pending::<()>().await
        }
    }
}

fn local_only_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _req| {
            is_allowed_local_origin(origin)
        }))
}

fn is_allowed_local_origin(origin: &HeaderValue) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    ["localhost", "127.0.0.1", "[::1]"]
        .iter()
        .any(|host| is_http_origin_for_host(s, host))
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        origin
            .strip_prefix(scheme)
            .and_then(|rest| rest.strip_prefix(host))
            // Origin is just scheme://host[:port]
            .is_some_and(|after| after.is_empty() || after.starts_with(':'))
    })
}

const GAME_HTML: &str = include_str!("game.html");

#[cfg(test)]
mod tests;
