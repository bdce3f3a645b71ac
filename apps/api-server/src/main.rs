//! api-server — HTTP API for the URL Shortener workspace.
//!
//! Provides the redirect endpoint, link creation, and per-owner click
//! analytics over the domain `LinkService`:
//! - Storage: SQLite (default, `sqlite` feature) or in-memory.
//! - Identity: the `X-User` request header names the owner. Authentication
//!   happens upstream (reverse proxy); this server trusts the header.
//! - CORS: Configurable via CORS_ALLOW_ORIGIN (origin string).
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # throwaway storage
//! STORAGE_PROVIDER=memory cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use domain::adapters::memory_repo::InMemoryRepo;
use domain::codegen::RandomCodeGenerator;
use domain::service::{LinkService, ServiceConfig};
use domain::{
    CoreError, LinkRepository, NewLink, OwnerId, RepoError, ShortCode, ShortLink, SystemClock,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Header carrying the caller's identity.
const USER_HEADER: &str = "x-user";

// Local repo abstraction supporting memory or sqlite (feature-gated).
enum AnyRepo {
    Memory(InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteRepo),
}

impl LinkRepository for AnyRepo {
    fn find_by_code(&self, code: &ShortCode) -> Result<Option<ShortLink>, RepoError> {
        match self {
            AnyRepo::Memory(r) => r.find_by_code(code),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.find_by_code(code),
        }
    }

    fn insert(&self, link: ShortLink) -> Result<(), RepoError> {
        match self {
            AnyRepo::Memory(r) => r.insert(link),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.insert(link),
        }
    }

    fn increment_clicks(&self, code: &ShortCode) -> Result<(), RepoError> {
        match self {
            AnyRepo::Memory(r) => r.increment_clicks(code),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.increment_clicks(code),
        }
    }

    fn list(&self, limit: usize) -> Result<Vec<ShortLink>, RepoError> {
        match self {
            AnyRepo::Memory(r) => r.list(limit),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.list(limit),
        }
    }

    fn list_by_owner(&self, owner: &OwnerId, limit: usize) -> Result<Vec<ShortLink>, RepoError> {
        match self {
            AnyRepo::Memory(r) => r.list_by_owner(owner, limit),
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.list_by_owner(owner, limit),
        }
    }
}

type Service = LinkService<AnyRepo, RandomCodeGenerator, SystemClock>;

#[derive(Clone)]
struct AppState {
    svc: Arc<Service>,
    shortlink_domain: Option<String>,
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_ephemeral();

    let repo = match build_repo(&cfg) {
        Ok(r) => r,
        Err(e) => {
            error!(err = %e, "failed to open storage");
            std::process::exit(1);
        }
    };
    let codes = RandomCodeGenerator::new(cfg.code_length);
    info!(
        code_length = codes.length(),
        max_attempts = cfg.max_code_attempts,
        "code generator ready"
    );
    let svc = LinkService::with_config(
        repo,
        codes,
        SystemClock,
        ServiceConfig {
            max_attempts: cfg.max_code_attempts,
        },
    );
    let state = AppState {
        svc: Arc::new(svc),
        shortlink_domain: cfg.shortlink_domain.clone(),
    };

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = router(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderName::from_static(USER_HEADER),
            ])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "bind failed");
            std::process::exit(1);
        }
    };
    info!(%addr, "api-server listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/links", get(list_links).post(create_link))
        .route("/api/links/:code", get(get_link))
        .route("/:code", get(redirect_code))
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct a repository instance based on config and feature flags.
fn build_repo(cfg: &config::Config) -> Result<AnyRepo, RepoError> {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            info!(path = %cfg.db_path.display(), "using sqlite storage");
            sqlite_adapter::SqliteRepo::with_busy_timeout(&cfg.db_path, cfg.sqlite_busy_timeout)
                .map(AnyRepo::Sqlite)
        }
        #[cfg(not(feature = "sqlite"))]
        config::StorageProvider::Sqlite => {
            warn!("built without the `sqlite` feature; falling back to memory storage");
            Ok(AnyRepo::Memory(InMemoryRepo::new()))
        }
        config::StorageProvider::Memory => Ok(AnyRepo::Memory(InMemoryRepo::new())),
    }
}

#[derive(Deserialize)]
struct CreateLinkReq {
    target_url: String,
    #[serde(default)]
    custom_code: Option<String>,
}

#[derive(Serialize)]
struct LinkOut {
    code: String,
    short_url: String,
    target_url: String,
    clicks: u64,
    created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
}

#[derive(Serialize)]
struct ListOut {
    links: Vec<LinkOut>,
    total_clicks: u64,
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

fn link_to_out(link: ShortLink, headers: &HeaderMap, shortlink_domain: &Option<String>) -> LinkOut {
    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    LinkOut {
        short_url: http_common::build_short_url(
            shortlink_domain.as_deref(),
            host,
            link.code.as_str(),
        ),
        code: link.code.as_str().to_string(),
        target_url: link.target_url,
        clicks: link.clicks,
        created_at: http_common::system_time_to_rfc3339(link.created_at),
        owner: link.owner.map(|o| o.as_str().to_string()),
    }
}

/// Owner named by the `X-User` header; blank or missing means anonymous.
fn request_owner(headers: &HeaderMap) -> Option<OwnerId> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| OwnerId::new(s).ok())
}

fn error_response(err: CoreError) -> Response {
    let (status, body) = match &err {
        CoreError::InvalidUrl(reason) => {
            warn!(%reason, "rejected target url");
            (
                StatusCode::BAD_REQUEST,
                http_common::json_error_with_message("invalid_url", &err.to_string()),
            )
        }
        CoreError::DuplicateCode(code) => {
            info!(%code, "custom code taken");
            (
                StatusCode::CONFLICT,
                http_common::json_error_with_message("duplicate_code", &err.to_string()),
            )
        }
        CoreError::Exhausted { attempts } => {
            error!(attempts, "short code space exhausted");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                http_common::json_err("exhausted"),
            )
        }
        CoreError::NotFound => (StatusCode::NOT_FOUND, http_common::json_err("not_found")),
        CoreError::InvalidOwner => (
            StatusCode::UNAUTHORIZED,
            http_common::json_err("unauthorized"),
        ),
        CoreError::Persistence(msg) => {
            error!(err = %msg, "storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, http_common::json_err("internal"))
        }
    };
    (status, Json(body)).into_response()
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn redirect_code(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    let code = ShortCode::new(code);
    match state.svc.resolve(&code) {
        Ok(target) => {
            info!(code = %code, redirect_to = %target, "resolve ok");
            // temporary, so browsers come back and every visit is counted
            Redirect::temporary(&target).into_response()
        }
        Err(CoreError::NotFound) => {
            info!(code = %code, "resolve 404");
            error_response(CoreError::NotFound)
        }
        Err(e) => error_response(e),
    }
}

async fn create_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateLinkReq>,
) -> Response {
    let mut input = NewLink::new(body.target_url);
    input.custom_code = body.custom_code;
    input.owner = request_owner(&headers);

    match state.svc.create(input) {
        Ok(link) => {
            info!(code = %link.code, "create ok");
            (
                StatusCode::CREATED,
                Json(link_to_out(link, &headers, &state.shortlink_domain)),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn list_links(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ListQuery>,
) -> Response {
    let Some(owner) = request_owner(&headers) else {
        return error_response(CoreError::InvalidOwner);
    };
    let Some(limit) = http_common::checked_limit(q.limit) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(http_common::json_error_with_message(
                "bad_request",
                &format!("limit must be between 1 and {}", http_common::MAX_LIMIT),
            )),
        )
            .into_response();
    };

    match state.svc.list_by_owner(&owner, limit) {
        Ok(links) => {
            let total_clicks = links.iter().map(|l| l.clicks).sum();
            let links = links
                .into_iter()
                .map(|l| link_to_out(l, &headers, &state.shortlink_domain))
                .collect();
            (StatusCode::OK, Json(ListOut { links, total_clicks })).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn get_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Response {
    let owner = request_owner(&headers);
    match state.svc.get(&ShortCode::new(code)) {
        // someone else's link is reported as missing
        Ok(Some(link)) if link.is_visible_to(owner.as_ref()) => (
            StatusCode::OK,
            Json(link_to_out(link, &headers, &state.shortlink_domain)),
        )
            .into_response(),
        Ok(_) => error_response(CoreError::NotFound),
        Err(e) => error_response(e),
    }
}
