use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use shared::{
    catalog::{self, OperationSpec, ResponseKind},
    domain::{ProductTag, HEADER_AUTH_TOKEN, HEADER_COMPANY_ID},
    error::{ApiError, ErrorCode},
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};

mod config;
mod upstream;

use config::load_settings;
use upstream::{UpstreamClient, UpstreamReply};

#[derive(Clone)]
struct AppState {
    upstream: UpstreamClient,
}

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let upstream = UpstreamClient::new(&settings)?;
    let state = AppState { upstream };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/proxy/:product/:operation", any(forward))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Resolve the operation, validate mandatory headers locally, forward once,
/// relay what came back.
async fn forward(
    State(state): State<Arc<AppState>>,
    Path((product, operation)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    let product = ProductTag::parse(&product).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorCode::NotFound,
                format!("unknown product '{product}'"),
            )),
        )
    })?;
    let op = catalog::lookup(product, &operation).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorCode::NotFound,
                format!("unknown operation '{product}/{operation}'"),
            )),
        )
    })?;

    if method.as_str() != op.method.as_str() {
        return Err((
            StatusCode::METHOD_NOT_ALLOWED,
            Json(ApiError::new(
                ErrorCode::MethodNotAllowed,
                format!("operation '{}/{}' expects {}", product, op.id, op.method.as_str()),
            )),
        ));
    }

    // Reject locally before burning an upstream round trip on a call that
    // cannot succeed.
    if op.requires_auth {
        require_header(&headers, HEADER_AUTH_TOKEN)?;
        require_header(&headers, HEADER_COMPANY_ID)?;
    }

    match state
        .upstream
        .forward(op, &headers, query.as_deref(), &body)
        .await
    {
        Ok(UpstreamReply::Json { status, body }) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            let body = body.unwrap_or_else(|| json!({ "error": "Proxy error" }));
            Ok((status, Json(body)).into_response())
        }
        Ok(UpstreamReply::Binary {
            status,
            content_type,
            bytes,
        }) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut response_headers = HeaderMap::new();
            response_headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_str(&content_type)
                    .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
            );
            let filename = document_filename(product, op, query.as_deref());
            if let Ok(value) =
                HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
            {
                response_headers.insert(header::CONTENT_DISPOSITION, value);
            }
            Ok((status, response_headers, bytes).into_response())
        }
        Err(error) => {
            warn!(operation = op.id, %product, %error, "upstream unreachable");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Proxy error" })),
            )
                .into_response())
        }
    }
}

fn require_header(
    headers: &HeaderMap,
    name: &'static str,
) -> Result<(), (StatusCode, Json<ApiError>)> {
    let present = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.trim().is_empty());
    if present {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                format!("missing required header '{name}'"),
            )),
        ))
    }
}

/// Deterministic download name for binary operations, derived from the `id`
/// query parameter when present.
fn document_filename(product: ProductTag, op: &OperationSpec, query: Option<&str>) -> String {
    debug_assert_eq!(op.response_kind, ResponseKind::Binary);
    let id = query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(name, _)| name == "id")
            .map(|(_, value)| value.into_owned())
    });
    match id {
        Some(id) if !id.trim().is_empty() => format!("{}-{}-{}.pdf", product, op.id, id.trim()),
        _ => format!("{}-{}.pdf", product, op.id),
    }
}
