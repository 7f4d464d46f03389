//! HTTP transport
//!
//! - `POST /graphql` executes queries
//! - `GET /graphql?query=...` executes queries; a browser asking for
//!   `text/html` without a query gets GraphiQL when enabled
//! - `GET /healthz` liveness, `GET /readyz` store reachability

use std::sync::Arc;
use std::time::Duration;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::GraphQLConfig;
use crate::schema::AppSchema;
use crate::store::EntityStore;

/// Shared across requests; holds no mutable state
#[derive(Clone)]
pub struct AppState {
    pub schema: AppSchema,
    pub store: Arc<dyn EntityStore>,
    pub query_timeout: Duration,
    /// Serve GraphiQL to browsers on `GET /graphql`
    pub graphiql: bool,
}

impl AppState {
    pub fn new(schema: AppSchema, store: Arc<dyn EntityStore>, cfg: &GraphQLConfig) -> Self {
        Self {
            schema,
            store,
            query_timeout: Duration::from_secs(cfg.query_timeout_seconds),
            graphiql: cfg.graphiql,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/graphql", get(graphql_get).post(graphql_post))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn graphql_post(State(state): State<AppState>, req: GraphQLRequest) -> Response {
    execute(&state, req.into_inner()).await
}

async fn graphql_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    req: Request,
) -> Response {
    if state.graphiql && !has_query_param(&uri) && accepts_html(&headers) {
        return graphiql_page().into_response();
    }

    match <GraphQLRequest as FromRequest<AppState>>::from_request(req, &state).await {
        Ok(req) => execute(&state, req.into_inner()).await,
        Err(rejection) => rejection.into_response(),
    }
}

fn has_query_param(uri: &Uri) -> bool {
    uri.query()
        .is_some_and(|q| q.split('&').any(|pair| pair.starts_with("query=")))
}

fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

async fn execute(state: &AppState, request: async_graphql::Request) -> Response {
    match tokio::time::timeout(state.query_timeout, state.schema.execute(request)).await {
        Ok(resp) => GraphQLResponse::from(resp).into_response(),
        Err(_) => {
            warn!(timeout = ?state.query_timeout, "query execution timed out");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "data": null,
                    "errors": [{
                        "message": "query execution timed out",
                        "extensions": { "code": "TIMEOUT" }
                    }]
                })),
            )
                .into_response()
        }
    }
}

fn graphiql_page() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ready"})),
        ),
        Err(err) => {
            warn!(error = %err, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"status": "unavailable"})),
            )
        }
    }
}
