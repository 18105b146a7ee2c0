use std::sync::Arc;

use axum::{
    extract::{Path, Query as UrlQuery, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use antipoff_shared::dto::{HistoryResponse, HistoryVerdict, PingResponse, QueryCreate, QueryResponse};
use antipoff_shared::TokenError;
use antipoff_store::{HistoryWithQuery, Query};

use crate::config::ServerConfig;
use crate::db::DbPool;
use crate::error::ServerError;
use crate::identity::IdentityService;
use crate::oracle::{self, HistoryOracle};
use crate::pipeline::QueryService;
use crate::session::SessionKeys;
use crate::{admin, auth};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub queries: QueryService,
    pub identity: IdentityService,
    pub session: Arc<SessionKeys>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        db: DbPool,
        oracle: Arc<dyn HistoryOracle>,
    ) -> Result<Self, TokenError> {
        Ok(Self {
            queries: QueryService::new(db.clone(), oracle),
            identity: IdentityService::new(db.clone()),
            session: Arc::new(SessionKeys::from_config(&config)?),
            config: Arc::new(config),
            db,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .route("/query", post(submit_query))
        .route("/history/all", get(all_queries))
        .route("/history/detail", get(history_detail))
        .route("/history/result/{query_id}", get(history_result))
        .merge(auth::router())
        .nest("/admin", admin::router());

    if state.config.stub_oracle {
        let max_delay = state.config.stub_oracle_max_delay;
        info!(?max_delay, "Serving stub history oracle at /history");
        router = router.route("/history", get(move || oracle::stub_history(max_delay)));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct HistoryDetailParams {
    cadastral_number: String,
}

async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "Server is running".into(),
    })
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn submit_query(
    State(state): State<AppState>,
    Json(request): Json<QueryCreate>,
) -> Result<Json<HistoryVerdict>, ServerError> {
    let verdict = state.queries.submit_query(&request).await?;
    Ok(Json(verdict))
}

async fn all_queries(State(state): State<AppState>) -> Result<Json<Vec<QueryResponse>>, ServerError> {
    let queries = state.queries.list_all_queries().await?;
    Ok(Json(queries.iter().map(query_response).collect()))
}

async fn history_detail(
    State(state): State<AppState>,
    UrlQuery(params): UrlQuery<HistoryDetailParams>,
) -> Result<Json<Vec<HistoryResponse>>, ServerError> {
    let histories = state
        .queries
        .find_history_by_cadastral_number(&params.cadastral_number)
        .await?;
    Ok(Json(histories.iter().map(history_response).collect()))
}

async fn history_result(
    State(state): State<AppState>,
    Path(query_id): Path<i64>,
) -> Result<Json<HistoryResponse>, ServerError> {
    let result = state.queries.find_result_by_query_id(query_id).await?;
    Ok(Json(history_response(&result)))
}

fn query_response(query: &Query) -> QueryResponse {
    QueryResponse {
        id: query.id,
        cadastral_number: query.cadastral_number.clone(),
        latitude: query.latitude,
        longitude: query.longitude,
        create_ts: query.create_ts,
    }
}

fn history_response(row: &HistoryWithQuery) -> HistoryResponse {
    HistoryResponse {
        id: row.history.id,
        query_id: row.history.query_id,
        history: row.history.history,
        create_ts: row.history.create_ts,
        query: query_response(&row.query),
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
