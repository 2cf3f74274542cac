use axum::{http::Method, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod catalog;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod state;
pub mod tours;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static(middleware::context::TENANT_HEADER),
            axum::http::HeaderName::from_static(middleware::context::AGENT_HEADER),
            axum::http::HeaderName::from_static(middleware::context::REQUEST_ID_HEADER),
        ]);

    let v1 = Router::new()
        .merge(bookings::routes())
        .merge(tours::routes())
        .merge(catalog::routes())
        .route_layer(axum::middleware::from_fn(middleware::request_context_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::metrics_handler))
        .merge(v1)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
