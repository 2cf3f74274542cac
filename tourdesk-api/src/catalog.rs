use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tourdesk_catalog::{Layout, Route, SeatLayoutGenerator, VehicleType};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/catalog/vehicles", get(list_vehicles))
        .route("/v1/catalog/routes", get(list_routes))
        .route("/v1/layouts/{capacity}", get(layout_for_capacity))
}

async fn list_vehicles(State(state): State<AppState>) -> Json<Vec<VehicleType>> {
    let vehicles = state.lifecycle.registry().vehicles().list();
    Json(vehicles.into_iter().cloned().collect())
}

async fn list_routes(State(state): State<AppState>) -> Json<Vec<Route>> {
    let routes = state.lifecycle.registry().routes().list();
    Json(routes.into_iter().cloned().collect())
}

/// Layout preview for a capacity that has no tour yet.
async fn layout_for_capacity(Path(capacity): Path<u32>) -> Result<Json<Layout>, AppError> {
    Ok(Json(SeatLayoutGenerator::new().layout(capacity)?))
}
