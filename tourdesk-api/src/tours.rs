use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tourdesk_catalog::Layout;
use tourdesk_core::RequestContext;
use tourdesk_order::{OccupancySnapshot, ScheduledTour, TourBooking};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/tours", get(list_tours))
        .route("/v1/tours/resolve", post(resolve_tour))
        .route("/v1/tours/{id}/vehicle", put(change_vehicle))
        .route("/v1/tours/{id}/occupancy", get(occupancy))
        .route("/v1/tours/{id}/layout", get(tour_layout))
        .route("/v1/tours/{id}/manifest", get(manifest))
        .route("/v1/tours/{id}/stream", get(occupancy_stream))
}

#[derive(Debug, Deserialize)]
pub struct ResolveTourRequest {
    pub route_id: String,
    pub tour_date: NaiveDate,
    #[serde(with = "tourdesk_shared::time::hhmm")]
    pub start_time: NaiveTime,
    pub vehicle_type_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListToursQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ChangeVehicleRequest {
    pub vehicle_type_id: String,
}

/// Seat map with live occupancy and a printable chart.
#[derive(Debug, Serialize)]
pub struct TourLayoutView {
    pub tour_id: Uuid,
    pub layout: Layout,
    pub occupied: BTreeSet<u32>,
    pub chart: String,
}

async fn resolve_tour(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(req): Json<ResolveTourRequest>,
) -> Result<Json<ScheduledTour>, AppError> {
    let tour = state
        .lifecycle
        .registry()
        .resolve(&ctx, &req.route_id, req.tour_date, req.start_time, &req.vehicle_type_id)
        .await?;
    Ok(Json(tour))
}

async fn list_tours(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<ListToursQuery>,
) -> Json<Vec<ScheduledTour>> {
    Json(state.lifecycle.registry().list_for_date(&ctx, query.date).await)
}

async fn change_vehicle(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeVehicleRequest>,
) -> Result<Json<ScheduledTour>, AppError> {
    let tour = state
        .lifecycle
        .allocator()
        .change_vehicle(&ctx, id, &req.vehicle_type_id)
        .await?;
    Ok(Json(tour))
}

async fn occupancy(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<OccupancySnapshot>, AppError> {
    state.lifecycle.registry().get(&ctx, id).await?;
    Ok(Json(state.lifecycle.allocator().snapshot(id).await?))
}

async fn tour_layout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TourLayoutView>, AppError> {
    state.lifecycle.registry().get(&ctx, id).await?;

    let allocator = state.lifecycle.allocator();
    let layout = allocator.layout(id).await?;
    let occupied = allocator.occupied_seats(id).await?;
    let chart = layout.render_chart(&occupied);

    Ok(Json(TourLayoutView {
        tour_id: id,
        layout,
        occupied,
        chart,
    }))
}

async fn manifest(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TourBooking>>, AppError> {
    Ok(Json(state.lifecycle.list_for_tour(&ctx, id).await?))
}

/// Live seat map: one `occupancy_changed` event per committed change.
async fn occupancy_stream(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(tour_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    state.lifecycle.registry().get(&ctx, tour_id).await?;
    let rx = state.lifecycle.allocator().subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(change) if change.tour_id == tour_id => Event::default()
                .event("occupancy_changed")
                .json_data(&change)
                .ok()
                .map(Ok),
            Ok(_) => None,
            Err(e) => {
                // Lagged receivers skip ahead; the next event carries full occupancy.
                tracing::warn!(%tour_id, "Occupancy stream lagged: {}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
