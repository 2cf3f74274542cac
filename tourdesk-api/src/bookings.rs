use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use tourdesk_core::RequestContext;
use tourdesk_order::{BookingDraft, TourBooking};
use tourdesk_shared::{Money, PaymentStatus};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/confirm", post(confirm_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/complete", post(complete_booking))
        .route("/v1/bookings/{id}/resize", post(resize_group))
        .route("/v1/bookings/{id}/seats", post(assign_seat))
        .route("/v1/bookings/{id}/seats/release-orphaned", post(release_orphaned_seats))
        .route("/v1/bookings/{id}/seats/{seat}", delete(release_seat))
        .route("/v1/bookings/{id}/payment", post(record_payment))
        .route("/v1/bookings/{id}/driver", post(attach_driver))
        .route("/v1/bookings/{id}/passengers/{index}", patch(update_passenger))
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub group_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct SeatAssignmentRequest {
    pub passenger_index: usize,
    pub seat_number: u32,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct DriverRequest {
    pub driver_id: String,
    #[serde(default)]
    pub driver_fee: Option<Money>,
}

/// Both fields optional; an empty phone clears the contact.
#[derive(Debug, Deserialize)]
pub struct PassengerUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(draft): Json<BookingDraft>,
) -> Result<impl IntoResponse, AppError> {
    let reserves_seats = !draft.seat_numbers.is_empty();
    let result = state.lifecycle.create(&ctx, draft).await;
    if reserves_seats {
        state.metrics.record_reservation(&result);
    }
    Ok((StatusCode::CREATED, Json(result?)))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TourBooking>, AppError> {
    Ok(Json(state.lifecycle.get(&ctx, id).await?))
}

async fn confirm_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TourBooking>, AppError> {
    Ok(Json(state.lifecycle.confirm(&ctx, id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TourBooking>, AppError> {
    Ok(Json(state.lifecycle.cancel(&ctx, id).await?))
}

async fn complete_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TourBooking>, AppError> {
    Ok(Json(state.lifecycle.complete(&ctx, id).await?))
}

async fn resize_group(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResizeRequest>,
) -> Result<Json<TourBooking>, AppError> {
    Ok(Json(state.lifecycle.resize_group(&ctx, id, req.group_size).await?))
}

async fn assign_seat(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<SeatAssignmentRequest>,
) -> Result<Json<TourBooking>, AppError> {
    let result = state
        .lifecycle
        .assign_seat(&ctx, id, req.passenger_index, req.seat_number)
        .await;
    state.metrics.record_reservation(&result);
    Ok(Json(result?))
}

async fn release_seat(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, seat)): Path<(Uuid, u32)>,
) -> Result<Json<TourBooking>, AppError> {
    Ok(Json(state.lifecycle.release_seat(&ctx, id, seat).await?))
}

async fn release_orphaned_seats(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TourBooking>, AppError> {
    Ok(Json(state.lifecycle.release_orphaned_seats(&ctx, id).await?))
}

async fn record_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<TourBooking>, AppError> {
    Ok(Json(state.lifecycle.record_payment(&ctx, id, req.payment_status).await?))
}

async fn attach_driver(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<DriverRequest>,
) -> Result<Json<TourBooking>, AppError> {
    let booking = state
        .lifecycle
        .attach_driver(&ctx, id, req.driver_id, req.driver_fee)
        .await?;
    Ok(Json(booking))
}

async fn update_passenger(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(req): Json<PassengerUpdate>,
) -> Result<Json<TourBooking>, AppError> {
    let booking = state
        .lifecycle
        .update_passenger(&ctx, id, index, req.name, req.phone)
        .await?;
    Ok(Json(booking))
}
