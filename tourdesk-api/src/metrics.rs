use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{opts, Encoder, IntCounterVec, Registry, TextEncoder};
use tourdesk_core::{CoreError, CoreResult};

use crate::error::AppError;
use crate::state::AppState;

/// Counters scraped from `GET /metrics`.
pub struct Metrics {
    registry: Registry,
    seat_reservations: IntCounterVec,
    booking_transitions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let seat_reservations = IntCounterVec::new(
            opts!("tourdesk_seat_reservations_total", "Seat reservation attempts by outcome"),
            &["outcome"],
        )?;
        let booking_transitions = IntCounterVec::new(
            opts!("tourdesk_booking_transitions_total", "Committed booking transitions"),
            &["transition"],
        )?;

        registry.register(Box::new(seat_reservations.clone()))?;
        registry.register(Box::new(booking_transitions.clone()))?;

        Ok(Self {
            registry,
            seat_reservations,
            booking_transitions,
        })
    }

    pub fn record_reservation<T>(&self, result: &CoreResult<T>) {
        let outcome = match result {
            Ok(_) => "committed",
            Err(CoreError::SeatConflict { .. }) => "conflict",
            Err(CoreError::CapacityExceeded { .. }) => "capacity_exceeded",
            Err(CoreError::StorageError(_)) => "unknown",
            Err(_) => "rejected",
        };
        self.seat_reservations.with_label_values(&[outcome]).inc();
    }

    pub fn record_transition(&self, transition: &str) {
        self.booking_transitions.with_label_values(&[transition]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render().map_err(anyhow::Error::from)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
