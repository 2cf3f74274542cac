use async_trait::async_trait;
use tourdesk_shared::{BookingEvent, BookingNotice, DriverAssignmentRequest};
use uuid::Uuid;

use crate::RequestContext;

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Issues the opaque voucher identifier a booking carries from creation on.
pub trait VoucherIssuer: Send + Sync {
    fn issue(&self, ctx: &RequestContext, booking_id: Uuid) -> String;
}

/// Driver module: attaches a driver and fee once a booking is confirmed.
#[async_trait]
pub trait DriverAssignmentHook: Send + Sync {
    async fn booking_confirmed(&self, request: &DriverAssignmentRequest) -> Result<(), HookError>;
}

/// Outbound voucher / messaging delivery.
#[async_trait]
pub trait BookingNotifier: Send + Sync {
    async fn notify(&self, event: &BookingEvent) -> Result<(), HookError>;
}

/// Schedules a payment reminder for confirmed bookings that are not paid in full.
#[async_trait]
pub trait PaymentReminder: Send + Sync {
    async fn schedule(&self, notice: &BookingNotice) -> Result<(), HookError>;
}

/// Collaborator that only records what it would have sent.
pub struct LoggingCollaborator;

#[async_trait]
impl DriverAssignmentHook for LoggingCollaborator {
    async fn booking_confirmed(&self, request: &DriverAssignmentRequest) -> Result<(), HookError> {
        tracing::info!(
            booking_id = %request.booking_id,
            group_size = request.group_size,
            "Driver assignment requested for pickup at {}",
            request.pickup_location
        );
        Ok(())
    }
}

#[async_trait]
impl BookingNotifier for LoggingCollaborator {
    async fn notify(&self, event: &BookingEvent) -> Result<(), HookError> {
        let notice = event.notice();
        tracing::info!(
            booking_id = %notice.booking_id,
            voucher = %notice.voucher,
            passengers = notice.passengers.len(),
            "Booking {} notification queued",
            event.kind()
        );
        Ok(())
    }
}

#[async_trait]
impl PaymentReminder for LoggingCollaborator {
    async fn schedule(&self, notice: &BookingNotice) -> Result<(), HookError> {
        tracing::info!(
            booking_id = %notice.booking_id,
            payment_status = %notice.payment_status,
            "Payment reminder scheduled for {}",
            notice.price
        );
        Ok(())
    }
}
