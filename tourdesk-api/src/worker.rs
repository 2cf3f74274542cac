use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tourdesk_core::hooks::{BookingNotifier, DriverAssignmentHook, LoggingCollaborator, PaymentReminder};
use tourdesk_shared::{BookingEvent, PaymentStatus};
use tracing::{info, warn};

use crate::metrics::Metrics;

/// External modules that react to committed booking changes.
#[derive(Clone)]
pub struct Collaborators {
    pub driver: Arc<dyn DriverAssignmentHook>,
    pub notifier: Arc<dyn BookingNotifier>,
    pub reminder: Arc<dyn PaymentReminder>,
}

impl Collaborators {
    pub fn logging() -> Self {
        let collaborator = Arc::new(LoggingCollaborator);
        Self {
            driver: collaborator.clone(),
            notifier: collaborator.clone(),
            reminder: collaborator,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn BookingNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

/// Runs side effects after commit. Failures are logged and never touch the
/// booking; the worker exits when the lifecycle is dropped.
pub async fn start_booking_worker(
    mut events: broadcast::Receiver<BookingEvent>,
    collaborators: Collaborators,
    metrics: Arc<Metrics>,
) {
    info!("Booking side-effect worker started");

    loop {
        match events.recv().await {
            Ok(event) => {
                metrics.record_transition(event.kind());
                dispatch(&collaborators, &event).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Booking worker lagged; side effects for skipped events were not run");
            }
            Err(RecvError::Closed) => {
                info!("Booking event channel closed, worker stopping");
                break;
            }
        }
    }
}

async fn dispatch(collaborators: &Collaborators, event: &BookingEvent) {
    let booking_id = event.notice().booking_id;

    if let BookingEvent::Confirmed { notice, driver_request } = event {
        if let Err(e) = collaborators.driver.booking_confirmed(driver_request).await {
            warn!(%booking_id, "Driver assignment hook failed: {}", e);
        }
        if notice.payment_status != PaymentStatus::Paid {
            if let Err(e) = collaborators.reminder.schedule(notice).await {
                warn!(%booking_id, "Payment reminder failed: {}", e);
            }
        }
    }

    if let Err(e) = collaborators.notifier.notify(event).await {
        warn!(%booking_id, kind = event.kind(), "Booking notification failed: {}", e);
    }
}
