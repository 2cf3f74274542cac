use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use tourdesk_core::hooks::VoucherIssuer;
use tourdesk_core::RequestContext;
use uuid::Uuid;

/// Default voucher numbering: `{prefix}-{yymmdd}-{sequence}-{short id}`.
/// Callers must treat the result as opaque.
pub struct VoucherBook {
    prefix: String,
    sequence: AtomicU64,
}

impl VoucherBook {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(1),
        }
    }
}

impl Default for VoucherBook {
    fn default() -> Self {
        Self::new("TD")
    }
}

impl VoucherIssuer for VoucherBook {
    fn issue(&self, _ctx: &RequestContext, booking_id: Uuid) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let date = Utc::now().format("%y%m%d");
        let short_id = &booking_id.simple().to_string()[..6];
        format!("{}-{}-{:05}-{}", self.prefix, date, seq, short_id.to_uppercase())
    }
}
