use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tourdesk_core::RequestContext;

use crate::error::AppError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const AGENT_HEADER: &str = "x-agent-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ============================================================================
// Request context from gateway headers
// ============================================================================

/// The identity layer in front of this service authenticates the agent and
/// forwards tenant and agent ids as headers. Requests without them never
/// reach a handler.
pub async fn request_context_middleware(mut req: Request, next: Next) -> Result<Response, AppError> {
    let ctx = context_from_headers(req.headers())?;
    tracing::debug!(tenant = %ctx.tenant_id, agent = %ctx.agent_id, request_id = ?ctx.request_id, "Request context");

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

fn context_from_headers(headers: &HeaderMap) -> Result<RequestContext, AppError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let tenant = header(TENANT_HEADER)
        .ok_or_else(|| AppError::AuthenticationError(format!("missing {} header", TENANT_HEADER)))?;
    let agent = header(AGENT_HEADER)
        .ok_or_else(|| AppError::AuthenticationError(format!("missing {} header", AGENT_HEADER)))?;

    let ctx = RequestContext::new(tenant, agent)?;
    Ok(match header(REQUEST_ID_HEADER) {
        Some(id) => ctx.with_request_id(id),
        None => ctx,
    })
}
