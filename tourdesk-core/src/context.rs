use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Caller identity for one request, handed in by the surrounding identity
/// layer. Every lifecycle call takes one explicitly; nothing in the core
/// reads ambient credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub tenant_id: String,
    pub agent_id: String,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn new(tenant_id: impl Into<String>, agent_id: impl Into<String>) -> CoreResult<Self> {
        let tenant_id = tenant_id.into();
        let agent_id = agent_id.into();

        if tenant_id.trim().is_empty() {
            return Err(CoreError::validation("tenant id must not be empty"));
        }
        if agent_id.trim().is_empty() {
            return Err(CoreError::validation("agent id must not be empty"));
        }

        Ok(Self {
            tenant_id,
            agent_id,
            request_id: None,
        })
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn owns(&self, tenant_id: &str) -> bool {
        self.tenant_id == tenant_id
    }
}
