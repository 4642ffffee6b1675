//! Explicit tenant context.
//!
//! Every pipeline call takes a `&TenantContext` rather than reading an
//! ambient current-tenant variable. The storage layer filters every query
//! by `tenant_id`; no cross-tenant read path exists above it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The tenant on whose behalf a pipeline operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    pub tenant_id: String,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        TenantContext {
            tenant_id: tenant_id.into(),
        }
    }
}

impl fmt::Display for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tenant_id)
    }
}
