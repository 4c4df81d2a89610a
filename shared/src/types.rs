//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Limit/offset pagination parameters for list endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl ListQuery {
    /// Clamp to sane bounds before handing to a query
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, 1000),
            offset: self.offset.max(0),
        }
    }
}
