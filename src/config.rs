//! Reconciler configuration.

use serde::{Deserialize, Serialize};

/// Tunables for document discovery, writes, gating, and the runtime loop.
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Object-store prefix under which packing-list documents live.
    pub prefix: String,
    /// Substring a key must contain to be a reconcilable document.
    pub document_marker: String,
    /// Page size for object listing.
    pub list_page_size: usize,
    /// Extra attempts for an OC group after a version conflict.
    pub max_conflict_retries: usize,
    /// Cache patterns invalidated after a request that wrote documents.
    pub invalidate_patterns: Vec<String>,
    /// Requests allowed per caller within one window; 0 disables limiting.
    pub rate_limit_max_requests: u32,
    /// Rate-limit window length in milliseconds.
    pub rate_limit_window_ms: u64,
    /// Bound of the runtime command queue.
    pub command_queue_bound: usize,
    /// Capacity of the runtime event broadcast.
    pub event_queue_bound: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            prefix: "packing-lists/".to_string(),
            document_marker: "detalle_".to_string(),
            list_page_size: 1000,
            max_conflict_retries: 2,
            invalidate_patterns: vec![
                "inventory:*".to_string(),
                "packing-lists:*".to_string(),
                "dashboard:*".to_string(),
            ],
            rate_limit_max_requests: 30,
            rate_limit_window_ms: 60_000,
            command_queue_bound: 256,
            event_queue_bound: 1024,
        }
    }
}

impl ReconcilerConfig {
    /// Parses a JSON config, filling absent fields with defaults.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
