//! Telemetry utilities.

/// Standardized span constructors for client observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for one connection (one socket lifetime).
    pub fn connection(shard: usize, host: &str) -> Span {
        info_span!("connection", shard = shard, host = %host)
    }

    /// Span for shard manager housekeeping on one shard.
    pub fn shard(shard: usize) -> Span {
        info_span!("shard", shard = shard)
    }
}
