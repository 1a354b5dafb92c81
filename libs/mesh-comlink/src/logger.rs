//! Link-scoped logging
//!
//! Every line carries the link name so logs from several coordinators can be
//! told apart. Payloads are logged as uppercase hex.

use tracing::{debug, info, warn};

use crate::lifecycle::LinkState;

#[derive(Debug, Clone)]
pub struct LinkLogger {
    pub link_name: String,
}

impl LinkLogger {
    pub fn new(link_name: impl Into<String>) -> Self {
        Self {
            link_name: link_name.into(),
        }
    }

    /// Log a request or response payload
    pub fn log_raw_message(
        &self,
        direction: &str,
        operation: &str,
        target: Option<u16>,
        data: &[u8],
    ) {
        let target = target
            .map(|t| format!("0x{:04X}", t))
            .unwrap_or_else(|| "-".to_string());
        debug!(
            link = %self.link_name,
            "[{}] {} target={} len={} data={}",
            direction,
            operation,
            target,
            data.len(),
            common::hex::encode_upper(data)
        );
    }

    /// Log connection attempt
    pub fn log_connect(&self, target: &str, details: &str) {
        info!(link = %self.link_name, "[CONNECT] {} - {}", target, details);
    }

    /// Log lifecycle state change
    pub fn log_status(&self, old_state: LinkState, new_state: LinkState, reason: &str) {
        info!(
            link = %self.link_name,
            "[STATUS] {} -> {} - {}",
            old_state,
            new_state,
            reason
        );
    }

    /// Log a failed reconnect attempt
    pub fn log_retry(&self, attempt: u64, interval_ms: u64, reason: &str) {
        warn!(
            link = %self.link_name,
            "[RETRY] Attempt {} failed, next in {}ms - {}",
            attempt,
            interval_ms,
            reason
        );
    }
}
