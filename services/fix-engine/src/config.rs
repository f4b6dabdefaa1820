//! Engine configuration
//!
//! Both sides ship with working defaults (the classic acceptor on 9878)
//! and can be overridden from a JSON file or the binary's CLI flags.

use crate::error::{FixError, FixResult};
use fix_common::constants::DEFAULT_HEARTBEAT_SECS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Acceptor-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// FIX begin string (tag 8)
    pub begin_string: String,
    /// Heartbeat interval in seconds (announced in tag 108)
    pub heartbeat_interval_secs: u64,
    /// Pre-configured SenderCompID; learned from the peer when `None`
    pub sender_comp_id: Option<String>,
    /// Pre-configured TargetCompID; learned from the peer when `None`
    pub target_comp_id: Option<String>,
    /// Delay before the first fill step for market orders (ms)
    pub market_fill_delay_ms: u64,
    /// Delay before the first fill step for limit orders (ms)
    pub limit_fill_delay_ms: u64,
    /// Delay between the partial fill and the final fill (ms)
    pub final_fill_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9878,
            begin_string: "FIX.4.4".to_string(),
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_SECS,
            sender_comp_id: None,
            target_comp_id: None,
            market_fill_delay_ms: 500,
            limit_fill_delay_ms: 2000,
            final_fill_delay_ms: 1000,
        }
    }
}

impl ServerConfig {
    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> FixResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| FixError::Config(e.to_string()))
    }

    /// Heartbeat interval as a [`Duration`]
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// First fill-step delay for the given order type
    #[must_use]
    pub fn first_fill_delay(&self, market: bool) -> Duration {
        if market {
            Duration::from_millis(self.market_fill_delay_ms)
        } else {
            Duration::from_millis(self.limit_fill_delay_ms)
        }
    }

    /// Delay between the partial and the final fill
    #[must_use]
    pub fn final_fill_delay(&self) -> Duration {
        Duration::from_millis(self.final_fill_delay_ms)
    }
}

/// Initiator-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host to connect to
    pub host: String,
    /// Server port
    pub port: u16,
    /// FIX begin string (tag 8)
    pub begin_string: String,
    /// Our SenderCompID (tag 49)
    pub sender_comp_id: String,
    /// The server's comp id (tag 56)
    pub target_comp_id: String,
    /// Heartbeat interval in seconds
    pub heartbeat_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9878,
            begin_string: "FIX.4.4".to_string(),
            sender_comp_id: "CLIENT_TRADER".to_string(),
            target_comp_id: "SERVER_EXCHANGE".to_string(),
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_SECS,
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> FixResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| FixError::Config(e.to_string()))
    }

    /// Heartbeat interval as a [`Duration`]
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}
