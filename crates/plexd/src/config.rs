// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! plexd Global Configuration - Single Source of Truth
//!
//! This module centralizes ALL protocol constants and runtime configuration.
//! **NEVER hardcode elsewhere!**
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: Compile-time constants (multicast group, ports, windows)
//! - **Level 2 (Dynamic)**: `RuntimeConfig` for runtime config (port profile, settings)
//!
//! # Performance
//!
//! - **Lock-free**: `DashMap` for the settings store (no RwLock contention)
//! - **Atomic swap**: `ArcSwap` for `PortProfile` (no lock)
//!
//! # Example
//!
//! ```ignore
//! use plexd::config::*;
//!
//! // Static constants
//! let port = PORT_BASE; // 7920
//!
//! // Dynamic config
//! let config = RuntimeConfig::new();
//! config.set_port_profile(PortProfile::calculate(3)?);
//! config.set("discovery.window_ms", "500");
//! ```

use crate::discovery::Error;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

// =======================================================================
// Discovery Port Mapping
// =======================================================================

/// Base UDP port for discovery traffic.
///
/// All domain ports are computed from this value.
/// **NEVER hardcode 7920 elsewhere!**
pub const PORT_BASE: u16 = 7920;

/// Maximum domain ID.
///
/// Valid range: 0..=232 (keeps the computed port inside the registered range).
pub const MAX_DOMAIN_ID: u32 = 232;

/// Port gain per domain.
///
/// Formula: `PORT_BASE + (DOMAIN_ID_GAIN x domain_id)`
/// Example: domain 0 -> 7920, domain 1 -> 7930, domain 2 -> 7940
pub const DOMAIN_ID_GAIN: u16 = 10;

/// Multicast group for discovery traffic (announce/revoke/query).
pub const MULTICAST_GROUP: &str = "239.255.71.1";

/// Multicast group as a typed address.
pub const MULTICAST_IP: Ipv4Addr = Ipv4Addr::new(239, 255, 71, 1);

// =======================================================================
// Timing defaults
// =======================================================================

/// Default network reply collection window in milliseconds.
pub const DEFAULT_COLLECTION_WINDOW_MS: u64 = 1_000;

/// Default lease duration attached to announcements, in milliseconds.
///
/// Remote registries drop a record whose lease elapsed without a refresh.
pub const DEFAULT_LEASE_MS: u64 = 30_000;

/// Responder socket poll interval (recv timeout) in milliseconds.
///
/// Bounds shutdown latency of the responder thread.
pub const RESPONDER_POLL_MS: u64 = 100;

/// Lease sweep interval in milliseconds (1 Hz).
pub const LEASE_CHECK_INTERVAL_MS: u64 = 1_000;

/// Retry pacing for callback-based discovery, in milliseconds.
pub const CALLBACK_RETRY_DELAY_MS: u64 = 50;

/// Maximum discovery packet size in bytes.
pub const MAX_PACKET_SIZE: usize = 8_192;

/// Seen-table capacity (duplicate announce suppression).
pub const SEEN_TABLE_MAX_ENTRIES: usize = 100_000;

/// Seen-table entry TTL in seconds.
pub const SEEN_TABLE_TTL_SECS: u64 = 300;

// =======================================================================
// Port profile
// =======================================================================

/// Computed port assignment for one discovery domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortProfile {
    /// UDP port the multicast socket binds to and the group uses.
    pub discovery_port: u16,
}

impl PortProfile {
    /// Compute the port profile for a domain.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDomainId`] when `domain_id > MAX_DOMAIN_ID`.
    pub fn calculate(domain_id: u32) -> Result<Self, Error> {
        crate::trace_fn!("PortProfile::calculate");
        if domain_id > MAX_DOMAIN_ID {
            return Err(Error::InvalidDomainId(domain_id));
        }
        #[allow(clippy::cast_possible_truncation)] // domain_id <= 232 fits u16 math
        let discovery_port = PORT_BASE + DOMAIN_ID_GAIN * domain_id as u16;
        Ok(Self { discovery_port })
    }
}

impl Default for PortProfile {
    fn default() -> Self {
        Self {
            discovery_port: PORT_BASE,
        }
    }
}

// =======================================================================
// Runtime configuration
// =======================================================================

/// Dynamic runtime configuration.
///
/// Holds the active [`PortProfile`] (atomic swap, no lock) and a string
/// settings store for tunables that do not warrant their own field.
///
/// Known settings:
/// - `discovery.window_ms` - network reply collection window
/// - `discovery.lease_ms`  - lease attached to announcements
pub struct RuntimeConfig {
    /// Active port profile (lock-free swap).
    ports: ArcSwap<PortProfile>,
    /// Settings store: key -> value.
    settings: DashMap<Arc<str>, Arc<str>>,
}

impl RuntimeConfig {
    /// Create a runtime config with default ports (domain 0) and no settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ports: ArcSwap::from_pointee(PortProfile::default()),
            settings: DashMap::new(),
        }
    }

    /// Get the active port profile.
    #[must_use]
    pub fn port_profile(&self) -> PortProfile {
        **self.ports.load()
    }

    /// Replace the active port profile.
    pub fn set_port_profile(&self, profile: PortProfile) {
        self.ports.store(Arc::new(profile));
    }

    /// Set a string setting.
    pub fn set(&self, key: &str, value: &str) {
        self.settings.insert(Arc::from(key), Arc::from(value));
    }

    /// Get a string setting.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        self.settings.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Collect all settings whose key starts with `prefix`.
    #[must_use]
    pub fn search_prefix(&self, prefix: &str) -> Vec<(Arc<str>, Arc<str>)> {
        self.settings
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| (Arc::clone(entry.key()), Arc::clone(entry.value())))
            .collect()
    }

    /// Network reply collection window (setting or default).
    #[must_use]
    pub fn collection_window(&self) -> Duration {
        Duration::from_millis(self.millis_setting("discovery.window_ms", DEFAULT_COLLECTION_WINDOW_MS))
    }

    /// Lease duration attached to announcements (setting or default).
    #[must_use]
    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.millis_setting("discovery.lease_ms", DEFAULT_LEASE_MS))
    }

    fn millis_setting(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) => ms,
                Err(_) => {
                    log::debug!("[config] ignoring non-numeric {}='{}'", key, raw);
                    default
                }
            },
            None => default,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =======================================================================
// Environment overrides
// =======================================================================

/// Check whether SO_REUSEPORT should be enabled (`PLEXD_REUSEPORT=1`).
///
/// Required for multi-process discovery on the same machine on Linux.
#[must_use]
pub fn reuseport_enabled() -> bool {
    std::env::var("PLEXD_REUSEPORT").map(|v| v == "1").unwrap_or(false)
}

/// Check whether verbose per-packet UDP logging is enabled (`PLEXD_LOG_UDP`).
#[must_use]
pub fn log_udp_enabled() -> bool {
    std::env::var("PLEXD_LOG_UDP").is_ok()
}

/// Forced multicast interface (`PLEXD_MULTICAST_IF=<ipv4>`), if any.
#[must_use]
pub fn multicast_if_override() -> Option<Ipv4Addr> {
    let raw = std::env::var("PLEXD_MULTICAST_IF").ok()?;
    match raw.parse::<Ipv4Addr>() {
        Ok(addr) => Some(addr),
        Err(_) => {
            log::debug!("[config] ignoring invalid PLEXD_MULTICAST_IF='{}'", raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_profile_domain0() {
        let profile = PortProfile::calculate(0).expect("domain 0 is valid");
        assert_eq!(profile.discovery_port, 7920);
    }

    #[test]
    fn test_port_profile_gain() {
        let profile = PortProfile::calculate(3).expect("domain 3 is valid");
        assert_eq!(profile.discovery_port, PORT_BASE + 3 * DOMAIN_ID_GAIN);
    }

    #[test]
    fn test_port_profile_rejects_out_of_range() {
        let result = PortProfile::calculate(MAX_DOMAIN_ID + 1);
        assert!(matches!(result, Err(Error::InvalidDomainId(_))));
    }

    #[test]
    fn test_runtime_config_port_swap() {
        let config = RuntimeConfig::new();
        assert_eq!(config.port_profile().discovery_port, PORT_BASE);

        let profile = PortProfile::calculate(5).expect("domain 5 is valid");
        config.set_port_profile(profile);
        assert_eq!(config.port_profile(), profile);
    }

    #[test]
    fn test_runtime_config_settings() {
        let config = RuntimeConfig::new();
        config.set("discovery.window_ms", "250");
        config.set("discovery.lease_ms", "5000");

        assert_eq!(config.collection_window(), Duration::from_millis(250));
        assert_eq!(config.lease_duration(), Duration::from_millis(5000));

        let all = config.search_prefix("discovery.");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_runtime_config_defaults_on_garbage() {
        let config = RuntimeConfig::new();
        config.set("discovery.window_ms", "not-a-number");
        assert_eq!(
            config.collection_window(),
            Duration::from_millis(DEFAULT_COLLECTION_WINDOW_MS)
        );
    }

    #[test]
    fn test_unknown_setting_is_none() {
        let config = RuntimeConfig::new();
        assert!(config.get("no.such.key").is_none());
    }
}
