// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Public discovery API: the coordinator façade, its builder, and the error
//! taxonomy.
//!
//! # Overview
//!
//! [`Discovery`] orchestrates one [`LocalProbe`] and one [`NetworkProbe`]:
//!
//! ```text
//! announce_plugin / revoke_plugin ----> both probes (each owns a registry)
//!
//! discover(cap):
//!   no options, or Nearest   -> local probe; any match short-circuits
//!   otherwise / local empty  -> network probe (bounded collection window)
//!   Youngest / Oldest        -> sort the chosen result set
//!   Callback(listener, t)    -> background worker, exactly one of
//!                               on_found / on_timeout fires, exactly once
//! ```
//!
//! Absence of results and network unavailability are normal outcomes (empty
//! list); the only caller-visible failures are precondition violations on
//! the façade's own arguments and construction-time transport errors.

use crate::config::{PortProfile, RuntimeConfig, CALLBACK_RETRY_DELAY_MS};
use crate::core::{Capability, DiscoveredPlugin, ExportHandle, ExportRecord, PublishMethod};
use crate::probe::{LocalProbe, NetworkProbe, Probe};
use crate::store::FileStore;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod listener;
mod options;

pub use listener::{ClosureListener, DiscoveryListener};
pub use options::DiscoverOption;

use options::{apply_ordering, validate, wants_local_first};

/// Errors returned by plexd operations.
///
/// Discovery itself never fails for "nothing found" or an unreachable
/// network; those degrade to empty results. What remains are caller errors
/// (preconditions) and construction-time failures.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Precondition violations (caller errors)
    // ========================================================================
    /// Capability token is empty or blank.
    EmptyCapability,
    /// Endpoint URI is empty.
    EmptyEndpoint,
    /// Malformed option combination (e.g. Youngest together with Oldest).
    InvalidOptions(String),
    /// Callback timeout of zero can never fire `on_found`.
    ZeroTimeout,

    // ========================================================================
    // Construction errors
    // ========================================================================
    /// Domain ID out of range (0-232).
    InvalidDomainId(u32),
    /// Failed to bind the discovery socket.
    BindFailed(String),
    /// Failed to join the discovery multicast group.
    MulticastJoinFailed(String),
    /// I/O error with underlying cause.
    IoError(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyCapability => write!(f, "Capability token must not be empty"),
            Error::EmptyEndpoint => write!(f, "Endpoint URI must not be empty"),
            Error::InvalidOptions(msg) => write!(f, "Invalid options: {}", msg),
            Error::ZeroTimeout => write!(f, "Callback timeout must be non-zero"),
            Error::InvalidDomainId(id) => {
                write!(f, "Invalid domain_id: {} (must be 0-232)", id)
            }
            Error::BindFailed(msg) => write!(f, "Bind failed: {}", msg),
            Error::MulticastJoinFailed(msg) => write!(f, "Multicast join failed: {}", msg),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

/// Result alias for plexd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Discovery coordinator: the public façade over the two probes.
///
/// Stateless with respect to discovery requests - all history lives in the
/// probes' registries. Safe to call from arbitrary threads.
pub struct Discovery {
    name: String,
    local: Arc<dyn Probe>,
    network: Arc<dyn Probe>,
    config: Arc<RuntimeConfig>,
}

impl Discovery {
    /// Start configuring a discovery node.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> DiscoveryBuilder {
        DiscoveryBuilder {
            name: name.into(),
            domain_id: 0,
            store_path: None,
            window: None,
            lease: None,
        }
    }

    /// Assemble a coordinator from explicit probes.
    ///
    /// Seam for tests and custom deployments (e.g. a network probe stub with
    /// call counting, or a different local store topology). Regular use goes
    /// through [`builder`](Self::builder).
    #[must_use]
    pub fn with_probes(
        name: impl Into<String>,
        local: Arc<dyn Probe>,
        network: Arc<dyn Probe>,
        config: Arc<RuntimeConfig>,
    ) -> Self {
        Self {
            name: name.into(),
            local,
            network,
            config,
        }
    }

    /// Node name (logging/diagnostics).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Announce that the object behind `handle` is reachable at `endpoint`
    /// via `method`.
    ///
    /// The capability manifest was fixed when the handle was created; this
    /// call records the export in both probes and broadcasts it. Re-announcing
    /// an identical `(owner, method, endpoint)` triple refreshes the existing
    /// record; revoke first if a clean re-export is intended.
    ///
    /// # Errors
    /// [`Error::EmptyEndpoint`] on a blank URI.
    pub fn announce_plugin(
        &self,
        handle: &ExportHandle,
        method: PublishMethod,
        endpoint: &str,
    ) -> Result<()> {
        crate::trace_fn!("Discovery::announce_plugin");
        if endpoint.trim().is_empty() {
            return Err(Error::EmptyEndpoint);
        }

        let record = ExportRecord::new(
            handle.owner(),
            handle.capabilities().clone(),
            method,
            endpoint,
            self.config.lease_duration(),
        );

        self.local.announce(&record);
        self.network.announce(&record);

        log::info!(
            "[discovery] {}: announced owner={} method={} endpoint={}",
            self.name,
            record.owner,
            method,
            endpoint
        );
        Ok(())
    }

    /// Revoke a previous announcement by exact `(owner, method, endpoint)`
    /// triple. Idempotent; revoking an absent export is a no-op.
    ///
    /// # Errors
    /// [`Error::EmptyEndpoint`] on a blank URI.
    pub fn revoke_plugin(
        &self,
        handle: &ExportHandle,
        method: PublishMethod,
        endpoint: &str,
    ) -> Result<()> {
        crate::trace_fn!("Discovery::revoke_plugin");
        if endpoint.trim().is_empty() {
            return Err(Error::EmptyEndpoint);
        }

        let owner = handle.owner();
        self.local.revoke(&owner, method, endpoint);
        self.network.revoke(&owner, method, endpoint);

        log::info!(
            "[discovery] {}: revoked owner={} method={} endpoint={}",
            self.name,
            owner,
            method,
            endpoint
        );
        Ok(())
    }

    /// Find endpoints implementing `capability`.
    ///
    /// With no options (or with [`DiscoverOption::Nearest`]) the local probe
    /// is consulted first and any match short-circuits the network probe -
    /// local visibility is treated as authoritative whenever it yields
    /// anything, trading completeness for latency. A bare ordering policy
    /// ([`DiscoverOption::Youngest`] / [`DiscoverOption::Oldest`] without
    /// `Nearest`) queries the network view directly.
    ///
    /// With [`DiscoverOption::Callback`] the call returns `Ok(vec![])`
    /// immediately and the listener receives the outcome on a background
    /// thread.
    ///
    /// "Nothing found" is an empty vector, never an error.
    ///
    /// # Errors
    /// Precondition violations only: blank capability, conflicting or
    /// duplicate options, zero callback timeout.
    pub fn discover(
        &self,
        capability: &Capability,
        options: &[DiscoverOption],
    ) -> Result<Vec<DiscoveredPlugin>> {
        crate::trace_fn!("Discovery::discover");
        if capability.as_str().trim().is_empty() {
            return Err(Error::EmptyCapability);
        }
        validate(options)?;

        let local_first = wants_local_first(options);

        if let Some((listener, timeout)) = extract_callback(options) {
            self.spawn_callback_worker(capability.clone(), options, local_first, listener, timeout)?;
            return Ok(Vec::new());
        }

        let mut results = self.probe_pass(capability, local_first, None);
        apply_ordering(&mut results, options);

        if results.is_empty() {
            log::debug!(
                "[discovery] {}: capability '{}' is not exported anywhere visible",
                self.name,
                capability
            );
        }
        Ok(results)
    }

    /// One local-then-network attempt (the synchronous discovery core).
    fn probe_pass(
        &self,
        capability: &Capability,
        local_first: bool,
        window: Option<Duration>,
    ) -> Vec<DiscoveredPlugin> {
        if local_first {
            let local = self.local.discover(capability);
            if !local.is_empty() {
                return local;
            }
        }
        match window {
            Some(window) => self.network.discover_within(capability, window),
            None => self.network.discover(capability),
        }
    }

    /// Launch the callback worker: repeat probe passes until a non-empty
    /// result or the deadline, then fire exactly one listener method.
    fn spawn_callback_worker(
        &self,
        capability: Capability,
        options: &[DiscoverOption],
        local_first: bool,
        listener: Arc<dyn DiscoveryListener>,
        timeout: Duration,
    ) -> Result<()> {
        let local = Arc::clone(&self.local);
        let network = Arc::clone(&self.network);
        let window = self.config.collection_window();
        let ordering: Vec<DiscoverOption> = options
            .iter()
            .filter(|o| !matches!(o, DiscoverOption::Callback { .. }))
            .cloned()
            .collect();
        let name = self.name.clone();

        thread::Builder::new()
            .name("plexd-discover".to_string())
            .spawn(move || {
                let deadline = Instant::now() + timeout;
                let retry = Duration::from_millis(CALLBACK_RETRY_DELAY_MS);

                loop {
                    let pass_start = Instant::now();
                    let remaining = deadline.saturating_duration_since(pass_start);
                    if remaining.is_zero() {
                        log::debug!(
                            "[discovery] {}: callback deadline passed for '{}'",
                            name,
                            capability
                        );
                        listener.on_timeout();
                        return;
                    }

                    let mut results = if local_first {
                        let local_hits = local.discover(&capability);
                        if local_hits.is_empty() {
                            network.discover_within(&capability, remaining.min(window))
                        } else {
                            local_hits
                        }
                    } else {
                        network.discover_within(&capability, remaining.min(window))
                    };

                    if !results.is_empty() {
                        apply_ordering(&mut results, &ordering);
                        listener.on_found(results);
                        return;
                    }

                    // Pace retries so an instant empty pass does not spin.
                    let elapsed = pass_start.elapsed();
                    if elapsed < retry {
                        let nap = (retry - elapsed)
                            .min(deadline.saturating_duration_since(Instant::now()));
                        if !nap.is_zero() {
                            thread::sleep(nap);
                        }
                    }
                }
            })
            .map_err(Error::IoError)?;
        Ok(())
    }
}

fn extract_callback(
    options: &[DiscoverOption],
) -> Option<(Arc<dyn DiscoveryListener>, Duration)> {
    options.iter().find_map(|o| match o {
        DiscoverOption::Callback { listener, timeout } => {
            Some((Arc::clone(listener), *timeout))
        }
        _ => None,
    })
}

/// Builder for a [`Discovery`] node.
///
/// ```rust,no_run
/// use plexd::Discovery;
/// use std::time::Duration;
///
/// let discovery = Discovery::builder("media-host")
///     .domain_id(3)
///     .collection_window(Duration::from_millis(500))
///     .build()?;
/// # Ok::<(), plexd::Error>(())
/// ```
pub struct DiscoveryBuilder {
    name: String,
    domain_id: u32,
    store_path: Option<PathBuf>,
    window: Option<Duration>,
    lease: Option<Duration>,
}

impl DiscoveryBuilder {
    /// Discovery domain (0-232). Nodes only see peers in the same domain.
    #[must_use]
    pub fn domain_id(mut self, domain_id: u32) -> Self {
        self.domain_id = domain_id;
        self
    }

    /// Path of the host-shared registry file for the local probe.
    ///
    /// Defaults to `plexd-registry-<domain>.json` in the system temp dir,
    /// shared by all processes on the host.
    #[must_use]
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Network reply collection window for synchronous discovery.
    #[must_use]
    pub fn collection_window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    /// Lease attached to announcements; peers drop the record once it
    /// elapses without a refresh.
    #[must_use]
    pub fn lease_duration(mut self, lease: Duration) -> Self {
        self.lease = Some(lease);
        self
    }

    /// Build the node: wire the config, open the local store and start the
    /// network probe's background threads.
    ///
    /// # Errors
    /// [`Error::InvalidDomainId`], transport construction errors.
    pub fn build(self) -> Result<Discovery> {
        crate::trace_fn!("DiscoveryBuilder::build");
        let profile = PortProfile::calculate(self.domain_id)?;

        let config = Arc::new(RuntimeConfig::new());
        config.set_port_profile(profile);
        if let Some(window) = self.window {
            config.set("discovery.window_ms", &window.as_millis().to_string());
        }
        if let Some(lease) = self.lease {
            config.set("discovery.lease_ms", &lease.as_millis().to_string());
        }

        let store_path = self.store_path.unwrap_or_else(|| {
            std::env::temp_dir().join(format!("plexd-registry-{}.json", self.domain_id))
        });
        let local = LocalProbe::new(Box::new(FileStore::new(&store_path)));
        let network = NetworkProbe::new(&config)?;

        log::info!(
            "[discovery] node '{}' up: domain={} port={} store={}",
            self.name,
            self.domain_id,
            profile.discovery_port,
            store_path.display()
        );

        Ok(Discovery::with_probes(
            self.name,
            Arc::new(local),
            Arc::new(network),
            config,
        ))
    }
}
