// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # plexd - Plugin Export Discovery
//!
//! A pure Rust distributed discovery middleware: processes announce that an
//! object is reachable at a network endpoint under a transport method, any
//! process on the host or subnet discovers endpoints by capability, and
//! announcements are revoked when the export goes away.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plexd::{Capability, CapabilitySet, Discovery, ExportHandle, PublishMethod, Result};
//!
//! fn main() -> Result<()> {
//!     let discovery = Discovery::builder("media-host").domain_id(0).build()?;
//!
//!     // The container computed this manifest when the object was registered.
//!     let handle = ExportHandle::new(CapabilitySet::from_names(&["com.example.Codec"]));
//!     discovery.announce_plugin(&handle, PublishMethod::TcpRpc, "tcp://host:9000")?;
//!
//!     // Same host or remote, local-first with network fallback.
//!     for plugin in discovery.discover(&Capability::new("com.example.Codec"), &[])? {
//!         println!("{} via {} ({:?} old)", plugin.endpoint, plugin.method, plugin.time_since_export);
//!     }
//!
//!     discovery.revoke_plugin(&handle, PublishMethod::TcpRpc, "tcp://host:9000")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Discovery (facade)                          |
//! |   announce/revoke -> both probes | discover -> policy selection    |
//! +--------------------------------------------------------------------+
//! |        LocalProbe            |           NetworkProbe              |
//! |  host-shared store (file),   |  multicast announce/revoke/query,   |
//! |  no network I/O              |  bounded reply window, responder,   |
//! |                              |  seen table, lease sweep            |
//! +--------------------------------------------------------------------+
//! |                 ExportTable (registry, one per probe)              |
//! +--------------------------------------------------------------------+
//! |            Wire protocol (PLEX) | UDP transport (multicast)        |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Discovery`] | Entry point: announce, revoke, discover |
//! | [`ExportHandle`] | Owner identity + capability manifest, fixed at registration |
//! | [`DiscoverOption`] | Selection policy: Nearest, Youngest, Oldest, Callback |
//! | [`DiscoveredPlugin`] | Result descriptor (method, endpoint, distance, age) |
//! | [`DiscoveryListener`] | Callback target for the non-blocking mode |
//!
//! ## Semantics Worth Knowing
//!
//! - A local match short-circuits the network probe (latency over
//!   completeness); a bare `Youngest`/`Oldest` queries the network view.
//! - "Nothing found" is an empty vector, never an error; network
//!   unavailability degrades the same way.
//! - Remote records carry a lease and age out when their announcer dies
//!   without revoking; the host-shared local registry tolerates stale
//!   entries instead.

/// Global configuration (protocol constants, port profiles, runtime config).
pub mod config;
/// Core data model (identities, capability manifests, records, registry).
pub mod core;
/// Public discovery API (coordinator, options, listeners, errors).
pub mod discovery;
/// Function-entry tracing (no-op unless the `trace` feature is enabled).
pub mod logging;
/// Discovery probes (local store probe, multicast network probe).
pub mod probe;
/// Discovery wire format (builders and defensive parsers).
pub mod protocol;
/// Persistence backends for the host-local registry.
pub mod store;
/// UDP multicast transport.
pub mod transport;

pub use crate::core::{
    Capability, CapabilitySet, DiscoveredPlugin, ExportHandle, ExportRecord, ExportTable, OwnerId,
    PublishMethod,
};
pub use discovery::{
    ClosureListener, DiscoverOption, Discovery, DiscoveryBuilder, DiscoveryListener, Error, Result,
};
pub use probe::{LocalProbe, NetworkProbe, Probe};
pub use store::{ExportStore, FileStore, MemoryStore};
