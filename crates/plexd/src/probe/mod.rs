// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery probes: strategies able to announce, revoke and query exports.
//!
//! Two implementations ship with plexd: [`LocalProbe`] (host-shared store, no
//! network I/O) and [`NetworkProbe`] (multicast broadcast + bounded reply
//! collection). The coordinator only sees the [`Probe`] trait, which also
//! gives tests an instrumentation seam.

use crate::core::{Capability, DiscoveredPlugin, ExportRecord, OwnerId, PublishMethod};
use std::time::Duration;

mod local;
pub mod network;

pub use local::LocalProbe;
pub use network::NetworkProbe;

/// A discovery strategy scoped to one visibility domain.
///
/// Announce/revoke mutate the probe's own registry and never fail visibly
/// (all I/O problems are absorbed at the probe boundary); discover returns an
/// empty vector for "nothing found" as a normal outcome.
pub trait Probe: Send + Sync {
    /// Record an export and propagate it within the probe's scope.
    fn announce(&self, record: &ExportRecord);

    /// Remove an export by exact identifying triple and propagate the
    /// removal. Idempotent.
    fn revoke(&self, owner: &OwnerId, method: PublishMethod, endpoint: &str);

    /// Find endpoints implementing `capability`.
    fn discover(&self, capability: &Capability) -> Vec<DiscoveredPlugin>;

    /// Like [`discover`](Self::discover), bounded by `window`.
    ///
    /// Probes without a natural collection window (the local probe) ignore
    /// the bound.
    fn discover_within(&self, capability: &Capability, window: Duration) -> Vec<DiscoveredPlugin> {
        let _ = window;
        self.discover(capability)
    }
}
