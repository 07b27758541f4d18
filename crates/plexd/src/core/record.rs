// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core discovery value types: identities, capabilities, export records.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Opaque 16-byte identity of an exported object (or of a discovery node).
///
/// Value equality is identity: two handles with the same bytes refer to the
/// same export owner. Generated ids mix process id, wall clock and a process
/// counter so that independent processes on one host do not collide.
///
/// # Display Format
/// Hex with dots: "a1.00.00.00.5f.3c.00.00.00.00.00.00.00.00.00.07"
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OwnerId([u8; 16]);

impl OwnerId {
    /// Create an id from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> [u8; 16] {
        self.0
    }

    /// All-zero id (invalid/placeholder).
    #[must_use]
    pub fn zero() -> Self {
        Self([0; 16])
    }

    /// Check whether the id is all zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Generate a fresh id.
    ///
    /// Layout: pid (4) | unix seconds (4) | subsec nanos (4) | counter (4).
    #[must_use]
    pub fn generate() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&std::process::id().to_le_bytes());
        #[allow(clippy::cast_possible_truncation)] // low 32 bits are enough entropy here
        bytes[4..8].copy_from_slice(&(now.as_secs() as u32).to_le_bytes());
        bytes[8..12].copy_from_slice(&now.subsec_nanos().to_le_bytes());
        bytes[12..16].copy_from_slice(&count.to_le_bytes());
        Self(bytes)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({})", self)
    }
}

/// Capability identifier a plugin declares it satisfies.
///
/// Discovery queries are keyed by capability. Cheap to clone (`Arc<str>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Capability(Arc<str>);

impl Capability {
    /// Create a capability token.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Get the token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Capability {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Capability {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from(String::deserialize(deserializer)?))
    }
}

/// The fixed capability manifest of an exported object.
///
/// Computed once when the object is registered with its container (including
/// capabilities inherited through supertypes) and attached to every export
/// record. Discovery never walks type hierarchies at query time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySet(Vec<Capability>);

impl CapabilitySet {
    /// Empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a manifest from capability names.
    #[must_use]
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        names.iter().map(Capability::new).collect()
    }

    /// Check whether the manifest contains `capability`.
    #[must_use]
    pub fn contains(&self, capability: &Capability) -> bool {
        self.0.contains(capability)
    }

    /// Add a capability (no-op on duplicates).
    pub fn insert(&mut self, capability: Capability) {
        if !self.0.contains(&capability) {
            self.0.push(capability);
        }
    }

    /// Iterate over the manifest.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }

    /// Number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the manifest is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = Self::new();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

/// Transport tag identifying how an endpoint is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublishMethod {
    /// Same-process object, no transport.
    Local,
    /// RPC over TCP.
    TcpRpc,
    /// RPC over UDP.
    UdpRpc,
    /// Shared-memory segment on the same host.
    SharedMem,
}

impl PublishMethod {
    /// Wire code of this method.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            PublishMethod::Local => 0x01,
            PublishMethod::TcpRpc => 0x02,
            PublishMethod::UdpRpc => 0x03,
            PublishMethod::SharedMem => 0x04,
        }
    }

    /// Decode a wire code. Unknown codes are rejected.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(PublishMethod::Local),
            0x02 => Some(PublishMethod::TcpRpc),
            0x03 => Some(PublishMethod::UdpRpc),
            0x04 => Some(PublishMethod::SharedMem),
            _ => None,
        }
    }
}

impl fmt::Display for PublishMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishMethod::Local => "LOCAL",
            PublishMethod::TcpRpc => "TCP_RPC",
            PublishMethod::UdpRpc => "UDP_RPC",
            PublishMethod::SharedMem => "SHM",
        };
        f.write_str(name)
    }
}

/// One announcement: an owner reachable at an endpoint under a method.
///
/// A record is uniquely identified by `(owner, method, endpoint)`; the same
/// owner may hold several records (multiple transports or URIs). `distance`
/// is 0 for records exported by this node and 1 for records learned from the
/// network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// Identity of the exported object.
    pub owner: OwnerId,
    /// Capability manifest (fixed at announce time).
    pub capabilities: CapabilitySet,
    /// Transport tag.
    pub method: PublishMethod,
    /// Endpoint URI (e.g. `tcp://host:9000`).
    pub endpoint: String,
    /// Wall-clock export time. Survives the announcing process in the
    /// host-shared registry; age is always recomputed at query time.
    pub exported_at: SystemTime,
    /// Lease duration; remote registries drop the record once it elapses.
    pub lease: Duration,
    /// Hop distance from the exporting node (0 = exported here).
    #[serde(default)]
    pub distance: u32,
}

impl ExportRecord {
    /// Create a record exported by this node, stamped now.
    #[must_use]
    pub fn new(
        owner: OwnerId,
        capabilities: CapabilitySet,
        method: PublishMethod,
        endpoint: impl Into<String>,
        lease: Duration,
    ) -> Self {
        Self {
            owner,
            capabilities,
            method,
            endpoint: endpoint.into(),
            exported_at: SystemTime::now(),
            lease,
            distance: 0,
        }
    }

    /// Check an exact identifying-triple match.
    #[must_use]
    pub fn matches_triple(&self, owner: &OwnerId, method: PublishMethod, endpoint: &str) -> bool {
        self.owner == *owner && self.method == method && self.endpoint == endpoint
    }

    /// Check whether two records share the identifying triple.
    #[must_use]
    pub fn same_triple(&self, other: &ExportRecord) -> bool {
        self.matches_triple(&other.owner, other.method, &other.endpoint)
    }

    /// Elapsed time since export, recomputed against `now`.
    ///
    /// Saturates to zero on clock skew.
    #[must_use]
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.exported_at).unwrap_or_default()
    }

    /// Check whether the lease elapsed. A zero lease never expires.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        !self.lease.is_zero() && self.age(now) > self.lease
    }

    /// Project this record into a caller-facing discovery result.
    #[must_use]
    pub fn to_discovered(&self, now: SystemTime) -> DiscoveredPlugin {
        DiscoveredPlugin {
            method: self.method,
            endpoint: self.endpoint.clone(),
            distance_hint: self.distance,
            time_since_export: self.age(now),
        }
    }
}

/// Read-only discovery result handed to callers.
///
/// Descriptor only: turning it into a live proxy is the RPC layer's job.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredPlugin {
    /// Transport tag of the endpoint.
    pub method: PublishMethod,
    /// Endpoint URI.
    pub endpoint: String,
    /// 0 for same-process/local visibility, non-zero otherwise.
    pub distance_hint: u32,
    /// Elapsed time since the export was announced (computed at reply time).
    pub time_since_export: Duration,
}

/// Handle the container hands out when an object is registered for export.
///
/// Carries the owner identity and the capability manifest computed once at
/// registration time; every announcement made through the handle reuses the
/// same manifest.
#[derive(Debug, Clone)]
pub struct ExportHandle {
    owner: OwnerId,
    capabilities: CapabilitySet,
}

impl ExportHandle {
    /// Create a handle with a fresh owner identity.
    #[must_use]
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            owner: OwnerId::generate(),
            capabilities,
        }
    }

    /// Create a handle with an explicit owner identity.
    #[must_use]
    pub fn with_owner(owner: OwnerId, capabilities: CapabilitySet) -> Self {
        Self {
            owner,
            capabilities,
        }
    }

    /// Owner identity.
    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Capability manifest.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }
}
