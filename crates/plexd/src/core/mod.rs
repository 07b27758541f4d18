// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core discovery data model: identities, capability manifests, export
//! records and the registry that holds them.

mod record;
mod table;

pub use record::{
    Capability, CapabilitySet, DiscoveredPlugin, ExportHandle, ExportRecord, OwnerId,
    PublishMethod,
};
pub use table::ExportTable;
