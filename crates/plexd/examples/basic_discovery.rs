// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

/// Basic Discovery Example for plexd
///
/// Demonstrates:
/// - Creating a Discovery node
/// - Announcing an export with a capability manifest
/// - Discovering endpoints by capability (local-first)
/// - Ordering results with Youngest/Oldest
/// - Revoking an announcement
use plexd::{Capability, CapabilitySet, DiscoverOption, Discovery, ExportHandle, PublishMethod};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== plexd Basic Discovery Example ===\n");

    let discovery = Discovery::builder("basic_example").domain_id(0).build()?;
    println!("[OK] Created discovery node");

    // The container computes the manifest once, at registration time.
    let codec = ExportHandle::new(CapabilitySet::from_names(&[
        "com.example.Codec",
        "com.example.Transcoder",
    ]));
    discovery.announce_plugin(&codec, PublishMethod::TcpRpc, "tcp://localhost:9000")?;
    println!("[OK] Announced codec at tcp://localhost:9000");

    let sink = ExportHandle::new(CapabilitySet::from_names(&["com.example.Codec"]));
    discovery.announce_plugin(&sink, PublishMethod::SharedMem, "shm://codec-fast")?;
    println!("[OK] Announced second codec at shm://codec-fast");

    println!("\n--- Discovering com.example.Codec ---");
    let capability = Capability::new("com.example.Codec");
    for plugin in discovery.discover(&capability, &[])? {
        println!(
            "Found: {} via {} (distance={}, age={:?})",
            plugin.endpoint, plugin.method, plugin.distance_hint, plugin.time_since_export
        );
    }

    println!("\n--- Freshest first ---");
    let youngest = discovery.discover(
        &capability,
        &[DiscoverOption::Nearest, DiscoverOption::Youngest],
    )?;
    for plugin in &youngest {
        println!("Found: {} ({:?} old)", plugin.endpoint, plugin.time_since_export);
    }

    // A capability nobody exports is an empty result, not an error.
    let missing = discovery.discover(&Capability::new("com.example.Missing"), &[])?;
    println!("\n[OK] Unexported capability returned {} results", missing.len());

    discovery.revoke_plugin(&codec, PublishMethod::TcpRpc, "tcp://localhost:9000")?;
    discovery.revoke_plugin(&sink, PublishMethod::SharedMem, "shm://codec-fast")?;
    println!("[OK] Revoked both exports");

    let after = discovery.discover(&capability, &[])?;
    println!("[OK] Discovery after revoke: {} results", after.len());

    // Give fire-and-forget revoke broadcasts a moment before the process exits.
    std::thread::sleep(Duration::from_millis(100));
    Ok(())
}
