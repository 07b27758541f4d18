// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

/// Callback Discovery Example for plexd
///
/// Demonstrates:
/// - Non-blocking discovery with a listener and a deadline
/// - The exactly-once found/timeout contract
/// - An announcement arriving after the callback was registered
use plexd::{
    Capability, CapabilitySet, ClosureListener, DiscoverOption, Discovery, ExportHandle,
    PublishMethod,
};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== plexd Callback Discovery Example ===\n");

    let discovery = Discovery::builder("callback_example").domain_id(0).build()?;
    println!("[OK] Created discovery node");

    let (tx, rx) = mpsc::channel();
    let listener = {
        let found_tx = tx.clone();
        let timeout_tx = tx;
        Arc::new(ClosureListener::new(
            move |plugins| {
                let _ = found_tx.send(Some(plugins));
            },
            move || {
                let _ = timeout_tx.send(None);
            },
        ))
    };

    // Register the callback before anything is exported; discover() returns
    // immediately and the listener fires on a background thread.
    let capability = Capability::new("com.example.Codec");
    let immediate = discovery.discover(
        &capability,
        &[DiscoverOption::callback(listener, Duration::from_secs(2))],
    )?;
    println!(
        "[OK] Callback registered, call returned {} results immediately",
        immediate.len()
    );

    // The export shows up half a second later, well inside the window.
    std::thread::sleep(Duration::from_millis(500));
    let handle = ExportHandle::new(CapabilitySet::from_names(&["com.example.Codec"]));
    discovery.announce_plugin(&handle, PublishMethod::TcpRpc, "tcp://localhost:9000")?;
    println!("[OK] Announced codec at t=500ms");

    match rx.recv_timeout(Duration::from_secs(5))? {
        Some(plugins) => {
            println!("\n--- on_found fired ---");
            for plugin in plugins {
                println!("Found: {} via {}", plugin.endpoint, plugin.method);
            }
        }
        None => println!("\n--- on_timeout fired (no export appeared in time) ---"),
    }

    discovery.revoke_plugin(&handle, PublishMethod::TcpRpc, "tcp://localhost:9000")?;
    println!("\n[OK] Revoked export");
    Ok(())
}
