// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery options: selection policies and the callback mode.

use super::listener::DiscoveryListener;
use super::Error;
use crate::core::DiscoveredPlugin;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Composable option for one discovery request.
#[derive(Clone)]
pub enum DiscoverOption {
    /// Prefer local visibility; any local match short-circuits the network
    /// probe. This is also the behavior with no options at all.
    Nearest,
    /// Order results freshest-first (smallest time since export).
    Youngest,
    /// Order results oldest-first.
    Oldest,
    /// Do not block: run the probe attempt in the background and invoke the
    /// listener exactly once - `on_found` with the first non-empty result
    /// set, or `on_timeout` when `timeout` elapses.
    Callback {
        /// Callback target.
        listener: Arc<dyn DiscoveryListener>,
        /// Deadline for the whole attempt; must be non-zero.
        timeout: Duration,
    },
}

impl DiscoverOption {
    /// Convenience constructor for the callback mode.
    #[must_use]
    pub fn callback(listener: Arc<dyn DiscoveryListener>, timeout: Duration) -> Self {
        DiscoverOption::Callback { listener, timeout }
    }
}

impl fmt::Debug for DiscoverOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoverOption::Nearest => f.write_str("Nearest"),
            DiscoverOption::Youngest => f.write_str("Youngest"),
            DiscoverOption::Oldest => f.write_str("Oldest"),
            DiscoverOption::Callback { timeout, .. } => {
                f.debug_struct("Callback").field("timeout", timeout).finish()
            }
        }
    }
}

/// Reject malformed option combinations.
pub(crate) fn validate(options: &[DiscoverOption]) -> Result<(), Error> {
    let youngest = options
        .iter()
        .any(|o| matches!(o, DiscoverOption::Youngest));
    let oldest = options.iter().any(|o| matches!(o, DiscoverOption::Oldest));
    if youngest && oldest {
        return Err(Error::InvalidOptions(
            "Youngest and Oldest are mutually exclusive".to_string(),
        ));
    }

    let mut callbacks = 0;
    for option in options {
        if let DiscoverOption::Callback { timeout, .. } = option {
            callbacks += 1;
            if timeout.is_zero() {
                return Err(Error::ZeroTimeout);
            }
        }
    }
    if callbacks > 1 {
        return Err(Error::InvalidOptions(
            "at most one Callback option per request".to_string(),
        ));
    }

    Ok(())
}

/// Check whether the request wants the local-first/short-circuit path.
///
/// True with no ordering policy at all, or when `Nearest` is present.
pub(crate) fn wants_local_first(options: &[DiscoverOption]) -> bool {
    let has_ordering = options
        .iter()
        .any(|o| matches!(o, DiscoverOption::Youngest | DiscoverOption::Oldest));
    let has_nearest = options.iter().any(|o| matches!(o, DiscoverOption::Nearest));
    has_nearest || !has_ordering
}

/// Apply the ordering policy in place.
///
/// Operates on whichever result set the probes produced; never triggers an
/// additional probe.
pub(crate) fn apply_ordering(results: &mut [DiscoveredPlugin], options: &[DiscoverOption]) {
    if options
        .iter()
        .any(|o| matches!(o, DiscoverOption::Youngest))
    {
        results.sort_by_key(|p| p.time_since_export);
    } else if options.iter().any(|o| matches!(o, DiscoverOption::Oldest)) {
        results.sort_by(|a, b| b.time_since_export.cmp(&a.time_since_export));
    }
}
