// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Function-entry tracing, compiled out unless the `trace` feature is on.
//!
//! All regular logging goes through the `log` facade; `trace_fn!` exists for
//! call-path diagnostics in debug builds and expands to nothing otherwise.

/// Trace function entry.
///
/// Emits a `log::trace!` line when compiled with the `trace` feature,
/// otherwise expands to an empty expression.
///
/// # Example
/// ```ignore
/// crate::trace_fn!("ExportTable::announce");
/// ```
#[macro_export]
#[cfg(feature = "trace")]
macro_rules! trace_fn {
    ($fn_name:expr) => {
        ::log::trace!("[trace] enter {}", $fn_name);
    };
}

/// No-op trace macro (when trace feature disabled).
#[macro_export]
#[cfg(not(feature = "trace"))]
macro_rules! trace_fn {
    ($fn_name:expr) => {};
}
