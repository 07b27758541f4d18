// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared-file store backing the local probe.
//!
//! Records are kept as one JSON array in a file visible to every process on
//! the host. Writes go through a process-unique temp file followed by an
//! atomic rename, so concurrent readers never observe a half-written file.
//! Lost updates between processes racing on the same file are possible and
//! tolerated (the registry converges on the next announce/revoke).

use super::ExportStore;
use crate::core::ExportRecord;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// JSON-file persistence for the host-local registry.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store over `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plexd-registry.json".to_string());
        self.path
            .with_file_name(format!("{}.{}.tmp", file_name, std::process::id()))
    }
}

impl ExportStore for FileStore {
    fn load(&self) -> Vec<ExportRecord> {
        crate::trace_fn!("FileStore::load");
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                log::debug!(
                    "[store] read of {} failed, treating as empty: {}",
                    self.path.display(),
                    e
                );
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                log::debug!(
                    "[store] {} is not a valid registry file, treating as empty: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    fn save(&self, records: &[ExportRecord]) -> io::Result<()> {
        crate::trace_fn!("FileStore::save");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec(records)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}
