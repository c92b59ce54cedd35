//! Packet Inbox
//!
//! Watch mode picks up `cconnect.sms.messages` packet bodies dropped as
//! `*.json` files into an inbox directory. Each file is imported into the
//! store through the [`MessageWriter`] and then renamed to
//! `*.json.imported` (or `*.json.failed` when it cannot be decoded).
//!
//! Importing blocks on the filesystem and SQLite, so callers on the runtime
//! run it with `spawn_blocking`.

use anyhow::{Context, Result};
use cosmic_messages_core::{MessageWriter, SmsMessages};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn pending_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read inbox {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

fn mark(path: &Path, suffix: &str) -> Result<()> {
    let mut target = path.as_os_str().to_owned();
    target.push(".");
    target.push(suffix);
    fs::rename(path, &target)
        .with_context(|| format!("Failed to rename {}", path.display()))
}

/// Import every pending packet file, returning how many were imported
pub fn import_pending(dir: &Path, writer: &MessageWriter) -> Result<usize> {
    let mut imported = 0;

    for path in pending_files(dir)? {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let packet = match SmsMessages::from_json(&contents) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Skipping malformed packet {}: {}", path.display(), e);
                mark(&path, "failed")?;
                continue;
            }
        };

        writer
            .import_sms_packet(&packet)
            .with_context(|| format!("Failed to import {}", path.display()))?;
        mark(&path, "imported")?;
        imported += 1;
        debug!("Imported packet {}", path.display());
    }

    Ok(imported)
}
