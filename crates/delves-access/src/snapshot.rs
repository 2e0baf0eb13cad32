//! Cooldown snapshot file.
//!
//! The ledger is written out on shutdown for operators to inspect. The file
//! is deleted unread on the next startup; cooldowns reset with the process.

use std::io;
use std::path::Path;

use tracing::info;

use crate::cooldown::CooldownLedger;

/// Writes every ledger record to `path` as a JSON object keyed by player id.
///
/// # Errors
///
/// Returns the I/O error if the file cannot be written.
pub fn write_snapshot(path: &Path, ledger: &CooldownLedger) -> io::Result<()> {
    let records = ledger.snapshot();
    let json = serde_json::to_vec_pretty(&records).map_err(io::Error::other)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), players = records.len(), "wrote cooldown snapshot");
    Ok(())
}

/// Deletes a snapshot left by a previous run without reading it. Returns
/// `true` if a file was removed.
///
/// # Errors
///
/// Returns the I/O error if an existing file cannot be removed.
pub fn discard_snapshot(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "discarded cooldown snapshot from previous run");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
