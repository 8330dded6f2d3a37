use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Read a file as text, mapping invalid UTF-8 sequences to the replacement
/// character instead of failing.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Replace `path` with `bytes` without ever exposing a half-written file.
///
/// The bytes land in a staging file beside the target, are synced, and the
/// staging file is renamed over the target. A concurrent reader sees either
/// the old contents or the new contents.
///
/// # Errors
/// Returns an error if the staging write or the rename fails; the staging
/// file is removed on every failure path.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let staging = staging_path(path);
    if let Err(err) = write_staging(&staging, bytes) {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }
    match fs::rename(&staging, path) {
        Ok(()) => Ok(()),
        Err(first) => {
            // Windows refuses to rename over an existing file. Clear the
            // target and try once more before giving up.
            if path.exists()
                && fs::remove_file(path).is_ok()
                && fs::rename(&staging, path).is_ok()
            {
                return Ok(());
            }
            let _ = fs::remove_file(&staging);
            Err(first)
        }
    }
}

/// Sibling staging name. Staying in the target's directory keeps the final
/// rename on one filesystem.
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    target.with_file_name(format!("{}.{}.part", name, std::process::id()))
}

fn write_staging(staging: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(staging)?;
    file.write_all(bytes)?;
    file.sync_all()
}
