//! Blocking directory tree helpers.

use std::fs;
use std::io;
use std::path::Path;

/// Host lock and identity files that must not be carried into a copy.
const SKIPPED_FILES: [&str; 2] = ["session.lock", "uid.dat"];

/// Recursively copies `source` into `destination`, creating it. Returns the
/// number of files copied.
pub(crate) fn copy_tree(source: &Path, destination: &Path) -> io::Result<u64> {
    fs::create_dir_all(destination)?;
    let mut copied = 0;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&entry.path(), &target)?;
        } else if !is_skipped(&entry.file_name().to_string_lossy()) {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Removes `path` and everything below it. A missing directory counts as
/// removed.
pub(crate) fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn is_skipped(file_name: &str) -> bool {
    SKIPPED_FILES.contains(&file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_tree_skips_lock_and_identity_files() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(source.join("region")).unwrap();
        fs::write(source.join("level.dat"), b"level").unwrap();
        fs::write(source.join("session.lock"), b"lock").unwrap();
        fs::write(source.join("uid.dat"), b"uid").unwrap();
        fs::write(source.join("region").join("r.0.0.mca"), b"region").unwrap();
        let destination = dir.path().join("copy");

        // Act
        let copied = copy_tree(&source, &destination).unwrap();

        // Assert
        assert_eq!(copied, 2);
        assert_eq!(fs::read(destination.join("level.dat")).unwrap(), b"level");
        assert!(destination.join("region").join("r.0.0.mca").is_file());
        assert!(!destination.join("session.lock").exists());
        assert!(!destination.join("uid.dat").exists());
    }

    #[test]
    fn test_copy_tree_fails_on_missing_source() {
        let dir = tempfile::tempdir().unwrap();

        let result = copy_tree(&dir.path().join("absent"), &dir.path().join("copy"));

        assert!(result.is_err());
    }

    #[test]
    fn test_remove_tree_tolerates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();

        assert!(remove_tree(&dir.path().join("absent")).is_ok());
    }
}
