//! Crash-safe file replacement.

use crate::error::PersistenceError;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn io_error(path: &Path, source: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Replace `path` with `bytes` atomically.
///
/// Readers see either the old content or the new content, never a partial
/// write. Each call writes through its own uniquely named temp sibling, so
/// concurrent writers in one process never share a temp file. On failure the
/// temp file is removed and `path` is untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| io_error(parent, e))?;
    let written = (|| -> std::io::Result<()> {
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.as_file().sync_all()
    })();
    if let Err(e) = written {
        return Err(io_error(tmp.path(), e));
    }

    // A failed persist hands the temp file back; dropping it removes it.
    tmp.persist(path).map_err(|e| io_error(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn entry_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert_eq!(entry_count(dir.path()), 1);
    }

    #[test]
    fn test_write_atomic_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn test_concurrent_writers_same_target() {
        let dir = TempDir::new().unwrap();
        let path = Arc::new(dir.path().join("doc.json"));

        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let path = Arc::clone(&path);
                thread::spawn(move || {
                    for round in 0..25 {
                        let body = format!("writer {writer} round {round}");
                        write_atomic(&path, body.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = fs::read_to_string(path.as_ref()).unwrap();
        assert!(content.starts_with("writer ") && content.ends_with("round 24"));
        assert_eq!(entry_count(dir.path()), 1);
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        assert!(write_atomic(&path, b"new").is_err());
        assert_eq!(entry_count(dir.path()), 1);
        assert!(path.is_dir());
    }
}
