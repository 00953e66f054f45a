//! Crash-safe file replacement.
//!
//! Every persisted output goes through write-temp, fsync, rename. The
//! target path never holds a partially written file; readers either see the
//! old content or the complete new content.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use simvex_core::{ResourceError, SimvexError};
use tracing::trace;

const MAX_TEMP_PROBES: u32 = 1000;

/// Picks `<target>.temp<N>` for the lowest `N` that does not exist yet.
pub fn temp_path_for(target: &Path) -> Result<PathBuf, SimvexError> {
  for n in 0..MAX_TEMP_PROBES {
    let mut name = target.as_os_str().to_os_string();
    name.push(format!(".temp{n}"));
    let candidate = PathBuf::from(name);
    if !candidate.exists() {
      return Ok(candidate);
    }
  }
  Err(ResourceError::TempNameExhausted(target.display().to_string()).into())
}

/// Removes `path`, treating an already-absent file as success.
pub fn remove_if_exists(path: &Path) -> Result<(), SimvexError> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(SimvexError::io(path, e)),
  }
}

/// Moves `temp` over `target`: the target is deleted first (absence is
/// fine), then the temp is renamed into place.
pub fn replace_file(temp: &Path, target: &Path) -> Result<(), SimvexError> {
  remove_if_exists(target)?;
  fs::rename(temp, target).map_err(|e| SimvexError::io(target, e))?;
  trace!(target = %target.display(), "committed file replacement");
  Ok(())
}

/// Runs `write` against a temp sibling of `target`, fsyncs, then renames
/// the temp over the target. The temp file is unlinked on any failure.
pub fn write_atomic<F>(target: &Path, write: F) -> Result<(), SimvexError>
where
  F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
  let temp = temp_path_for(target)?;
  let result = write_and_commit(&temp, target, write);
  if result.is_err() {
    let _ = fs::remove_file(&temp);
  }
  result
}

fn write_and_commit<F>(temp: &Path, target: &Path, write: F) -> Result<(), SimvexError>
where
  F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
  let file = File::create(temp).map_err(|e| SimvexError::io(temp, e))?;
  let mut out = BufWriter::new(file);
  write(&mut out).map_err(|e| SimvexError::io(temp, e))?;
  out.flush().map_err(|e| SimvexError::io(temp, e))?;
  out.get_ref().sync_all().map_err(|e| SimvexError::io(temp, e))?;
  drop(out);
  replace_file(temp, target)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_temp_path_skips_existing() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.vci");
    assert_eq!(temp_path_for(&target).unwrap(), dir.path().join("out.vci.temp0"));
    fs::write(dir.path().join("out.vci.temp0"), b"busy").unwrap();
    fs::write(dir.path().join("out.vci.temp1"), b"busy").unwrap();
    assert_eq!(temp_path_for(&target).unwrap(), dir.path().join("out.vci.temp2"));
  }

  #[test]
  fn test_write_atomic_replaces_existing_target() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.vci");
    fs::write(&target, b"old").unwrap();
    write_atomic(&target, |out| out.write_all(b"new")).unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"new");
    assert!(!dir.path().join("out.vci.temp0").exists());
  }

  #[test]
  fn test_write_atomic_missing_target_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("fresh.vci");
    write_atomic(&target, |out| out.write_all(b"content")).unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"content");
  }

  #[test]
  fn test_write_atomic_cleans_temp_on_writer_error() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.vci");
    fs::write(&target, b"old").unwrap();
    let err = write_atomic(&target, |_| Err(io::Error::other("boom")));
    assert!(err.is_err());
    // target untouched, no temp left behind
    assert_eq!(fs::read(&target).unwrap(), b"old");
    assert!(fs::read_dir(dir.path()).unwrap().count() == 1);
  }

  #[test]
  fn test_remove_if_exists_tolerates_absence() {
    let dir = tempfile::tempdir().unwrap();
    remove_if_exists(&dir.path().join("nope")).unwrap();
  }
}
