//! Sidecar index path derivation.

use std::path::{Path, PathBuf};

pub const INDEX_FILE_EXTENSION: &str = "vci";
pub const VECTOR_FILE_EXTENSION: &str = "vec";

/// Derives the sidecar index path for a vector file: a `.vec` extension is
/// replaced by `.vci`, any other name gets `.vci` appended.
pub fn index_file_name(vector_file: &Path) -> PathBuf {
  if vector_file
    .extension()
    .is_some_and(|ext| ext == VECTOR_FILE_EXTENSION)
  {
    vector_file.with_extension(INDEX_FILE_EXTENSION)
  } else {
    let mut name = vector_file.as_os_str().to_os_string();
    name.push(".");
    name.push(INDEX_FILE_EXTENSION);
    PathBuf::from(name)
  }
}
