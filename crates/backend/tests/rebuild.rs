//! End-to-end rebuild scenarios.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use simvex::{
  IndexOutcome, NoopMonitor, RebuildOutcome, RecordingMonitor, SimvexError, VectorFileIndex, VectorFileIndexer,
  VectorFileLoader, VectorFileRebuilder, index_file_name, is_index_up_to_date,
};
use simvex_core::SemanticError;

fn write_vec_file(dir: &tempfile::TempDir, lines: &[&str]) -> PathBuf {
  let path = dir.path().join("run0.vec");
  let mut content = lines.join("\n");
  content.push('\n');
  std::fs::write(&path, content).unwrap();
  path
}

fn reindex(path: &Path) -> VectorFileIndex {
  VectorFileIndexer::default()
    .index_file(path, &mut NoopMonitor)
    .unwrap()
    .completed()
    .unwrap()
}

fn leftover_files(dir: &tempfile::TempDir) -> Vec<String> {
  let mut names: Vec<String> = std::fs::read_dir(dir.path())
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  names.sort();
  names
}

const INTERLEAVED: &[&str] = &[
  "version 2",
  "run run-0",
  "attr configname General",
  "param **.gen.count 100",
  "vector 3 net.a latency TV",
  "attr unit s",
  "vector 4 net.b rate TV",
  "3 0.0 1.0",
  "4 0.5 10.0",
  "3 1.0 2.0",
  "4 1.5 20.0",
  "3 2.0 4.0",
];

#[test]
fn test_rebuild_groups_interleaved_vectors() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_vec_file(&dir, INTERLEAVED);
  let before = reindex(&path);
  assert_eq!(before.vector_by_id(3).unwrap().blocks.len(), 3);

  let outcome = VectorFileRebuilder::default()
    .rebuild_vector_file(&path, &mut NoopMonitor)
    .unwrap();
  assert_eq!(outcome, RebuildOutcome::Completed);

  // sidecar written and fresh for the rebuilt file
  let sidecar = index_file_name(&path);
  assert!(is_index_up_to_date(&sidecar, &path));

  let after = reindex(&path);
  for vector_id in [3, 4] {
    let old = before.vector_by_id(vector_id).unwrap();
    let new = after.vector_by_id(vector_id).unwrap();
    // samples are now contiguous: one block per vector at this block size
    assert_eq!(new.blocks.len(), 1);
    assert_eq!(new.sample_count(), old.sample_count());
    let old_sum: f64 = old.blocks.iter().map(|b| b.sum).sum();
    let new_sum: f64 = new.blocks.iter().map(|b| b.sum).sum();
    assert_eq!(new_sum, old_sum);
  }

  // run metadata and vector attributes survived the rewrite
  assert_eq!(after.run.run_name, "run-0");
  assert_eq!(after.run.attributes.get("configname"), Some("General"));
  assert_eq!(after.run.module_params.get("**.gen.count"), Some("100"));
  assert_eq!(after.vector_by_id(3).unwrap().attributes.get("unit"), Some("s"));

  // no temp files left behind
  assert_eq!(leftover_files(&dir), vec!["run0.vci".to_string(), "run0.vec".to_string()]);
}

#[test]
fn test_rebuild_is_a_fixed_point() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_vec_file(&dir, INTERLEAVED);
  let rebuilder = VectorFileRebuilder::default();
  rebuilder.rebuild_vector_file(&path, &mut NoopMonitor).unwrap();
  let first = std::fs::read(&path).unwrap();
  let first_index = reindex(&path);

  rebuilder.rebuild_vector_file(&path, &mut NoopMonitor).unwrap();
  let second = std::fs::read(&path).unwrap();
  let second_index = reindex(&path);

  assert_eq!(first, second, "rebuilding a rebuilt file must not change it");
  assert_eq!(first_index.vectors(), second_index.vectors());
}

#[test]
fn test_rebuild_drops_junk_lines() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_vec_file(&dir, &[
    "run run-0",
    "vector 1 m s TV",
    "1 0.0 1.0",
    "garbage that is not a sample",
    "1 1.0 2.0",
  ]);
  assert_eq!(reindex(&path).unrecognised_line_count, 1);

  VectorFileRebuilder::default()
    .rebuild_vector_file(&path, &mut NoopMonitor)
    .unwrap();

  let after = reindex(&path);
  assert_eq!(after.unrecognised_line_count, 0);
  assert_eq!(after.vector_by_id(1).unwrap().sample_count(), 2);
}

#[test]
fn test_rebuild_rejects_multiple_runs() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_vec_file(&dir, &[
    "run run-0",
    "vector 1 m s TV",
    "1 0.0 1.0",
    "run run-1",
  ]);
  let original = std::fs::read(&path).unwrap();

  match VectorFileRebuilder::default().rebuild_vector_file(&path, &mut NoopMonitor) {
    Err(SimvexError::Semantic(SemanticError::MultipleRuns(name))) => {
      assert!(name.contains("run0.vec"));
    }
    other => panic!("expected MultipleRuns, got {other:?}"),
  }

  // source untouched, nothing new on disk
  assert_eq!(std::fs::read(&path).unwrap(), original);
  assert_eq!(leftover_files(&dir), vec!["run0.vec".to_string()]);
}

#[test]
fn test_rebuild_of_vectorless_file_is_a_noop() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_vec_file(&dir, &["run run-0", "attr configname General"]);
  let original = std::fs::read(&path).unwrap();

  let outcome = VectorFileRebuilder::default()
    .rebuild_vector_file(&path, &mut NoopMonitor)
    .unwrap();
  assert_eq!(outcome, RebuildOutcome::NoVectors);
  assert_eq!(std::fs::read(&path).unwrap(), original);
  assert_eq!(leftover_files(&dir), vec!["run0.vec".to_string()]);
}

#[test]
fn test_rebuild_cancellation_cleans_up() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_vec_file(&dir, INTERLEAVED);
  let original = std::fs::read(&path).unwrap();

  let mut monitor = RecordingMonitor::cancelling_after(0);
  let outcome = VectorFileRebuilder::default()
    .rebuild_vector_file(&path, &mut monitor)
    .unwrap();
  assert_eq!(outcome, RebuildOutcome::Cancelled);
  assert_eq!(monitor.done_calls, 1);
  assert_eq!(std::fs::read(&path).unwrap(), original);
  assert_eq!(leftover_files(&dir), vec!["run0.vec".to_string()]);
}

#[test]
fn test_loader_prefers_a_fresh_sidecar() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_vec_file(&dir, INTERLEAVED);
  let scanned = reindex(&path);

  VectorFileIndexer::default()
    .generate_index(&path, &mut NoopMonitor)
    .unwrap();

  // sidecar is fresh; the loader parses it instead of re-scanning
  let loaded = match VectorFileLoader::new().load(&path, &mut NoopMonitor).unwrap() {
    IndexOutcome::Completed(index) => index,
    IndexOutcome::Cancelled => panic!("not cancelled"),
  };
  assert_eq!(loaded, scanned);

  // grow the file; the loader falls back to scanning
  let mut content = std::fs::read(&path).unwrap();
  content.extend_from_slice(b"3 9.0 9.0\n");
  std::fs::write(&path, content).unwrap();
  let reloaded = match VectorFileLoader::new().load(&path, &mut NoopMonitor).unwrap() {
    IndexOutcome::Completed(index) => index,
    IndexOutcome::Cancelled => panic!("not cancelled"),
  };
  assert_eq!(reloaded.vector_by_id(3).unwrap().sample_count(), 4);
}
