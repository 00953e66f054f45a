//! Sidecar index parsing.
//!
//! Accepts exactly the schema the writer emits and rebuilds an equal
//! [`VectorFileIndex`]. The sidecar is machine-written, so anything
//! unexpected is a format error rather than something to tolerate.

use std::path::Path;

use simvex_core::{
  Block, FileFingerprint, FormatError, FormatErrorKind, SimvexError, VectorFileIndex,
};
use tracing::debug;
use vecfile::{FileReader, LineTokenizer, ReaderConfig, TokenizerConfig, parse_double, parse_int, parse_int64,
  parse_simtime};

use crate::indexer::MAX_VECTOR_FILE_VERSION;

/// How many leading lines may precede the `file` fingerprint line.
const FINGERPRINT_PROBE_LINES: i64 = 10;

#[derive(Debug, Clone, Default)]
pub struct IndexFileReader {
  pub reader: ReaderConfig,
  pub tokenizer: TokenizerConfig,
}

impl IndexFileReader {
  /// Parses the sidecar at `path` back into an index model.
  pub fn read(&self, path: impl AsRef<Path>) -> Result<VectorFileIndex, SimvexError> {
    let path = path.as_ref();
    let mut reader = FileReader::open(path, &self.reader)?;
    let tokenizer = LineTokenizer::new(self.tokenizer.clone());

    let mut index = VectorFileIndex::default();
    // declared sample totals, cross-checked against the block lists
    let mut declared_counts: Vec<(i32, i64)> = Vec::new();

    while let Some(view) = reader.next_line()? {
      let line_no = view.number as u64;
      let fail = |kind: FormatErrorKind| FormatError::new(path, line_no, kind);
      let line = std::str::from_utf8(view.content).map_err(|_| fail(FormatErrorKind::InvalidUtf8))?;
      let tokens = tokenizer.tokenize(line).map_err(&fail)?;
      if tokens.is_empty() || tokens[0].starts_with('#') {
        continue;
      }

      match tokens[0].as_ref() {
        "version" => {
          let token = tokens.get(1).ok_or_else(|| fail(FormatErrorKind::MissingVersion))?;
          let version =
            parse_int(token).ok_or_else(|| fail(FormatErrorKind::MalformedVersion(token.to_string())))?;
          if version > MAX_VECTOR_FILE_VERSION {
            return Err(fail(FormatErrorKind::UnsupportedVersion(version)).into());
          }
        }
        "file" => {
          let (size, mtime) = match (tokens.get(1), tokens.get(2)) {
            (Some(size), Some(mtime)) => (parse_int64(size), parse_int64(mtime)),
            _ => (None, None),
          };
          match (size, mtime) {
            (Some(file_size), Some(mtime_secs)) => {
              index.fingerprint = FileFingerprint { file_size, mtime_secs };
            }
            _ => return Err(fail(FormatErrorKind::InconsistentIndex("broken file line".into())).into()),
          }
        }
        "vectorfile" => {
          let name = tokens
            .get(1)
            .ok_or_else(|| fail(FormatErrorKind::InconsistentIndex("broken vectorfile line".into())))?;
          index.vector_file_name = name.to_string();
        }
        "run" => {
          if tokens.len() < 2 {
            return Err(fail(FormatErrorKind::BadRunDeclaration).into());
          }
          index.run.run_name = tokens[1].to_string();
          index.run.run_entry_count += 1;
        }
        "attr" => {
          if tokens.len() < 3 {
            return Err(fail(FormatErrorKind::BadAttribute).into());
          }
          match index.last_vector_mut() {
            None => index.run.attributes.set(tokens[1].as_ref(), tokens[2].as_ref()),
            Some(vector) => vector.attributes.set(tokens[1].as_ref(), tokens[2].as_ref()),
          }
        }
        "param" => {
          if tokens.len() < 3 {
            return Err(fail(FormatErrorKind::BadParam).into());
          }
          index.run.module_params.set(tokens[1].as_ref(), tokens[2].as_ref());
        }
        "unrecognised" => {
          let count = tokens.get(1).and_then(|t| parse_int64(t)).ok_or_else(|| {
            fail(FormatErrorKind::InconsistentIndex("broken unrecognised line".into()))
          })?;
          index.unrecognised_line_count = count as u64;
        }
        "vector" => {
          if tokens.len() < 7 {
            return Err(fail(FormatErrorKind::BadVectorDeclaration).into());
          }
          let vector_id = parse_int(&tokens[1])
            .ok_or_else(|| fail(FormatErrorKind::MalformedVectorId(tokens[1].to_string())))?;
          let block_size =
            parse_int64(&tokens[5]).ok_or_else(|| fail(FormatErrorKind::BadVectorDeclaration))?;
          let count = parse_int64(&tokens[6]).ok_or_else(|| fail(FormatErrorKind::BadVectorDeclaration))?;
          let mut vector =
            simvex_core::VectorInfo::new(vector_id, tokens[2].as_ref(), tokens[3].as_ref(), tokens[4].as_ref());
          vector.block_size = block_size;
          if !index.add_vector(vector) {
            return Err(fail(FormatErrorKind::DuplicateVectorDecl(vector_id)).into());
          }
          declared_counts.push((vector_id, count));
        }
        "block" => {
          if tokens.len() != 12 {
            return Err(fail(FormatErrorKind::BadBlock).into());
          }
          let bad = || fail(FormatErrorKind::BadBlock);
          let block = Block {
            start_offset: parse_int64(&tokens[1]).ok_or_else(bad)?,
            size: parse_int64(&tokens[2]).ok_or_else(bad)?,
            count: parse_int64(&tokens[3]).ok_or_else(bad)?,
            first_event_num: parse_int64(&tokens[4]).ok_or_else(bad)?,
            last_event_num: parse_int64(&tokens[5]).ok_or_else(bad)?,
            first_time: parse_simtime(&tokens[6]).ok_or_else(bad)?,
            last_time: parse_simtime(&tokens[7]).ok_or_else(bad)?,
            min: parse_double(&tokens[8]).ok_or_else(bad)?,
            max: parse_double(&tokens[9]).ok_or_else(bad)?,
            sum: parse_double(&tokens[10]).ok_or_else(bad)?,
            sum_sqr: parse_double(&tokens[11]).ok_or_else(bad)?,
          };
          let vector = index
            .last_vector_mut()
            .ok_or_else(|| fail(FormatErrorKind::InconsistentIndex("block before any vector".into())))?;
          // blocks are listed verbatim; block_size was parsed from the
          // declaration, so bypass the recomputing helper
          vector.blocks.push(block);
        }
        other => {
          return Err(fail(FormatErrorKind::UnknownIndexDirective(other.to_string())).into());
        }
      }
    }

    // declarations and vectors were appended in lockstep
    for (vector, (vector_id, declared)) in index.vectors().iter().zip(declared_counts) {
      let actual = vector.sample_count();
      if actual != declared {
        return Err(
          FormatError::new(
            path,
            0,
            FormatErrorKind::InconsistentIndex(format!(
              "vector {vector_id} declares {declared} samples but its blocks hold {actual}"
            )),
          )
          .into(),
        );
      }
    }

    debug!(path = %path.display(), vectors = index.num_vectors(), "parsed sidecar index");
    Ok(index)
  }

  /// Reads just the `file` fingerprint line, for cheap freshness checks.
  pub fn read_fingerprint(&self, path: impl AsRef<Path>) -> Result<FileFingerprint, SimvexError> {
    let path = path.as_ref();
    let mut reader = FileReader::open(path, &self.reader)?;
    let tokenizer = LineTokenizer::new(self.tokenizer.clone());
    while let Some(view) = reader.next_line()? {
      if view.number > FINGERPRINT_PROBE_LINES {
        break;
      }
      let line_no = view.number as u64;
      let Ok(line) = std::str::from_utf8(view.content) else { break };
      let Ok(tokens) = tokenizer.tokenize(line) else { break };
      if tokens.first().is_some_and(|t| t == "file")
        && let (Some(size), Some(mtime)) = (
          tokens.get(1).and_then(|t| parse_int64(t)),
          tokens.get(2).and_then(|t| parse_int64(t)),
        )
      {
        return Ok(FileFingerprint {
          file_size: size,
          mtime_secs: mtime,
        });
      }
    }
    Err(
      FormatError::new(
        path,
        0,
        FormatErrorKind::InconsistentIndex("missing file fingerprint line".into()),
      )
      .into(),
    )
  }
}

/// True when the sidecar at `index_path` matches the current size and mtime
/// of `vector_path`. Any parse or I/O trouble counts as stale.
pub fn is_index_up_to_date(index_path: impl AsRef<Path>, vector_path: impl AsRef<Path>) -> bool {
  let Ok(stored) = IndexFileReader::default().read_fingerprint(index_path) else {
    return false;
  };
  let Ok(actual) = FileFingerprint::of_file(vector_path) else {
    return false;
  };
  stored == actual
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::writer::IndexFileWriter;
  use pretty_assertions::assert_eq;
  use simvex_core::{AttrList, Run, VectorInfo};

  fn sample_index() -> VectorFileIndex {
    let mut index = VectorFileIndex::new("results/run0.vec");
    index.fingerprint = FileFingerprint {
      file_size: 4096,
      mtime_secs: 1_700_000_000,
    };
    index.run = Run {
      run_name: "General-0-20260801".into(),
      attributes: AttrList::from_iter([("configname", "General"), ("datetime", "20260801-12:00:00")]),
      module_params: AttrList::from_iter([("**.gen.sendInterval", "exponential(0.01)")]),
      run_entry_count: 1,
    };

    let mut v3 = VectorInfo::new(3, "net.host[0].app", "end-to-end delay", "TV");
    v3.attributes.set("unit", "s");
    let mut b = Block::starting_at(100);
    b.size = 200;
    b.collect(-1, "0.5".parse().unwrap(), 2.0);
    b.collect(-1, "1.5".parse().unwrap(), 4.0);
    v3.add_block(b);
    let mut b = Block::starting_at(500);
    b.size = 80;
    b.collect(-1, "2".parse().unwrap(), -1.5);
    v3.add_block(b);
    index.add_vector(v3);

    let mut v7 = VectorInfo::new(7, "net.sink", "queue length", "ETV");
    let mut b = Block::starting_at(300);
    b.size = 120;
    b.collect(42, "0.25".parse().unwrap(), 0.125);
    v7.add_block(b);
    index.add_vector(v7);
    index.unrecognised_line_count = 2;
    index
  }

  #[test]
  fn test_round_trip_preserves_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run0.vci");
    let index = sample_index();
    IndexFileWriter::default().write(&index, &path).unwrap();
    let parsed = IndexFileReader::default().read(&path).unwrap();
    assert_eq!(parsed, index);
  }

  #[test]
  fn test_read_fingerprint_without_full_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run0.vci");
    IndexFileWriter::default().write(&sample_index(), &path).unwrap();
    let fp = IndexFileReader::default().read_fingerprint(&path).unwrap();
    assert_eq!(fp, FileFingerprint {
      file_size: 4096,
      mtime_secs: 1_700_000_000,
    });
  }

  #[test]
  fn test_count_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.vci");
    std::fs::write(
      &path,
      "version 2\nfile 10 10\nvectorfile a.vec\nrun r\nvector 1 m s TV 64 5\nblock 0 64 2 -1 -1 0 1 1 2 3 5\n",
    )
    .unwrap();
    match IndexFileReader::default().read(&path) {
      Err(SimvexError::Format(e)) => {
        assert!(matches!(e.kind, FormatErrorKind::InconsistentIndex(_)), "{:?}", e.kind)
      }
      other => panic!("expected InconsistentIndex, got {other:?}"),
    }
  }

  #[test]
  fn test_unknown_directive_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.vci");
    std::fs::write(&path, "version 2\nfile 10 10\nscalar 1 2\n").unwrap();
    match IndexFileReader::default().read(&path) {
      Err(SimvexError::Format(e)) => {
        assert_eq!(e.kind, FormatErrorKind::UnknownIndexDirective("scalar".into()))
      }
      other => panic!("expected UnknownIndexDirective, got {other:?}"),
    }
  }

  #[test]
  fn test_missing_fingerprint_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bare.vci");
    std::fs::write(&path, "version 2\n").unwrap();
    assert!(IndexFileReader::default().read_fingerprint(&path).is_err());
    assert!(!is_index_up_to_date(&path, &path));
  }
}
