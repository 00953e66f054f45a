//! Error taxonomy shared by all simvex crates.
//!
//! Four kinds, matching how operations fail in practice: `Io` for anything
//! the OS refuses, `Format` for malformed result files (always fatal to the
//! running parse), `Semantic` for well-formed input the operation cannot
//! accept, and `Resource` for exhausted local resources.

use std::io;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SimvexError {
  #[error("I/O error on {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: io::Error,
  },
  /// A rebuild commit failed between its two renames: the sidecar index had
  /// already been replaced when the vector file could not be. The vector
  /// file keeps its previous content; the no-longer-matching index is
  /// removed so nothing trusts a mismatched pair.
  #[error(
    "cannot replace {vector_file} after its index was already rewritten; the vector file keeps its previous content and the new index {index_file} was removed: {source}"
  )]
  CommitInterrupted {
    vector_file: String,
    index_file: String,
    #[source]
    source: Box<SimvexError>,
  },
  #[error(transparent)]
  Format(#[from] FormatError),
  #[error(transparent)]
  Semantic(#[from] SemanticError),
  #[error(transparent)]
  Resource(#[from] ResourceError),
}

impl SimvexError {
  pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
    SimvexError::Io {
      path: path.as_ref().display().to_string(),
      source,
    }
  }
}

/// A malformed vector or index file. Carries the file and one-based line
/// number where parsing stopped.
#[derive(Debug, thiserror::Error)]
#[error("{file}:{line}: {kind}")]
pub struct FormatError {
  pub file: String,
  pub line: u64,
  pub kind: FormatErrorKind,
}

impl FormatError {
  pub fn new(file: impl AsRef<Path>, line: u64, kind: FormatErrorKind) -> Self {
    FormatError {
      file: file.as_ref().display().to_string(),
      line,
      kind,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatErrorKind {
  #[error("line is longer than {0} bytes")]
  LineTooLong(usize),
  #[error("line is not valid UTF-8")]
  InvalidUtf8,
  #[error("unterminated quoted string")]
  UnterminatedQuote,
  #[error("more than {0} tokens on one line")]
  TooManyTokens(usize),
  #[error("missing version number")]
  MissingVersion,
  #[error("version is not a number: '{0}'")]
  MalformedVersion(String),
  #[error("unsupported file version {0}, expected 2 or lower")]
  UnsupportedVersion(i32),
  #[error("broken run declaration")]
  BadRunDeclaration,
  #[error("broken module parameter line")]
  BadParam,
  #[error("missing attribute name or value")]
  BadAttribute,
  #[error("broken vector declaration")]
  BadVectorDeclaration,
  #[error("malformed vector id '{0}'")]
  MalformedVectorId(String),
  #[error("duplicate declaration of vector {0}")]
  DuplicateVectorDecl(i32),
  #[error("missing vector declaration for vector {0}")]
  MissingVectorDecl(i32),
  #[error("data line too short")]
  TruncatedData,
  #[error("malformed simulation time '{0}'")]
  MalformedSimtime(String),
  #[error("malformed data value '{0}'")]
  MalformedValue(String),
  #[error("malformed event number '{0}'")]
  MalformedEventNumber(String),
  #[error("broken block entry")]
  BadBlock,
  #[error("index file inconsistency: {0}")]
  InconsistentIndex(String),
  #[error("unexpected directive '{0}' in index file")]
  UnknownIndexDirective(String),
}

/// Well-formed input the requested operation cannot work with, or a
/// mis-assembled dataflow graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemanticError {
  #[error("multiple runs found in {0}")]
  MultipleRuns(String),
  #[error("{filter}: invalid subfilter index {index}")]
  InvalidSubfilterIndex { filter: String, index: usize },
  #[error("unknown node type '{0}'")]
  UnknownNodeType(String),
  #[error("node type '{node_type}': missing attribute '{attr}'")]
  MissingNodeAttribute { node_type: String, attr: String },
  #[error("node type '{node_type}': invalid value '{value}' for attribute '{attr}'")]
  BadNodeAttribute {
    node_type: String,
    attr: String,
    value: String,
  },
  #[error("{filter}: subfilter type '{node_type}' is not a filter")]
  SubfilterNotAFilter { filter: String, node_type: String },
  #[error("node has no port named '{0}'")]
  PortNotFound(String),
  #[error("port '{0}' is already connected")]
  PortAlreadyConnected(String),
  #[error("cannot connect port '{from}' to port '{to}'")]
  InvalidConnection { from: String, to: String },
  #[error("writer node: run metadata was not set before execution")]
  RunNotSet,
  #[error("dataflow graph stalled with {0} unfinished node(s)")]
  Deadlock(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
  #[error("cannot allocate a temp file name next to {0}")]
  TempNameExhausted(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_error_carries_location() {
    let err = FormatError::new("results/run0.vec", 17, FormatErrorKind::TruncatedData);
    assert_eq!(err.to_string(), "results/run0.vec:17: data line too short");
  }

  #[test]
  fn test_io_error_names_path() {
    let err = SimvexError::io("a.vec", io::Error::new(io::ErrorKind::NotFound, "gone"));
    assert!(err.to_string().contains("a.vec"));
  }

  #[test]
  fn test_commit_interrupted_names_both_files() {
    let err = SimvexError::CommitInterrupted {
      vector_file: "results/run0.vec".into(),
      index_file: "results/run0.vci".into(),
      source: Box::new(SimvexError::io(
        "results/run0.vec",
        io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
      )),
    };
    let message = err.to_string();
    assert!(message.contains("results/run0.vec"));
    assert!(message.contains("results/run0.vci"));
  }
}
