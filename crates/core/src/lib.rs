//! Shared domain model for the simvex result-file toolkit: the vector-file
//! index model, fixed-point simulation times, the error taxonomy and the
//! progress-monitor collaborator.

mod error;
mod model;
mod progress;
mod simtime;

pub use error::{FormatError, FormatErrorKind, ResourceError, SemanticError, SimvexError};
pub use model::{
  AttrList, Block, DEFAULT_COLUMNS, FileFingerprint, IndexSummary, RUN_ATTRIBUTES, Run, Sample, VectorFileIndex,
  VectorInfo,
};
pub use progress::{NoopMonitor, ProgressMonitor, RecordingMonitor};
pub use simtime::{SimTime, SimTimeParseError};
