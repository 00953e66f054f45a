//! Buffered line reader with byte-offset accounting.
//!
//! Vector files are read strictly forward, one line at a time, through a
//! fixed-capacity buffer. The reader tracks the absolute byte offset of the
//! line it just returned, which is what block bookkeeping is built from.
//! Returned line views borrow the internal buffer and are invalidated by
//! the next call.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use simvex_core::{FormatError, FormatErrorKind, SimvexError};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct ReaderConfig {
  /// Buffer capacity; also the hard cap on a single line's length.
  pub buffer_size: usize,
}

impl Default for ReaderConfig {
  fn default() -> Self {
    ReaderConfig { buffer_size: 64 * 1024 }
  }
}

/// One line of the file plus the offset bookkeeping captured when it was
/// read. Carrying the scalars here lets callers keep them while the
/// borrowed `content` is alive.
#[derive(Debug)]
pub struct LineView<'r> {
  /// Line content, CR/LF excluded.
  pub content: &'r [u8],
  /// Absolute byte offset where this line starts.
  pub start_offset: i64,
  /// One-based line number.
  pub number: i64,
  /// Total bytes consumed up to and including this line's terminator.
  pub bytes_read: i64,
}

#[derive(Debug)]
pub struct FileReader {
  file: File,
  path: PathBuf,
  buf: Box<[u8]>,
  /// Next unconsumed byte within `buf`.
  pos: usize,
  /// Bytes of `buf` holding file content.
  filled: usize,
  /// Absolute file offset of `buf[0]`.
  buf_offset: i64,
  eof: bool,
  file_size: i64,
  line_start_offset: i64,
  line_length: usize,
  num_read_bytes: i64,
  num_read_lines: i64,
}

impl FileReader {
  pub fn open(path: impl AsRef<Path>, config: &ReaderConfig) -> Result<Self, SimvexError> {
    let path = path.as_ref().to_path_buf();
    let file = File::open(&path).map_err(|e| SimvexError::io(&path, e))?;
    let file_size = file
      .metadata()
      .map_err(|e| SimvexError::io(&path, e))?
      .len() as i64;
    trace!(path = %path.display(), file_size, "opened vector file");
    Ok(FileReader {
      file,
      path,
      buf: vec![0u8; config.buffer_size].into_boxed_slice(),
      pos: 0,
      filled: 0,
      buf_offset: 0,
      eof: false,
      file_size,
      line_start_offset: 0,
      line_length: 0,
      num_read_bytes: 0,
      num_read_lines: 0,
    })
  }

  /// Returns the next line without its terminator, or `None` at end of file.
  /// The view is valid until the next call.
  pub fn next_line(&mut self) -> Result<Option<LineView<'_>>, SimvexError> {
    loop {
      if let Some(i) = self.buf[self.pos..self.filled].iter().position(|&b| b == b'\n') {
        let end = self.pos + i;
        return Ok(Some(self.take_line(end, end + 1)));
      }
      if self.eof {
        if self.pos == self.filled {
          return Ok(None);
        }
        // final line without trailing newline
        let end = self.filled;
        return Ok(Some(self.take_line(end, end)));
      }
      if self.pos > 0 {
        self.buf.copy_within(self.pos..self.filled, 0);
        self.buf_offset += self.pos as i64;
        self.filled -= self.pos;
        self.pos = 0;
      }
      if self.filled == self.buf.len() {
        return Err(
          FormatError::new(
            &self.path,
            (self.num_read_lines + 1) as u64,
            FormatErrorKind::LineTooLong(self.buf.len()),
          )
          .into(),
        );
      }
      let n = self
        .file
        .read(&mut self.buf[self.filled..])
        .map_err(|e| SimvexError::io(&self.path, e))?;
      if n == 0 {
        self.eof = true;
      } else {
        self.filled += n;
      }
    }
  }

  fn take_line(&mut self, end: usize, next: usize) -> LineView<'_> {
    let start = self.pos;
    self.line_start_offset = self.buf_offset + start as i64;
    self.num_read_bytes = self.buf_offset + next as i64;
    self.num_read_lines += 1;
    self.pos = next;
    let mut line = &self.buf[start..end];
    if line.ends_with(b"\r") {
      line = &line[..line.len() - 1];
    }
    self.line_length = line.len();
    LineView {
      content: line,
      start_offset: self.line_start_offset,
      number: self.num_read_lines,
      bytes_read: self.num_read_bytes,
    }
  }

  /// Absolute byte offset where the current line starts.
  pub fn current_line_start_offset(&self) -> i64 {
    self.line_start_offset
  }

  /// Content length of the current line, CR/LF excluded.
  pub fn current_line_length(&self) -> usize {
    self.line_length
  }

  /// Bytes consumed so far, terminators included.
  pub fn num_read_bytes(&self) -> i64 {
    self.num_read_bytes
  }

  /// One-based number of the current line.
  pub fn num_read_lines(&self) -> i64 {
    self.num_read_lines
  }

  pub fn file_size(&self) -> i64 {
    self.file_size
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn write_temp(content: &[u8]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lines.vec");
    let mut f = File::create(&path).unwrap();
    f.write_all(content).unwrap();
    (dir, path)
  }

  fn open(path: &Path) -> FileReader {
    FileReader::open(path, &ReaderConfig::default()).unwrap()
  }

  #[test]
  fn test_lines_and_offsets() {
    let (_dir, path) = write_temp(b"first\nsecond line\n\nlast");
    let mut reader = open(&path);
    assert_eq!(reader.file_size(), 23);

    let view = reader.next_line().unwrap().unwrap();
    assert_eq!(view.content, b"first");
    assert_eq!(view.start_offset, 0);
    assert_eq!(view.bytes_read, 6);
    assert_eq!(reader.current_line_length(), 5);

    let view = reader.next_line().unwrap().unwrap();
    assert_eq!(view.content, b"second line");
    assert_eq!(view.start_offset, 6);

    let view = reader.next_line().unwrap().unwrap();
    assert_eq!(view.content, b"");
    assert_eq!(view.start_offset, 18);

    // no trailing newline on the last line
    let view = reader.next_line().unwrap().unwrap();
    assert_eq!(view.content, b"last");
    assert_eq!(view.start_offset, 19);
    assert_eq!(view.number, 4);
    assert_eq!(reader.num_read_bytes(), 23);
    assert_eq!(reader.num_read_lines(), 4);
    assert_eq!(reader.current_line_start_offset(), 19);

    assert!(reader.next_line().unwrap().is_none());
  }

  #[test]
  fn test_crlf_is_stripped_but_counted() {
    let (_dir, path) = write_temp(b"a\r\nb\r\n");
    let mut reader = open(&path);
    let view = reader.next_line().unwrap().unwrap();
    assert_eq!(view.content, b"a");
    assert_eq!(view.bytes_read, 3);
    assert_eq!(reader.current_line_length(), 1);
    let view = reader.next_line().unwrap().unwrap();
    assert_eq!(view.content, b"b");
    assert_eq!(view.bytes_read, 6);
  }

  #[test]
  fn test_lines_spanning_refills() {
    let mut content = Vec::new();
    for i in 0..500 {
      content.extend_from_slice(format!("line-{i:04} padding padding padding\n").as_bytes());
    }
    let (_dir, path) = write_temp(&content);
    let mut reader = FileReader::open(&path, &ReaderConfig { buffer_size: 128 }).unwrap();
    let mut n = 0;
    let mut last_offset = -1;
    while let Some(view) = reader.next_line().unwrap() {
      assert!(view.content.starts_with(b"line-"));
      assert!(view.start_offset > last_offset);
      last_offset = view.start_offset;
      n += 1;
    }
    assert_eq!(n, 500);
    assert_eq!(reader.num_read_bytes(), content.len() as i64);
  }

  #[test]
  fn test_long_line_is_a_format_error() {
    let mut content = vec![b'x'; 300];
    content.push(b'\n');
    let (_dir, path) = write_temp(&content);
    let mut reader = FileReader::open(&path, &ReaderConfig { buffer_size: 128 }).unwrap();
    match reader.next_line() {
      Err(SimvexError::Format(e)) => {
        assert_eq!(e.kind, FormatErrorKind::LineTooLong(128));
        assert_eq!(e.line, 1);
      }
      other => panic!("expected LineTooLong, got {other:?}"),
    }
  }

  #[test]
  fn test_empty_file() {
    let (_dir, path) = write_temp(b"");
    let mut reader = open(&path);
    assert!(reader.next_line().unwrap().is_none());
    assert_eq!(reader.num_read_lines(), 0);
  }

  #[test]
  fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.vec");
    match FileReader::open(&missing, &ReaderConfig::default()) {
      Err(SimvexError::Io { path, .. }) => assert!(path.contains("absent.vec")),
      other => panic!("expected Io error, got {other:?}"),
    }
  }
}
