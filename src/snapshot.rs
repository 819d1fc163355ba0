use std::{
  fmt::{self, Display, Formatter},
  fs, io,
  io::Write,
  sync::Arc,
};

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::aggregator::{self, HeatRow};
use crate::event::FileId;
use crate::highlight;
use crate::stack::{FrameSnapshot, StackProvider};
use crate::state::{FileState, Tracer};

/// Errors that can occur when building or exporting snapshots.
#[derive(Debug)]
pub enum SnapshotError {
  Io(io::Error),
  Json(serde_json::Error),
}

impl Display for SnapshotError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(err) => write!(f, "i/o error during snapshot: {err}"),
      Self::Json(err) => write!(f, "failed to encode snapshot as json: {err}"),
    }
  }
}

impl std::error::Error for SnapshotError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Io(err) => Some(err),
      Self::Json(err) => Some(err),
    }
  }
}

impl From<io::Error> for SnapshotError {
  fn from(value: io::Error) -> Self {
    Self::Io(value)
  }
}

impl From<serde_json::Error> for SnapshotError {
  fn from(value: serde_json::Error) -> Self {
    Self::Json(value)
  }
}

/// Reads the observed program's source text by file identifier.
pub trait SourceReader: Send + Sync {
  /// # Errors
  ///
  /// Returns an error if the file cannot be read as text.
  fn read(&self, file: &str) -> io::Result<String>;
}

/// Default reader backed by the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl SourceReader for FsReader {
  fn read(&self, file: &str) -> io::Result<String> {
    fs::read_to_string(file)
  }
}

type ColorizeFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// One row of a file's heat table.
#[derive(Debug, Clone)]
pub struct FileRow {
  /// Per-level intensities in `[0, 100]`, largest window first.
  pub intensities: Vec<u8>,
  /// 1-based line number.
  pub line: u32,
  /// Colorized line text with executing-range markers merged in.
  pub text: String,
  /// Lifetime execution count; `None` renders blank.
  pub total: Option<u64>,
}

impl Serialize for FileRow {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let mut state = serializer.serialize_struct("FileRow", 4)?;
    state.serialize_field("line", &self.line)?;
    state.serialize_field("total", &self.total)?;
    state.serialize_field("intensities", &self.intensities)?;
    state.serialize_field("text", &self.text)?;
    state.end()
  }
}

/// Heat table for one file: a row per source line.
#[derive(Debug, Clone)]
pub struct FileTable {
  pub file: FileId,
  pub rows: Vec<FileRow>,
}

impl Serialize for FileTable {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let mut state = serializer.serialize_struct("FileTable", 2)?;
    state.serialize_field("file", self.file.as_ref())?;
    state.serialize_field("rows", &self.rows)?;
    state.end()
  }
}

impl FileTable {
  /// Serialize the table to JSON using the provided writer.
  ///
  /// # Errors
  ///
  /// Returns an error if serialization to JSON fails.
  pub fn export_json<W: Write>(&self, writer: W) -> Result<(), SnapshotError> {
    serde_json::to_writer(writer, self)?;
    Ok(())
  }
}

/// One frame of a stack-trace snapshot.
#[derive(Debug, Clone)]
pub struct StackEntry {
  pub file: FileId,
  /// Whether the file passes the tracer's inclusion filter.
  pub included: bool,
  pub lineno: u32,
  pub qualname: Arc<str>,
  /// The frame's source line with its executing range marked, colorized.
  pub snippet: String,
}

impl Serialize for StackEntry {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let mut state = serializer.serialize_struct("StackEntry", 5)?;
    state.serialize_field("file", self.file.as_ref())?;
    state.serialize_field("lineno", &self.lineno)?;
    state.serialize_field("qualname", self.qualname.as_ref())?;
    state.serialize_field("snippet", &self.snippet)?;
    state.serialize_field("included", &self.included)?;
    state.end()
  }
}

/// Read-only query surface over a tracer's recorded state.
///
/// Queries are pure functions of the state they observe and are safe to call
/// repeatedly and concurrently with the collector; nothing is cached across
/// calls because the history mutates continuously.
pub struct SnapshotService {
  colorize: ColorizeFn,
  reader: Box<dyn SourceReader>,
  stacks: Box<dyn StackProvider>,
  tracer: Tracer,
}

impl SnapshotService {
  /// Ranges of stack frames currently positioned inside `file`.
  fn executing_ranges(&self, file: &str) -> Vec<(usize, usize)> {
    self
      .stacks
      .stack()
      .into_iter()
      .filter(|frame| frame.file.as_ref() == file)
      .filter_map(|frame| frame.range)
      .collect()
  }

  /// Per-line heat table for a file.
  ///
  /// A file with no recorded history yields an all-zero table rather than an
  /// error.
  ///
  /// # Errors
  ///
  /// Returns an error if the file's source text cannot be read.
  pub fn file_table(&self, file: &str) -> Result<FileTable, SnapshotError> {
    let text = self.reader.read(file)?;
    let levels = self.tracer.config().history_levels;

    let ranges = self.executing_ranges(file);
    let config = self.tracer.config();
    let marked = highlight::mark_text(
      &text,
      &ranges,
      &config.open_marker,
      &config.close_marker,
    );

    let line_count = marked.lines().count();
    let heat = match self.tracer.file_state(file) {
      Some(state) => aggregator::heat_rows(&state, line_count, levels),
      None => aggregator::heat_rows(&FileState::new(0), line_count, levels),
    };

    let rows = marked
      .lines()
      .zip(heat)
      .map(|(line, heat_row): (&str, HeatRow)| FileRow {
        intensities: heat_row.intensities,
        line: heat_row.line,
        text: (self.colorize)(line),
        total: heat_row.total,
      })
      .collect();

    Ok(FileTable {
      file: Arc::from(file),
      rows,
    })
  }

  /// The frame's source line, with its executing range marked when the range
  /// resolves. Falls back to the plain line, or to an empty snippet when the
  /// file cannot be read.
  fn frame_snippet(&self, frame: &FrameSnapshot) -> String {
    let Ok(text) = self.reader.read(&frame.file) else {
      return String::new();
    };

    let line_index = frame.lineno.saturating_sub(1) as usize;
    let Some(line) = text.split('\n').nth(line_index) else {
      return String::new();
    };

    let spans = frame
      .range
      .map(|range| highlight::line_spans(&text, &[range]))
      .and_then(|all| all.get(line_index).cloned())
      .unwrap_or_default();

    let config = self.tracer.config();
    let marked = highlight::mark_text(
      line,
      &spans,
      &config.open_marker,
      &config.close_marker,
    );

    (self.colorize)(&marked)
  }

  fn is_entry_frame(&self, frame: &FrameSnapshot) -> bool {
    let config = self.tracer.config();

    let file_hit = config
      .entry_file_marker
      .as_deref()
      .is_some_and(|marker| frame.file.contains(marker));
    let name_hit = config
      .entry_name_suffix
      .as_deref()
      .is_some_and(|suffix| frame.qualname.ends_with(suffix));

    file_hit && name_hit
  }

  /// File identifiers with recorded history, sorted for index listings.
  #[must_use]
  pub fn known_files(&self) -> Vec<FileId> {
    self.tracer.known_files()
  }

  #[must_use]
  pub fn new(tracer: Tracer, stacks: impl StackProvider + 'static) -> Self {
    Self {
      colorize: Box::new(str::to_string),
      reader: Box::new(FsReader),
      stacks: Box::new(stacks),
      tracer,
    }
  }

  /// Stack of the observed thread, innermost frame first, with highlighted
  /// snippets. Frames recognized as the instrumentation entry point are
  /// excluded; a stack with no included frames still yields a well-formed
  /// (possibly empty) response.
  #[must_use]
  pub fn stack_trace(&self) -> Vec<StackEntry> {
    self
      .stacks
      .stack()
      .into_iter()
      .filter(|frame| !self.is_entry_frame(frame))
      .map(|frame| StackEntry {
        included: self.tracer.included(&frame.file),
        lineno: frame.lineno,
        qualname: Arc::clone(&frame.qualname),
        snippet: self.frame_snippet(&frame),
        file: frame.file,
      })
      .collect()
  }

  #[must_use]
  pub fn with_colorize(
    mut self,
    colorize: impl Fn(&str) -> String + Send + Sync + 'static,
  ) -> Self {
    self.colorize = Box::new(colorize);
    self
  }

  #[must_use]
  pub fn with_reader(mut self, reader: impl SourceReader + 'static) -> Self {
    self.reader = Box::new(reader);
    self
  }
}
