use super::*;

/// Identifier for an instrumented source file, normally its canonical
/// absolute path.
pub type FileId = Arc<str>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EventKind {
  /// A new call frame began executing in the file.
  Call,
  /// Execution reached a line in the file.
  Line { lineno: u32 },
}

/// What the host runtime should do with the frame that produced an event.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HookAction {
  /// Stop notifying for this frame and everything beneath it.
  Detach,
  /// Keep delivering nested line and call events for this frame.
  Trace,
}

/// Execution notification delivered by the host runtime.
#[derive(Debug, Clone)]
pub struct ExecEvent {
  pub file: FileId,
  pub kind: EventKind,
}

impl ExecEvent {
  #[must_use]
  pub fn call(file: impl Into<FileId>) -> Self {
    Self {
      file: file.into(),
      kind: EventKind::Call,
    }
  }

  #[must_use]
  pub fn line(file: impl Into<FileId>, lineno: u32) -> Self {
    Self {
      file: file.into(),
      kind: EventKind::Line { lineno },
    }
  }
}
