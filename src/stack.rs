use std::sync::Arc;

use backtrace::{Frame, SymbolName};

/// One frame of the observed thread's call stack.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
  pub file: Arc<str>,
  pub lineno: u32,
  pub qualname: Arc<str>,
  /// Byte range of the executing expression within the file's text, when the
  /// host can resolve it. Frames without a range fall back to whole-line
  /// highlighting.
  pub range: Option<(usize, usize)>,
}

impl FrameSnapshot {
  #[must_use]
  pub fn new(
    file: impl Into<Arc<str>>,
    lineno: u32,
    qualname: impl Into<Arc<str>>,
  ) -> Self {
    Self {
      file: file.into(),
      lineno,
      qualname: qualname.into(),
      range: None,
    }
  }

  #[must_use]
  pub fn range(mut self, start: usize, end: usize) -> Self {
    self.range = Some((start, end));
    self
  }
}

/// Produces call-stack snapshots for the observed thread.
///
/// The thread or task identity is captured by the provider when it is
/// constructed; the core never reaches into global frame state.
pub trait StackProvider: Send + Sync {
  /// Current stack, innermost frame first.
  fn stack(&self) -> Vec<FrameSnapshot>;
}

impl<F> StackProvider for F
where
  F: Fn() -> Vec<FrameSnapshot> + Send + Sync,
{
  fn stack(&self) -> Vec<FrameSnapshot> {
    self()
  }
}

/// Stack provider for Rust hosts, backed by the `backtrace` crate.
///
/// Symbolized native frames carry no expression range.
#[derive(Debug, Clone, Copy)]
pub struct NativeStackProvider {
  max_depth: usize,
  skip_frames: usize,
}

impl Default for NativeStackProvider {
  fn default() -> Self {
    Self {
      max_depth: 64,
      skip_frames: 0,
    }
  }
}

impl NativeStackProvider {
  #[must_use]
  pub fn new(max_depth: usize, skip_frames: usize) -> Self {
    Self {
      max_depth: max_depth.max(1),
      skip_frames,
    }
  }
}

impl StackProvider for NativeStackProvider {
  fn stack(&self) -> Vec<FrameSnapshot> {
    let mut frames = Vec::with_capacity(self.max_depth);
    let mut remaining_skip = self.skip_frames;

    backtrace::trace(|frame| {
      if remaining_skip > 0 {
        remaining_skip -= 1;
        return true;
      }

      if frames.len() >= self.max_depth {
        return false;
      }

      frames.push(symbolize(frame));
      true
    });

    frames
  }
}

fn symbolize(frame: &Frame) -> FrameSnapshot {
  let mut file = None;
  let mut lineno = None;
  let mut qualname = None;

  backtrace::resolve_frame(frame, |symbol| {
    if file.is_none() {
      file = symbol
        .filename()
        .and_then(|path| path.to_str())
        .map(str::to_string);
    }

    if qualname.is_none() {
      qualname = symbol.name().map(|name| symbol_name_to_string(&name));
    }

    if lineno.is_none() {
      lineno = symbol.lineno();
    }
  });

  FrameSnapshot::new(
    file.unwrap_or_else(|| "<native>".to_string()),
    lineno.unwrap_or(0),
    qualname.unwrap_or_else(|| "<unknown>".to_string()),
  )
}

fn symbol_name_to_string(name: &SymbolName<'_>) -> String {
  format!("{name}")
}
