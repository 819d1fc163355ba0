use std::{fmt, sync::Arc};

use crate::filter::{ContainsRegex, FileFilter};

/// Controls how the tracer records events and presents snapshots.
#[derive(Clone)]
pub struct TracerConfig {
  /// Marker string spliced in where an executing range closes.
  pub close_marker: String,
  /// Substring of the instrumentation entry point's file identifier, used to
  /// drop the entry point from stack traces.
  pub entry_file_marker: Option<String>,
  /// Qualified-name suffix of the instrumentation entry point.
  pub entry_name_suffix: Option<String>,
  /// Predicate deciding which files are instrumented. Evaluated once per
  /// distinct file identifier; the verdict is memoized for the process
  /// lifetime.
  pub filter: Arc<dyn FileFilter>,
  /// Capacity exponent: each file keeps its last `2^history_levels` executed
  /// lines.
  pub history_levels: u32,
  /// Marker string spliced in where an executing range opens.
  pub open_marker: String,
  /// Files always instrumented regardless of the predicate.
  pub pinned_files: Vec<String>,
  /// Whether the tracer records events immediately once constructed.
  pub start_enabled: bool,
  /// Identity of the observed thread, recorded for host glue that walks a
  /// specific thread's stack.
  pub thread_ident: Option<u64>,
}

impl Default for TracerConfig {
  fn default() -> Self {
    Self {
      close_marker: "</b>".to_string(),
      entry_file_marker: None,
      entry_name_suffix: None,
      filter: Arc::new(ContainsRegex::marker()),
      history_levels: 10,
      open_marker: "<b>".to_string(),
      pinned_files: Vec::new(),
      start_enabled: true,
      thread_ident: None,
    }
  }
}

impl fmt::Debug for TracerConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TracerConfig")
      .field("close_marker", &self.close_marker)
      .field("entry_file_marker", &self.entry_file_marker)
      .field("entry_name_suffix", &self.entry_name_suffix)
      .field("filter", &"dyn FileFilter")
      .field("history_levels", &self.history_levels)
      .field("open_marker", &self.open_marker)
      .field("pinned_files", &self.pinned_files)
      .field("start_enabled", &self.start_enabled)
      .field("thread_ident", &self.thread_ident)
      .finish()
  }
}

impl TracerConfig {
  /// Explicitly disable eager tracer start-up.
  #[must_use]
  pub fn disabled(mut self) -> Self {
    self.start_enabled = false;
    self
  }

  /// Builder-style helper to swap the inclusion predicate.
  #[must_use]
  pub fn with_filter(mut self, filter: impl FileFilter + 'static) -> Self {
    self.filter = Arc::new(filter);
    self
  }

  /// Builder-style helper to adjust the history capacity exponent.
  #[must_use]
  pub fn with_history_levels(mut self, levels: u32) -> Self {
    self.history_levels = levels;
    self
  }
}
