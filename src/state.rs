use std::{
  panic::{self, AssertUnwindSafe},
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use dashmap::DashMap;
use nohash_hasher::BuildNoHashHasher;

use crate::config::TracerConfig;
use crate::event::{EventKind, ExecEvent, FileId, HookAction};
use crate::ring_buffer::LineHistory;

/// Thin builder that customizes `TracerConfig` without exposing all knobs up
/// front.
#[derive(Debug, Default)]
pub struct TracerBuilder {
  config: TracerConfig,
}

impl TracerBuilder {
  /// Mark the instrumentation entry point so stack traces can drop it.
  #[must_use]
  pub fn entry_point(
    mut self,
    file_marker: impl Into<String>,
    name_suffix: impl Into<String>,
  ) -> Self {
    self.config.entry_file_marker = Some(file_marker.into());
    self.config.entry_name_suffix = Some(name_suffix.into());
    self
  }

  #[must_use]
  pub fn filter(mut self, filter: impl crate::FileFilter + 'static) -> Self {
    self.config = self.config.with_filter(filter);
    self
  }

  #[must_use]
  pub fn finish(self) -> Tracer {
    Tracer::with_config(self.config)
  }

  #[must_use]
  pub fn history_levels(mut self, levels: u32) -> Self {
    self.config.history_levels = levels;
    self
  }

  #[must_use]
  pub fn new() -> Self {
    Self {
      config: TracerConfig::default(),
    }
  }

  /// Always instrument `file`, bypassing the inclusion predicate.
  #[must_use]
  pub fn pin_file(mut self, file: impl Into<String>) -> Self {
    self.config.pinned_files.push(file.into());
    self
  }

  #[must_use]
  pub fn start_enabled(mut self, enabled: bool) -> Self {
    self.config.start_enabled = enabled;
    self
  }

  #[must_use]
  pub fn thread_ident(mut self, ident: u64) -> Self {
    self.config.thread_ident = Some(ident);
    self
  }

  #[must_use]
  pub fn with_config(mut self, config: TracerConfig) -> Self {
    self.config = config;
    self
  }
}

/// Recorded execution state for a single instrumented file.
///
/// The history window slides; totals only ever grow. A total is therefore
/// always at least the number of matching entries still in the window.
#[derive(Debug)]
pub struct FileState {
  history: LineHistory,
  totals: DashMap<u32, u64, BuildNoHashHasher<u32>>,
}

impl FileState {
  #[must_use]
  pub fn history(&self) -> &LineHistory {
    &self.history
  }

  pub(crate) fn new(levels: u32) -> Self {
    Self {
      history: LineHistory::new(levels),
      totals: DashMap::with_hasher(BuildNoHashHasher::default()),
    }
  }

  pub(crate) fn record_line(&self, lineno: u32) {
    self.history.push(lineno);
    *self.totals.entry(lineno).or_insert(0) += 1;
  }

  /// Lifetime execution count for a line, zero when never executed.
  #[must_use]
  pub fn total(&self, lineno: u32) -> u64 {
    self.totals.get(&lineno).map_or(0, |count| *count)
  }
}

#[derive(Debug)]
struct TracerInner {
  config: TracerConfig,
  enabled: AtomicBool,
  files: DashMap<FileId, Arc<FileState>>,
  included: DashMap<FileId, bool>,
}

/// Entry point for recording execution events and reading per-file state.
///
/// The hook methods run inline on the instrumented thread and never block,
/// panic outward, or allocate proportionally to history length. Queries read
/// the same state without coordination; the resulting races only ever
/// undercount the very latest event.
#[derive(Clone, Debug)]
pub struct Tracer {
  inner: Arc<TracerInner>,
}

impl Tracer {
  #[must_use]
  pub fn builder() -> TracerBuilder {
    TracerBuilder::new()
  }

  #[must_use]
  pub fn config(&self) -> &TracerConfig {
    &self.inner.config
  }

  /// Stop recording events. The Rust rendition of deregistering the hook:
  /// in-flight queries keep reading the last observed state.
  pub fn disable(&self) {
    self.inner.enabled.store(false, Ordering::Release);
  }

  pub fn enable(&self) {
    self.inner.enabled.store(true, Ordering::Release);
  }

  #[must_use]
  pub fn enabled(&self) -> bool {
    self.inner.enabled.load(Ordering::Acquire)
  }

  fn evaluate_filter(&self, file: &str) -> bool {
    if self.inner.config.pinned_files.iter().any(|pinned| pinned == file) {
      return true;
    }

    let filter = Arc::clone(&self.inner.config.filter);

    // A panicking predicate must not take the instrumented program down.
    match panic::catch_unwind(AssertUnwindSafe(|| filter.include(file))) {
      Ok(verdict) => verdict,
      Err(_) => {
        log::debug!("inclusion filter panicked on {file}; excluding");
        false
      }
    }
  }

  /// Read-only access to a file's recorded state.
  #[must_use]
  pub fn file_state(&self, file: &str) -> Option<Arc<FileState>> {
    self.inner.files.get(file).map(|state| Arc::clone(&state))
  }

  /// Memoized inclusion verdict for a file.
  #[must_use]
  pub fn included(&self, file: &str) -> bool {
    if let Some(cached) = self.inner.included.get(file) {
      return *cached;
    }

    let verdict = self.evaluate_filter(file);
    self.inner.included.insert(Arc::from(file), verdict);
    verdict
  }

  /// File identifiers with recorded history, sorted.
  #[must_use]
  pub fn known_files(&self) -> Vec<FileId> {
    let mut files: Vec<FileId> = self
      .inner
      .files
      .iter()
      .map(|entry| Arc::clone(entry.key()))
      .collect();

    files.sort();
    files
  }

  #[must_use]
  pub fn new() -> Self {
    Self::with_config(TracerConfig::default())
  }

  /// Call-event hook. Excluded files detach the host from the whole subtree.
  pub fn on_call(&self, file: &str) -> HookAction {
    if !self.enabled() || !self.included(file) {
      return HookAction::Detach;
    }

    HookAction::Trace
  }

  /// Line-event hook: append to the file's history and bump its total.
  pub fn on_line(&self, file: &str, lineno: u32) {
    if !self.enabled() || !self.included(file) {
      return;
    }

    if let Some(state) = self.inner.files.get(file) {
      state.record_line(lineno);
      return;
    }

    // First event for this file; the only allocating path.
    let levels = self.inner.config.history_levels;
    let state = Arc::clone(
      &self
        .inner
        .files
        .entry(Arc::from(file))
        .or_insert_with(|| Arc::new(FileState::new(levels))),
    );

    state.record_line(lineno);
  }

  /// Feed a pre-built event through the hook.
  pub fn record_event(&self, event: &ExecEvent) -> HookAction {
    match event.kind {
      EventKind::Call => self.on_call(&event.file),
      EventKind::Line { lineno } => {
        self.on_line(&event.file, lineno);
        HookAction::Trace
      }
    }
  }

  #[must_use]
  pub fn with_config(config: TracerConfig) -> Self {
    let enabled = AtomicBool::new(config.start_enabled);
    let inner = TracerInner {
      config,
      enabled,
      files: DashMap::new(),
      included: DashMap::new(),
    };

    Self {
      inner: Arc::new(inner),
    }
  }
}

impl Default for Tracer {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::filter::AllFiles;
  use std::sync::atomic::AtomicUsize;

  fn traced(filter: impl crate::FileFilter + 'static) -> Tracer {
    Tracer::builder().filter(filter).history_levels(2).finish()
  }

  #[test]
  fn records_lines_for_included_files() {
    let tracer = traced(AllFiles);

    assert_eq!(tracer.on_call("a.rs"), HookAction::Trace);
    tracer.on_line("a.rs", 3);
    tracer.on_line("a.rs", 3);
    tracer.on_line("a.rs", 4);

    let state = tracer.file_state("a.rs").expect("missing file state");
    assert_eq!(state.total(3), 2);
    assert_eq!(state.total(4), 1);
    assert_eq!(state.history().recent(), vec![3, 3, 4]);
  }

  #[test]
  fn excluded_files_never_reach_state() {
    let tracer = traced(|_: &str| false);

    assert_eq!(tracer.on_call("a.rs"), HookAction::Detach);
    tracer.on_line("a.rs", 3);

    assert!(tracer.file_state("a.rs").is_none());
    assert!(tracer.known_files().is_empty());
  }

  #[test]
  fn disabled_tracer_drops_events() {
    let tracer = Tracer::builder()
      .filter(AllFiles)
      .start_enabled(false)
      .finish();

    assert_eq!(tracer.on_call("a.rs"), HookAction::Detach);
    tracer.on_line("a.rs", 1);

    assert!(tracer.file_state("a.rs").is_none());

    tracer.enable();
    tracer.on_line("a.rs", 1);

    assert!(tracer.file_state("a.rs").is_some());
  }

  #[test]
  fn totals_survive_history_eviction() {
    // levels = 1 gives capacity 2.
    let tracer = Tracer::builder().filter(AllFiles).history_levels(1).finish();

    tracer.on_line("a.rs", 10);
    tracer.on_line("a.rs", 10);
    tracer.on_line("a.rs", 20);

    let state = tracer.file_state("a.rs").expect("missing file state");
    assert_eq!(state.history().recent(), vec![10, 20]);
    assert_eq!(state.total(10), 2);
    assert_eq!(state.total(20), 1);
  }

  #[test]
  fn filter_verdicts_are_memoized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let tracer = traced(move |_: &str| {
      counted.fetch_add(1, Ordering::SeqCst);
      true
    });

    for _ in 0..5 {
      tracer.on_line("a.rs", 1);
    }
    let _ = tracer.on_call("a.rs");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn panicking_filter_excludes_file() {
    let tracer = traced(|_: &str| -> bool { panic!("boom") });

    assert_eq!(tracer.on_call("a.rs"), HookAction::Detach);
    tracer.on_line("a.rs", 1);

    assert!(tracer.file_state("a.rs").is_none());
  }

  #[test]
  fn pinned_files_bypass_the_filter() {
    let tracer = Tracer::builder()
      .filter(|_: &str| false)
      .pin_file("entry.rs")
      .finish();

    tracer.on_line("entry.rs", 1);
    tracer.on_line("other.rs", 1);

    assert!(tracer.file_state("entry.rs").is_some());
    assert!(tracer.file_state("other.rs").is_none());
  }

  #[test]
  fn record_event_routes_by_kind() {
    let tracer = traced(AllFiles);

    let call = ExecEvent::call("a.rs");
    assert_eq!(tracer.record_event(&call), HookAction::Trace);

    let line = ExecEvent::line("a.rs", 7);
    let _ = tracer.record_event(&line);

    let state = tracer.file_state("a.rs").expect("missing file state");
    assert_eq!(state.total(7), 1);
  }
}
