//! Core library for the heatline live execution visualizer.
//!
//! The crate attaches to a running program through a line/call hook, keeps a
//! bounded per-file history of executed lines alongside lifetime totals, and
//! answers read-only queries: multi-resolution heat tables, highlighted
//! stack traces, and the index of observed files. Presentation (HTTP, HTML,
//! syntax colorization) lives outside this crate behind small trait seams.

mod aggregator;
mod config;
mod event;
mod filter;
mod highlight;
mod ring_buffer;
mod snapshot;
mod stack;
mod state;

use std::sync::{
  Arc,
  atomic::{AtomicU32, AtomicU64, Ordering},
};

pub use {
  aggregator::{HeatRow, heat_rows},
  config::TracerConfig,
  event::{EventKind, ExecEvent, FileId, HookAction},
  filter::{AllFiles, ContainsRegex, FileFilter, MARKER_PATTERN, PathContains},
  highlight::{Marker, line_spans, mark_text, merge_ranges},
  ring_buffer::LineHistory,
  snapshot::{
    FileRow, FileTable, FsReader, SnapshotError, SnapshotService, SourceReader,
    StackEntry,
  },
  stack::{FrameSnapshot, NativeStackProvider, StackProvider},
  state::{FileState, Tracer, TracerBuilder},
};
