use std::fs;

use regex::Regex;

/// Opt-in marker comment that the default filter looks for in source files.
pub const MARKER_PATTERN: &str = r"#\s*heatline";

/// Decides whether a source file is eligible for instrumentation.
///
/// Implementations must treat any internal failure as "exclude": a filter
/// runs inside the tracing hook, where an error would otherwise abort the
/// instrumented program.
pub trait FileFilter: Send + Sync {
  fn include(&self, path: &str) -> bool;
}

impl<F> FileFilter for F
where
  F: Fn(&str) -> bool + Send + Sync,
{
  fn include(&self, path: &str) -> bool {
    self(path)
  }
}

/// Includes every file.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllFiles;

impl FileFilter for AllFiles {
  fn include(&self, _path: &str) -> bool {
    true
  }
}

/// Includes files whose path contains any of the given substrings.
#[derive(Debug, Clone)]
pub struct PathContains {
  subs: Vec<String>,
}

impl PathContains {
  #[must_use]
  pub fn new<I, S>(subs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      subs: subs.into_iter().map(Into::into).collect(),
    }
  }
}

impl FileFilter for PathContains {
  fn include(&self, path: &str) -> bool {
    self.subs.iter().any(|sub| path.contains(sub.as_str()))
  }
}

/// Includes files whose content matches a regex.
///
/// Unreadable files are excluded rather than reported.
#[derive(Debug, Clone)]
pub struct ContainsRegex {
  pattern: Regex,
}

impl ContainsRegex {
  /// The default opt-in filter: instrument files carrying a `# heatline`
  /// marker comment.
  #[must_use]
  pub fn marker() -> Self {
    Self::new(Regex::new(MARKER_PATTERN).expect("marker pattern is valid"))
  }

  #[must_use]
  pub fn new(pattern: Regex) -> Self {
    Self { pattern }
  }
}

impl FileFilter for ContainsRegex {
  fn include(&self, path: &str) -> bool {
    match fs::read_to_string(path) {
      Ok(code) => self.pattern.is_match(&code),
      Err(err) => {
        log::debug!("excluding unreadable file {path}: {err}");
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn all_files_always_includes() {
    assert!(AllFiles.include("/anything/at/all.rs"));
  }

  #[test]
  fn path_contains_matches_any_substring() {
    let filter = PathContains::new(["src/", "demo"]);

    assert!(filter.include("/project/src/lib.rs"));
    assert!(filter.include("/tmp/demo.rs"));
    assert!(!filter.include("/project/vendor/dep.rs"));
  }

  #[test]
  fn closures_act_as_filters() {
    let filter = |path: &str| path.ends_with(".rs");

    assert!(FileFilter::include(&filter, "main.rs"));
    assert!(!FileFilter::include(&filter, "main.py"));
  }

  #[test]
  fn marker_filter_requires_marker_comment() {
    let mut marked = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(marked, "fn main() {{}}  # heatline").expect("write");

    let mut plain = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(plain, "fn main() {{}}").expect("write");

    let filter = ContainsRegex::marker();

    assert!(filter.include(marked.path().to_str().expect("utf-8 path")));
    assert!(!filter.include(plain.path().to_str().expect("utf-8 path")));
  }

  #[test]
  fn unreadable_file_is_excluded() {
    let filter = ContainsRegex::marker();

    assert!(!filter.include("/definitely/not/a/real/file.rs"));
  }
}
