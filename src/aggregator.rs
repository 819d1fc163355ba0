use std::collections::HashMap;

use nohash_hasher::BuildNoHashHasher;

use crate::state::FileState;

type LineCounter = HashMap<u32, u32, BuildNoHashHasher<u32>>;

/// Heat values for a single source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatRow {
  /// Per-level display intensities in `[0, 100]`, largest window first.
  pub intensities: Vec<u8>,
  /// 1-based line number.
  pub line: u32,
  /// Lifetime execution count; `None` renders blank.
  pub total: Option<u64>,
}

/// Compute multi-resolution heat rows for lines `1..=line_count`.
///
/// Level `c` counts line occurrences over the most recent `min(2^c, len)`
/// history entries; its raw ratio is weighted by `(c+1)/levels` so sustained
/// hot lines outweigh momentary spikes. Ratios are normalized against the
/// maximum across all lines and levels in this query, so the hottest cell is
/// always exactly 100 unless the file has no history at all.
#[must_use]
pub fn heat_rows(
  state: &FileState,
  line_count: usize,
  levels: u32,
) -> Vec<HeatRow> {
  let recent = state.history().recent();
  let counters = window_counters(&recent, levels);
  let len = recent.len();
  let levels = f64::from(levels.max(1));

  let ratios: Vec<Vec<f64>> = (1..=line_count as u32)
    .map(|line| {
      counters
        .iter()
        .enumerate()
        .map(|(c, counter)| {
          let window = window_size(c as u32).min(len).max(1);
          let count = counter.get(&line).copied().unwrap_or(0);
          f64::from(count) / window as f64 * (c as f64 + 1.0) / levels
        })
        .collect()
    })
    .collect();

  let observed_max = ratios.iter().flatten().copied().fold(0.0_f64, f64::max);
  let max_ratio = if observed_max > 0.0 { observed_max } else { 1.0 };

  ratios
    .into_iter()
    .enumerate()
    .map(|(index, line_ratios)| {
      let line = index as u32 + 1;

      let mut intensities: Vec<u8> = line_ratios
        .into_iter()
        .map(|ratio| (ratio / max_ratio * 100.0).round() as u8)
        .collect();

      // Finest window last once reversed; matches the display order.
      intensities.reverse();

      let total = match state.total(line) {
        0 => None,
        count => Some(count),
      };

      HeatRow {
        intensities,
        line,
        total,
      }
    })
    .collect()
}

fn window_counters(recent: &[u32], levels: u32) -> Vec<LineCounter> {
  (0..=levels)
    .map(|c| {
      let window = window_size(c).min(recent.len());
      let mut counter = LineCounter::with_capacity_and_hasher(
        window,
        BuildNoHashHasher::default(),
      );

      for &line in &recent[recent.len() - window..] {
        *counter.entry(line).or_insert(0) += 1;
      }

      counter
    })
    .collect()
}

fn window_size(level: u32) -> usize {
  1_usize.checked_shl(level).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::state::FileState;

  fn state_with(levels: u32, lines: &[u32]) -> FileState {
    let state = FileState::new(levels);
    for &line in lines {
      state.record_line(line);
    }
    state
  }

  #[test]
  fn empty_history_yields_all_zero_rows() {
    let state = FileState::new(3);

    let rows = heat_rows(&state, 4, 3);

    assert_eq!(rows.len(), 4);
    for (index, row) in rows.iter().enumerate() {
      assert_eq!(row.line, index as u32 + 1);
      assert_eq!(row.total, None);
      assert_eq!(row.intensities.len(), 4);
      assert!(row.intensities.iter().all(|&intensity| intensity == 0));
    }
  }

  #[test]
  fn two_level_window_scenario() {
    // Capacity 2: [10, 10, 20] leaves [10, 20] in the window.
    let state = state_with(1, &[10, 10, 20]);

    let rows = heat_rows(&state, 20, 1);

    let line10 = &rows[9];
    let line20 = &rows[19];

    // Level 0 (window 1) sees only line 20; level 1 (window 2) sees both.
    assert_eq!(line10.intensities, vec![100, 0]);
    assert_eq!(line20.intensities, vec![100, 100]);

    assert_eq!(line10.total, Some(2));
    assert_eq!(line20.total, Some(1));
  }

  #[test]
  fn hottest_cell_is_exactly_one_hundred() {
    let state = state_with(4, &[1, 2, 2, 3, 2, 2, 2]);

    let rows = heat_rows(&state, 3, 4);
    let max = rows
      .iter()
      .flat_map(|row| row.intensities.iter().copied())
      .max()
      .expect("rows are non-empty");

    assert_eq!(max, 100);
  }

  #[test]
  fn never_executed_line_stays_blank_and_cold() {
    let state = state_with(4, &[2, 2, 2]);

    let rows = heat_rows(&state, 3, 4);

    assert_eq!(rows[0].total, None);
    assert!(rows[0].intensities.iter().all(|&intensity| intensity == 0));
    assert_eq!(rows[1].total, Some(3));
  }

  #[test]
  fn rows_carry_one_intensity_per_level() {
    let state = state_with(10, &[1]);

    let rows = heat_rows(&state, 1, 10);

    assert_eq!(rows[0].intensities.len(), 11);
  }

  #[test]
  fn sustained_lines_outweigh_recent_spikes() {
    // Line 1 ran steadily; line 2 only in the most recent entries.
    let mut events = vec![1; 12];
    events.extend([2, 2]);
    let state = state_with(4, &events);

    let rows = heat_rows(&state, 2, 4);

    // Coarsest level (first after reversal) favors the sustained line.
    assert!(rows[0].intensities[0] > rows[1].intensities[0]);
  }
}
