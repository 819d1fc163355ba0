use std::collections::BTreeSet;

/// Marker kind attached to a byte offset in the source text.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Marker {
  Close,
  Open,
}

/// Merge executing ranges into an offset-sorted marker stream.
///
/// Identical ranges collapse to one pair. A range spanning a line break is
/// closed just before the break and reopened just after it, so splitting the
/// marked text on line breaks always yields rows whose spans open and close
/// on the same row. Offsets are tags, never literal text, so markers cannot
/// collide with source content.
#[must_use]
pub fn merge_ranges(
  text: &str,
  ranges: &[(usize, usize)],
) -> Vec<(usize, Marker)> {
  let deduped: BTreeSet<(usize, usize)> = ranges
    .iter()
    .copied()
    .filter(|&(start, end)| {
      start <= end
        && end <= text.len()
        && text.is_char_boundary(start)
        && text.is_char_boundary(end)
    })
    .collect();

  let mut markers = Vec::with_capacity(deduped.len() * 2);

  for (start, end) in deduped {
    markers.push((start, Marker::Open));
    markers.push((end, Marker::Close));

    let mut cursor = start + 1;
    while cursor < end {
      let Some(slice) = text.get(cursor..end) else {
        break;
      };
      let Some(found) = slice.find('\n') else {
        break;
      };

      let newline = cursor + found;
      markers.push((newline, Marker::Close));
      markers.push((newline + 1, Marker::Open));
      cursor = newline + 1;
    }
  }

  // Stable: markers at the same offset keep their insertion order.
  markers.sort_by_key(|&(offset, _)| offset);
  markers
}

/// Splice `open`/`close` marker strings into `text` by offset.
#[must_use]
pub fn mark_text(
  text: &str,
  ranges: &[(usize, usize)],
  open: &str,
  close: &str,
) -> String {
  let markers = merge_ranges(text, ranges);

  let mut marked = String::with_capacity(
    text.len() + markers.len() * open.len().max(close.len()),
  );
  let mut cursor = 0;

  for (offset, marker) in markers {
    marked.push_str(&text[cursor..offset]);
    marked.push_str(match marker {
      Marker::Close => close,
      Marker::Open => open,
    });
    cursor = offset;
  }

  marked.push_str(&text[cursor..]);
  marked
}

/// Re-express the merged markers as per-line spans.
///
/// Returns one entry per line of `text` (split on `\n`); each entry holds
/// `(start, end)` byte offsets into that raw line. Nested and overlapping
/// ranges flatten into their outermost extent.
#[must_use]
pub fn line_spans(
  text: &str,
  ranges: &[(usize, usize)],
) -> Vec<Vec<(usize, usize)>> {
  let markers = merge_ranges(text, ranges);

  let mut result = Vec::new();
  let mut index = 0;
  let mut line_start = 0;

  for line in text.split('\n') {
    let line_end = line_start + line.len();
    let mut spans = Vec::new();
    let mut depth = 0_u32;
    let mut open_start = 0;

    while index < markers.len() && markers[index].0 <= line_end {
      let (offset, marker) = markers[index];
      index += 1;

      match marker {
        Marker::Open => {
          if depth == 0 {
            open_start = offset - line_start;
          }
          depth += 1;
        }
        Marker::Close => {
          depth = depth.saturating_sub(1);
          if depth == 0 {
            spans.push((open_start, offset - line_start));
          }
        }
      }
    }

    result.push(spans);
    line_start = line_end + 1;
  }

  result
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_line_range_produces_one_marker_pair() {
    let markers = merge_ranges("hello", &[(2, 5)]);

    assert_eq!(markers, vec![(2, Marker::Open), (5, Marker::Close)]);
  }

  #[test]
  fn identical_ranges_collapse() {
    let markers = merge_ranges("abcdef", &[(3, 3), (3, 3)]);

    assert_eq!(markers, vec![(3, Marker::Open), (3, Marker::Close)]);
  }

  #[test]
  fn range_spanning_a_line_break_is_split_at_the_break() {
    // Offsets: a=0 b=1 \n=2 c=3 d=4 \n=5.
    let markers = merge_ranges("ab\ncd\n", &[(1, 5)]);

    assert_eq!(
      markers,
      vec![
        (1, Marker::Open),
        (2, Marker::Close),
        (3, Marker::Open),
        (5, Marker::Close),
      ]
    );
  }

  #[test]
  fn marked_rows_are_self_contained() {
    let marked = mark_text("ab\ncd\n", &[(1, 5)], "<b>", "</b>");

    assert_eq!(marked, "a<b>b</b>\n<b>cd</b>\n");

    for row in marked.split('\n') {
      assert_eq!(row.matches("<b>").count(), row.matches("</b>").count());
    }
  }

  #[test]
  fn out_of_bounds_ranges_are_dropped() {
    let markers = merge_ranges("ab", &[(0, 99), (5, 2)]);

    assert!(markers.is_empty());
  }

  #[test]
  fn line_spans_follow_the_split() {
    let spans = line_spans("ab\ncd\n", &[(1, 5)]);

    assert_eq!(spans, vec![vec![(1, 2)], vec![(0, 2)], vec![]]);
  }

  #[test]
  fn nested_ranges_flatten_to_outer_extent() {
    let spans = line_spans("abcdefgh", &[(1, 7), (3, 5)]);

    assert_eq!(spans, vec![vec![(1, 7)]]);
  }

  #[test]
  fn marking_with_no_ranges_returns_text_verbatim() {
    assert_eq!(mark_text("fn main() {}", &[], "<b>", "</b>"), "fn main() {}");
  }
}
