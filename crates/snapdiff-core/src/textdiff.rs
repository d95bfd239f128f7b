//! Myers O(ND) text diffing.
//!
//! Three granularities over one core:
//! - line diff with replace-pairing and per-pair inline highlighting
//! - word diff (tokens are runs of whitespace / non-whitespace)
//! - char diff
//!
//! Sequences longer than [`MYERS_MAX_ITEMS`] are not diffed; the result
//! degrades to a synthetic length-only change (one removal + one insertion).
//! That cap bounds worst-case cost, it is not an error.

/// Sequence-length cap for the Myers pass.
pub const MYERS_MAX_ITEMS: usize = 5_000;

/// Line normalisation applied before comparison. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    pub trim: bool,
    pub collapse_whitespace: bool,
    pub ignore_case: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Equal,
    Added,
    Removed,
}

/// One run of an inline (word/char level) diff.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineSpan {
    pub kind: SpanKind,
    pub text: String,
}

/// One line of a line-level diff.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOp {
    Equal {
        line: String,
    },
    Added {
        line: String,
    },
    Removed {
        line: String,
    },
    /// A removed/inserted pair reported as an in-place edit.
    Modified {
        old: String,
        new: String,
        inline: Vec<InlineSpan>,
    },
}

/// Line-diff result with change counts.
#[derive(Debug, Clone, Default)]
pub struct TextDiff {
    pub ops: Vec<LineOp>,
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    /// Denominator for [`TextDiff::similarity`]: the longer side's length.
    pub total: usize,
    /// True when the Myers cap forced a length-only report.
    pub truncated: bool,
}

impl TextDiff {
    pub fn has_changes(&self) -> bool {
        self.added + self.removed + self.modified > 0
    }

    /// `100·(total − added − removed − modified)/total`, floored at 0.
    pub fn similarity(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        let changed = self.added + self.removed + self.modified;
        let kept = self.total.saturating_sub(changed);
        100.0 * kept as f64 / self.total as f64
    }
}

/// Similarity of two texts in percent.
pub fn similarity(a: &str, b: &str, opts: &DiffOptions) -> f64 {
    diff_lines(a, b, opts).similarity()
}

/// Line-level diff of two texts.
pub fn diff_lines(a: &str, b: &str, opts: &DiffOptions) -> TextDiff {
    let a_lines = split_lines(a);
    let b_lines = split_lines(b);
    let total = a_lines.len().max(b_lines.len());

    if a_lines.len() > MYERS_MAX_ITEMS || b_lines.len() > MYERS_MAX_ITEMS {
        if a == b {
            return TextDiff {
                total,
                truncated: true,
                ..Default::default()
            };
        }
        return TextDiff {
            ops: vec![
                LineOp::Removed {
                    line: format!("<{} lines>", a_lines.len()),
                },
                LineOp::Added {
                    line: format!("<{} lines>", b_lines.len()),
                },
            ],
            added: 1,
            removed: 1,
            modified: 0,
            total,
            truncated: true,
        };
    }

    let a_norm: Vec<String> = a_lines.iter().map(|l| normalize(l, opts)).collect();
    let b_norm: Vec<String> = b_lines.iter().map(|l| normalize(l, opts)).collect();
    let edits = myers_edits(&a_norm, &b_norm);

    let mut diff = TextDiff {
        total,
        ..Default::default()
    };
    let mut pending_removed: Vec<usize> = Vec::new();
    let mut pending_added: Vec<usize> = Vec::new();

    let mut flush = |diff: &mut TextDiff, removed: &mut Vec<usize>, added: &mut Vec<usize>| {
        let pairs = removed.len().min(added.len());
        for i in 0..pairs {
            let old = a_lines[removed[i]].to_string();
            let new = b_lines[added[i]].to_string();
            let inline = diff_chars(&old, &new);
            diff.ops.push(LineOp::Modified { old, new, inline });
            diff.modified += 1;
        }
        for &idx in removed.iter().skip(pairs) {
            diff.ops.push(LineOp::Removed {
                line: a_lines[idx].to_string(),
            });
            diff.removed += 1;
        }
        for &idx in added.iter().skip(pairs) {
            diff.ops.push(LineOp::Added {
                line: b_lines[idx].to_string(),
            });
            diff.added += 1;
        }
        removed.clear();
        added.clear();
    };

    for edit in edits {
        match edit {
            Edit::Equal { a: idx, .. } => {
                flush(&mut diff, &mut pending_removed, &mut pending_added);
                diff.ops.push(LineOp::Equal {
                    line: a_lines[idx].to_string(),
                });
            }
            Edit::Delete { a: idx } => pending_removed.push(idx),
            Edit::Insert { b: idx } => pending_added.push(idx),
        }
    }
    flush(&mut diff, &mut pending_removed, &mut pending_added);
    diff
}

/// Word-level diff: tokens are maximal runs of whitespace or non-whitespace,
/// adjacent same-kind spans merged.
pub fn diff_words(a: &str, b: &str) -> Vec<InlineSpan> {
    merge_spans(token_spans(&tokenize_words(a), &tokenize_words(b)))
}

/// Char-level diff with adjacent same-kind spans merged.
pub fn diff_chars(a: &str, b: &str) -> Vec<InlineSpan> {
    let a_tokens: Vec<String> = a.chars().map(String::from).collect();
    let b_tokens: Vec<String> = b.chars().map(String::from).collect();
    merge_spans(token_spans(&a_tokens, &b_tokens))
}

/// Non-whitespace tokens removed from `a` and added in `b`, for change
/// classification.
pub fn changed_words(a: &str, b: &str) -> (Vec<String>, Vec<String>) {
    let spans = token_spans(&tokenize_words(a), &tokenize_words(b));
    let mut removed = Vec::new();
    let mut added = Vec::new();
    for (kind, text) in spans {
        if text.trim().is_empty() {
            continue;
        }
        match kind {
            SpanKind::Removed => removed.push(text),
            SpanKind::Added => added.push(text),
            SpanKind::Equal => {}
        }
    }
    (removed, added)
}

fn token_spans(a: &[String], b: &[String]) -> Vec<(SpanKind, String)> {
    if a.len() > MYERS_MAX_ITEMS || b.len() > MYERS_MAX_ITEMS {
        if a == b {
            return vec![(SpanKind::Equal, a.concat())];
        }
        let mut spans = Vec::new();
        if !a.is_empty() {
            spans.push((SpanKind::Removed, a.concat()));
        }
        if !b.is_empty() {
            spans.push((SpanKind::Added, b.concat()));
        }
        return spans;
    }
    myers_edits(a, b)
        .into_iter()
        .map(|edit| match edit {
            Edit::Equal { a: idx, .. } => (SpanKind::Equal, a[idx].clone()),
            Edit::Delete { a: idx } => (SpanKind::Removed, a[idx].clone()),
            Edit::Insert { b: idx } => (SpanKind::Added, b[idx].clone()),
        })
        .collect()
}

fn merge_spans(tokens: Vec<(SpanKind, String)>) -> Vec<InlineSpan> {
    let mut spans: Vec<InlineSpan> = Vec::new();
    for (kind, text) in tokens {
        match spans.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(&text),
            _ => spans.push(InlineSpan { kind, text }),
        }
    }
    spans
}

fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.lines().collect()
    }
}

fn tokenize_words(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for ch in text.chars() {
        let is_space = ch.is_whitespace();
        match tokens.last_mut() {
            Some(last)
                if last.chars().next().map(char::is_whitespace) == Some(is_space) =>
            {
                last.push(ch)
            }
            _ => tokens.push(ch.to_string()),
        }
    }
    tokens
}

fn normalize(line: &str, opts: &DiffOptions) -> String {
    let mut out = line.to_string();
    if opts.trim {
        out = out.trim().to_string();
    }
    if opts.collapse_whitespace {
        out = out.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    if opts.ignore_case {
        out = out.to_lowercase();
    }
    out
}

// ── Myers O(ND) core ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Equal { a: usize, b: usize },
    Delete { a: usize },
    Insert { b: usize },
}

/// Greedy Myers shortest-edit-script over two sequences. Returns one edit
/// per item, in order.
fn myers_edits<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Edit> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    if max == 0 {
        return Vec::new();
    }
    let offset = max;
    let width = (2 * max + 1) as usize;
    let mut v = vec![0isize; width];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'outer: for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                break 'outer;
            }
            k += 2;
        }
    }

    let mut edits = Vec::new();
    let mut x = n;
    let mut y = m;
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let idx = (k + offset) as usize;
        let prev_k = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            edits.push(Edit::Equal {
                a: (x - 1) as usize,
                b: (y - 1) as usize,
            });
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            if x == prev_x {
                edits.push(Edit::Insert {
                    b: prev_y as usize,
                });
            } else {
                edits.push(Edit::Delete {
                    a: prev_x as usize,
                });
            }
            x = prev_x;
            y = prev_y;
        }
    }
    edits.reverse();
    edits
}
