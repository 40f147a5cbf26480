//! Minimal line diff used to preview updates.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineChange {
    Same,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub change: LineChange,
    pub text: String,
}

/// Above this many cells the LCS table is skipped and the whole file is shown
/// as replaced.
const MAX_TABLE_CELLS: usize = 4_000_000;

/// Longest-common-subsequence diff of `old` and `new`, line by line.
pub fn line_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    if a.len().saturating_mul(b.len()) > MAX_TABLE_CELLS {
        return a
            .iter()
            .map(|l| line(LineChange::Removed, l))
            .chain(b.iter().map(|l| line(LineChange::Added, l)))
            .collect();
    }

    // lcs[i][j] = LCS length of a[i..] and b[j..]
    let width = b.len() + 1;
    let mut lcs = vec![0usize; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    let mut out = Vec::with_capacity(a.len().max(b.len()));
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            out.push(line(LineChange::Same, a[i]));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            out.push(line(LineChange::Removed, a[i]));
            i += 1;
        } else {
            out.push(line(LineChange::Added, b[j]));
            j += 1;
        }
    }
    out.extend(a[i..].iter().map(|l| line(LineChange::Removed, l)));
    out.extend(b[j..].iter().map(|l| line(LineChange::Added, l)));
    out
}

/// `+`/`-`/` ` prefixed rendering, changed lines only plus one line of context.
pub fn format_diff(lines: &[DiffLine]) -> String {
    let mut out = String::new();
    for (idx, l) in lines.iter().enumerate() {
        let near_change = |k: Option<usize>| {
            k.and_then(|k| lines.get(k))
                .is_some_and(|n| n.change != LineChange::Same)
        };
        let prefix = match l.change {
            LineChange::Added => '+',
            LineChange::Removed => '-',
            LineChange::Same if near_change(idx.checked_sub(1)) || near_change(Some(idx + 1)) => {
                ' '
            },
            LineChange::Same => continue,
        };
        out.push(prefix);
        out.push_str(&l.text);
        out.push('\n');
    }
    out
}

fn line(change: LineChange, text: &str) -> DiffLine {
    DiffLine {
        change,
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(diff: &[DiffLine]) -> Vec<(LineChange, &str)> {
        diff.iter().map(|d| (d.change, d.text.as_str())).collect()
    }

    #[test]
    fn identical_inputs_are_all_same() {
        let d = line_diff("a\nb\n", "a\nb\n");
        assert!(d.iter().all(|l| l.change == LineChange::Same));
    }

    #[test]
    fn replaced_middle_line() {
        let d = line_diff("a\nb\nc", "a\nB\nc");
        assert_eq!(changes(&d), vec![
            (LineChange::Same, "a"),
            (LineChange::Removed, "b"),
            (LineChange::Added, "B"),
            (LineChange::Same, "c"),
        ]);
    }

    #[test]
    fn appended_and_removed_tails() {
        assert_eq!(changes(&line_diff("a", "a\nz")), vec![
            (LineChange::Same, "a"),
            (LineChange::Added, "z"),
        ]);
        assert_eq!(changes(&line_diff("a\nz", "")), vec![
            (LineChange::Removed, "a"),
            (LineChange::Removed, "z"),
        ]);
    }

    #[test]
    fn formatted_output_keeps_context_only_around_changes() {
        let text = format_diff(&line_diff("1\n2\n3\n4\n5", "1\n2\n3\nX\n5"));
        assert_eq!(text, " 3\n-4\n+X\n 5\n");
    }
}
