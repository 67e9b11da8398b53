//! Snapshot diff engine
//!
//! Runs a Myers shortest edit script over two text documents and folds the
//! result into unified hunks with three lines of surrounding context.

mod myers;

use myers::{Edit, Myers};

/// Lines of context kept around each change run
const HUNK_CONTEXT: usize = 3;

/// Change runs separated by at most this many edits share one hunk
const HUNK_MERGE_GAP: usize = 2 * HUNK_CONTEXT;

/// Classification of one diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

/// One line of a hunk with its 1-based source positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    pub text: String,
    /// Position in the old document, when the line exists there
    pub old_line: Option<usize>,
    /// Position in the new document, when the line exists there
    pub new_line: Option<usize>,
}

/// A run of changes with context, in 1-based coordinates
///
/// When a side contributes no lines its start is anchored just past the
/// other side's start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Unified-diff style range header, handy for rendering
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

/// Diff of one file pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }
}

/// Diff two text documents
///
/// Lines split on `\n` with a trailing `\r` discarded; empty input is an
/// empty document.
pub fn diff_texts(old: &str, new: &str, old_path: &str, new_path: &str) -> FileDiff {
    let old_lines: Vec<String> = old.lines().map(str::to_string).collect();
    let new_lines: Vec<String> = new.lines().map(str::to_string).collect();

    let edits = Myers::new(old_lines, new_lines).edits();

    FileDiff {
        old_path: old_path.to_string(),
        new_path: new_path.to_string(),
        hunks: build_hunks(&edits),
    }
}

fn build_hunks(edits: &[Edit]) -> Vec<Hunk> {
    let changed: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, edit)| edit.is_change())
        .map(|(index, _)| index)
        .collect();

    if changed.is_empty() {
        return Vec::new();
    }

    // group change runs whose separating equal stretch fits inside the
    // merged context window
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut run_start = changed[0];
    let mut run_end = changed[0];

    for &index in &changed[1..] {
        if index - run_end - 1 <= HUNK_MERGE_GAP {
            run_end = index;
        } else {
            groups.push((run_start, run_end));
            (run_start, run_end) = (index, index);
        }
    }
    groups.push((run_start, run_end));

    groups
        .into_iter()
        .map(|(first, last)| {
            let lo = first.saturating_sub(HUNK_CONTEXT);
            let hi = (last + HUNK_CONTEXT).min(edits.len() - 1);
            hunk_from_edits(&edits[lo..=hi])
        })
        .collect()
}

fn hunk_from_edits(edits: &[Edit]) -> Hunk {
    let lines: Vec<DiffLine> = edits
        .iter()
        .map(|edit| match edit {
            Edit::Delete { line } => DiffLine {
                kind: LineKind::Removed,
                text: line.text.clone(),
                old_line: Some(line.number),
                new_line: None,
            },
            Edit::Insert { line } => DiffLine {
                kind: LineKind::Added,
                text: line.text.clone(),
                old_line: None,
                new_line: Some(line.number),
            },
            Edit::Equal { line_a, line_b } => DiffLine {
                kind: LineKind::Context,
                text: line_a.text.clone(),
                old_line: Some(line_a.number),
                new_line: Some(line_b.number),
            },
        })
        .collect();

    let old_first = lines.iter().find_map(|line| line.old_line);
    let new_first = lines.iter().find_map(|line| line.new_line);

    // a side with zero lines anchors just past the other side's start
    let old_start = old_first.unwrap_or_else(|| new_first.unwrap_or(0) + 1);
    let new_start = new_first.unwrap_or_else(|| old_first.unwrap_or(0) + 1);

    Hunk {
        old_start,
        old_count: lines.iter().filter(|line| line.old_line.is_some()).count(),
        new_start,
        new_count: lines.iter().filter(|line| line.new_line.is_some()).count(),
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn identical_inputs_produce_no_hunks() {
        let diff = diff_texts("a\nb\nc\n", "a\nb\nc\n", "f", "f");
        assert!(diff.is_empty());
    }

    #[rstest]
    fn empty_old_is_pure_addition() {
        let diff = diff_texts("", "one\ntwo\n", "f", "f");

        assert_eq!(diff.hunks.len(), 1);
        let hunk = &diff.hunks[0];
        assert!(hunk.lines.iter().all(|line| line.kind == LineKind::Added));
        assert_eq!(hunk.new_start, 1);
        assert_eq!(hunk.new_count, 2);
        assert_eq!(hunk.old_count, 0);
        assert_eq!(hunk.old_start, 2);
    }

    #[rstest]
    fn empty_new_is_pure_removal() {
        let diff = diff_texts("one\ntwo\n", "", "f", "f");

        assert_eq!(diff.hunks.len(), 1);
        let hunk = &diff.hunks[0];
        assert!(hunk.lines.iter().all(|line| line.kind == LineKind::Removed));
        assert_eq!(hunk.old_start, 1);
        assert_eq!(hunk.old_count, 2);
        assert_eq!(hunk.new_count, 0);
        assert_eq!(hunk.new_start, 2);
    }

    #[rstest]
    fn carriage_returns_are_discarded() {
        let diff = diff_texts("a\r\nb\r\n", "a\nb\n", "f", "f");
        assert!(diff.is_empty());
    }

    #[rstest]
    fn single_change_carries_three_context_lines() {
        let old = "1\n2\n3\n4\n5\n6\n7\n8\n9\n";
        let new = "1\n2\n3\n4\nfive\n6\n7\n8\n9\n";
        let diff = diff_texts(old, new, "f", "f");

        assert_eq!(diff.hunks.len(), 1);
        let hunk = &diff.hunks[0];
        assert_eq!(hunk.old_start, 2);
        assert_eq!(hunk.new_start, 2);
        assert_eq!(hunk.old_count, 7);
        assert_eq!(hunk.new_count, 7);
        assert_eq!(hunk.header(), "@@ -2,7 +2,7 @@");

        let kinds: Vec<LineKind> = hunk.lines.iter().map(|line| line.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Context,
                LineKind::Context,
                LineKind::Context,
                LineKind::Removed,
                LineKind::Added,
                LineKind::Context,
                LineKind::Context,
                LineKind::Context,
            ]
        );
    }

    fn numbered(count: usize, replace: &[(usize, &str)]) -> String {
        (1..=count)
            .map(|n| {
                let text = replace
                    .iter()
                    .find(|(at, _)| *at == n)
                    .map(|(_, text)| text.to_string())
                    .unwrap_or_else(|| n.to_string());
                format!("{text}\n")
            })
            .collect()
    }

    #[rstest]
    fn nearby_changes_share_a_hunk() {
        let old = numbered(10, &[]);
        let new = numbered(10, &[(1, "one"), (8, "eight")]);
        let diff = diff_texts(&old, &new, "f", "f");

        // the equal stretch between the two changes is six edits, so the
        // runs merge
        assert_eq!(diff.hunks.len(), 1);
    }

    #[rstest]
    fn distant_changes_split_into_hunks() {
        let old = numbered(30, &[]);
        let new = numbered(30, &[(3, "three"), (27, "twentyseven")]);
        let diff = diff_texts(&old, &new, "f", "f");

        assert_eq!(diff.hunks.len(), 2);
    }

    #[rstest]
    fn dense_change_counts_cover_both_sides() {
        let diff = diff_texts("a\nb\n", "c\nd\n", "f", "f");

        assert_eq!(diff.hunks.len(), 1);
        let hunk = &diff.hunks[0];
        assert_eq!(hunk.old_count, 2);
        assert_eq!(hunk.new_count, 2);
    }

    #[rstest]
    fn line_numbers_are_one_based_and_tracked() {
        let diff = diff_texts("keep\nold\n", "keep\nnew\n", "f", "f");

        let hunk = &diff.hunks[0];
        let removed = hunk
            .lines
            .iter()
            .find(|line| line.kind == LineKind::Removed)
            .unwrap();
        let added = hunk
            .lines
            .iter()
            .find(|line| line.kind == LineKind::Added)
            .unwrap();

        assert_eq!(removed.old_line, Some(2));
        assert_eq!(removed.new_line, None);
        assert_eq!(added.new_line, Some(2));
        assert_eq!(added.old_line, None);
    }
}
