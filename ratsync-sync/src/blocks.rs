//! Protected regions ("ignore blocks") inside managed text files.
//!
//! A region is delimited by sentinel lines, written in whatever comment
//! syntax the file uses:
//!
//! ```text
//! # ratsync:begin id=local-config mode=ignore
//! ...consumer-owned lines...
//! # ratsync:end id=local-config
//! ```
//!
//! Lines inside a region belong to the consumer repository and survive every
//! overwrite and merge.

use std::collections::BTreeMap;

pub const BEGIN_MARKER: &str = "ratsync:begin";
pub const END_MARKER: &str = "ratsync:end";

/// Inclusive, 0-based line range of one protected region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub id: String,
    pub start: usize,
    pub end: usize,
}

impl BlockSpan {
    pub fn contains_line(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }

    /// True when the span shares at least one line with `[start, end)`.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && self.end >= start
    }

    fn encloses(&self, other: &BlockSpan) -> bool {
        self.start <= other.start && other.end <= self.end && self != other
    }
}

/// Outcome of [`enforce_ours_blocks`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReport {
    /// Blocks replaced in place.
    pub enforced: Vec<String>,
    /// Blocks missing from the candidate and force-inserted.
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Sentinel parsing
// ---------------------------------------------------------------------------

enum Sentinel {
    Begin(String),
    End(String),
}

fn block_id(line: &str) -> Option<String> {
    let id: String = line
        .split_whitespace()
        .find_map(|tok| tok.strip_prefix("id="))?
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    (!id.is_empty()).then_some(id)
}

fn parse_sentinel(line: &str) -> Option<Sentinel> {
    if line.contains(BEGIN_MARKER) {
        let protected = line.split_whitespace().any(|tok| tok.starts_with("mode=ignore"));
        if !protected {
            return None;
        }
        block_id(line).map(Sentinel::Begin)
    } else if line.contains(END_MARKER) {
        block_id(line).map(Sentinel::End)
    } else {
        None
    }
}

/// Locate every protected region in `text`, keyed by id.
///
/// A later region with an already-seen id replaces the earlier span. A begin
/// without a matching end yields nothing; so does an end without a begin.
pub fn find_blocks(text: &str) -> BTreeMap<String, BlockSpan> {
    let mut open: BTreeMap<String, usize> = BTreeMap::new();
    let mut spans = BTreeMap::new();
    for (idx, line) in text.lines().enumerate() {
        match parse_sentinel(line) {
            Some(Sentinel::Begin(id)) => {
                open.insert(id, idx);
            }
            Some(Sentinel::End(id)) => {
                if let Some(start) = open.remove(&id) {
                    spans.insert(
                        id.clone(),
                        BlockSpan {
                            id,
                            start,
                            end: idx,
                        },
                    );
                }
            }
            None => {}
        }
    }
    spans
}

/// Regions of `text` sorted by start line.
pub(crate) fn sorted_blocks(text: &str) -> Vec<BlockSpan> {
    let mut blocks: Vec<BlockSpan> = find_blocks(text).into_values().collect();
    blocks.sort_by_key(|b| (b.start, std::cmp::Reverse(b.end)));
    blocks
}

// ---------------------------------------------------------------------------
// Enforcement
// ---------------------------------------------------------------------------

fn bare(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Make `candidate` carry every protected region of `ours` verbatim.
///
/// A region present in both (by id) has its candidate lines replaced with the
/// `ours` lines. A region missing from the candidate is inserted:
///
/// 1. after the first candidate line equal to the line preceding it in `ours`;
/// 2. else before the first candidate line equal to the line following it;
/// 3. else at the top, when the region opens `ours`;
/// 4. else at the end.
pub fn enforce_ours_blocks(ours: &str, candidate: &str) -> (String, BlockReport) {
    let ours_blocks = sorted_blocks(ours);
    if ours_blocks.is_empty() {
        return (candidate.to_owned(), BlockReport::default());
    }

    let ours_lines: Vec<&str> = ours.split_inclusive('\n').collect();
    let mut lines: Vec<String> = candidate.split_inclusive('\n').map(str::to_owned).collect();
    let cand_blocks = find_blocks(candidate);

    // Nested regions travel with their outermost enclosing region.
    let outer: Vec<&BlockSpan> = ours_blocks
        .iter()
        .filter(|b| !ours_blocks.iter().any(|o| o.encloses(b)))
        .collect();
    let outer_of = |inner: &BlockSpan| -> String {
        outer
            .iter()
            .find(|o| o.start <= inner.start && inner.end <= o.end)
            .map(|o| o.id.clone())
            .unwrap_or_else(|| inner.id.clone())
    };

    let mut candidates: Vec<(&BlockSpan, &BlockSpan)> = outer
        .iter()
        .filter_map(|b| cand_blocks.get(&b.id).map(|c| (*b, c)))
        .collect();
    candidates.sort_by_key(|(_, c)| (c.start, std::cmp::Reverse(c.end)));
    // Candidate spans sharing a line with an earlier kept span (nested or
    // interleaved) are not replaced in place; those blocks get re-inserted.
    let mut replace: Vec<(&BlockSpan, &BlockSpan)> = Vec::new();
    for (ours_span, cand_span) in candidates {
        let clashes = replace
            .iter()
            .any(|(_, kept)| kept.overlaps(cand_span.start, cand_span.end + 1));
        if !clashes {
            replace.push((ours_span, cand_span));
        }
    }
    replace.sort_by(|a, b| b.1.start.cmp(&a.1.start));

    let mut placed: Vec<String> = Vec::new();
    for (ours_span, cand_span) in &replace {
        let block = ours_lines[ours_span.start..=ours_span.end]
            .iter()
            .map(|l| (*l).to_owned());
        lines.splice(cand_span.start..=cand_span.end, block);
        placed.push(ours_span.id.clone());
    }

    let mut inserted_outer = Vec::new();
    for span in &outer {
        if placed.contains(&span.id) {
            continue;
        }
        let block: Vec<String> = ours_lines[span.start..=span.end]
            .iter()
            .map(|l| (*l).to_owned())
            .collect();
        let at = insertion_point(&ours_lines, span, &lines);
        lines.splice(at..at, block);
        inserted_outer.push(span.id.clone());
    }

    for line in lines.iter_mut().rev().skip(1) {
        if !line.ends_with('\n') {
            line.push('\n');
        }
    }

    let mut report = BlockReport::default();
    for span in &ours_blocks {
        let owner = outer_of(span);
        if inserted_outer.contains(&owner) {
            report.warnings.push(span.id.clone());
        } else {
            report.enforced.push(span.id.clone());
        }
    }
    report.enforced.sort();
    report.warnings.sort();
    if !report.warnings.is_empty() {
        tracing::warn!(
            "protected block(s) missing from new content, re-inserted: {}",
            report.warnings.join(", ")
        );
    }

    (lines.concat(), report)
}

fn insertion_point(ours_lines: &[&str], span: &BlockSpan, lines: &[String]) -> usize {
    if span.start > 0 {
        let before = bare(ours_lines[span.start - 1]);
        if let Some(pos) = lines.iter().position(|l| bare(l) == before) {
            return pos + 1;
        }
    }
    if let Some(after) = ours_lines.get(span.end + 1).map(|l| bare(l)) {
        if let Some(pos) = lines.iter().position(|l| bare(l) == after) {
            return pos;
        }
    }
    if span.start == 0 {
        return 0;
    }
    lines.len()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const OURS: &str = "\
header
# ratsync:begin id=config mode=ignore
local_setting = true
# ratsync:end id=config
footer
";

    #[test]
    fn finds_single_block() {
        let blocks = find_blocks(OURS);
        assert_eq!(
            blocks.get("config"),
            Some(&BlockSpan {
                id: "config".into(),
                start: 1,
                end: 3
            })
        );
    }

    #[test]
    fn html_comment_sentinels_are_recognised() {
        let text = "<!-- ratsync:begin id=badges mode=ignore -->\nx\n<!-- ratsync:end id=badges -->\n";
        let span = &find_blocks(text)["badges"];
        assert_eq!((span.start, span.end), (0, 2));
    }

    #[test]
    fn unmatched_and_unprotected_sentinels_yield_nothing() {
        assert!(find_blocks("# ratsync:begin id=a mode=ignore\nno end\n").is_empty());
        assert!(find_blocks("# ratsync:end id=a\n").is_empty());
        assert!(find_blocks("# ratsync:begin id=a\nx\n# ratsync:end id=a\n").is_empty());
    }

    #[test]
    fn later_block_with_same_id_wins() {
        let text = "\
# ratsync:begin id=a mode=ignore
# ratsync:end id=a
mid
# ratsync:begin id=a mode=ignore
x
# ratsync:end id=a
";
        let span = &find_blocks(text)["a"];
        assert_eq!((span.start, span.end), (3, 5));
    }

    #[test]
    fn no_blocks_returns_candidate_unchanged() {
        let (out, report) = enforce_ours_blocks("plain\n", "template\n");
        assert_eq!(out, "template\n");
        assert_eq!(report, BlockReport::default());
    }

    #[test]
    fn block_present_in_candidate_is_replaced() {
        let candidate = "\
new header
# ratsync:begin id=config mode=ignore
template_setting = false
# ratsync:end id=config
new footer
";
        let (out, report) = enforce_ours_blocks(OURS, candidate);
        assert!(out.contains("local_setting = true"));
        assert!(!out.contains("template_setting"));
        assert!(out.starts_with("new header\n"));
        assert!(out.ends_with("new footer\n"));
        assert_eq!(report.enforced, vec!["config".to_string()]);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn missing_block_goes_after_preceding_line() {
        let (out, report) = enforce_ours_blocks(OURS, "header\nbody\nfooter\n");
        assert_eq!(
            out,
            "header\n# ratsync:begin id=config mode=ignore\nlocal_setting = true\n# ratsync:end id=config\nbody\nfooter\n"
        );
        assert_eq!(report.warnings, vec!["config".to_string()]);
    }

    #[test]
    fn missing_block_goes_before_following_line() {
        let (out, _) = enforce_ours_blocks(OURS, "changed\nfooter\n");
        assert_eq!(
            out,
            "changed\n# ratsync:begin id=config mode=ignore\nlocal_setting = true\n# ratsync:end id=config\nfooter\n"
        );
    }

    #[test]
    fn missing_leading_block_goes_to_top() {
        let ours = "# ratsync:begin id=top mode=ignore\nmine\n# ratsync:end id=top\nrest\n";
        let (out, _) = enforce_ours_blocks(ours, "other\n");
        assert!(out.starts_with("# ratsync:begin id=top mode=ignore\nmine\n"));
        assert!(out.ends_with("other\n"));
    }

    #[test]
    fn missing_block_without_anchor_is_appended_on_its_own_lines() {
        let (out, report) = enforce_ours_blocks(OURS, "totally\ndifferent");
        assert_eq!(
            out,
            "totally\ndifferent\n# ratsync:begin id=config mode=ignore\nlocal_setting = true\n# ratsync:end id=config\n"
        );
        assert_eq!(report.warnings, vec!["config".to_string()]);
    }

    #[test]
    fn multiple_blocks_are_all_enforced() {
        let ours = "\
# ratsync:begin id=a mode=ignore
A-local
# ratsync:end id=a
mid
# ratsync:begin id=b mode=ignore
B-local
# ratsync:end id=b
";
        let candidate = "\
# ratsync:begin id=a mode=ignore
A-template
A-template-2
# ratsync:end id=a
mid
# ratsync:begin id=b mode=ignore
# ratsync:end id=b
";
        let (out, report) = enforce_ours_blocks(ours, candidate);
        assert_eq!(out, ours);
        assert_eq!(report.enforced, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn interleaved_candidate_blocks_are_handled() {
        let ours = "\
# ratsync:begin id=a mode=ignore
A-local
# ratsync:end id=a
# ratsync:begin id=b mode=ignore
B-local
# ratsync:end id=b
";
        let candidate = "\
# ratsync:begin id=a mode=ignore
# ratsync:begin id=b mode=ignore
x
y
# ratsync:end id=a
# ratsync:end id=b
";
        let (out, report) = enforce_ours_blocks(ours, candidate);
        assert!(out.contains(
            "# ratsync:begin id=a mode=ignore\nA-local\n# ratsync:end id=a\n"
        ));
        assert!(out.contains(
            "# ratsync:begin id=b mode=ignore\nB-local\n# ratsync:end id=b\n"
        ));
        assert!(!out.contains("x\n"));
        assert_eq!(report.enforced, vec!["a".to_string()]);
        assert_eq!(report.warnings, vec!["b".to_string()]);
    }
}
