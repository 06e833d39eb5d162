//! Line-level text reconciliation between a local file ("ours") and the
//! rendered template ("theirs").
//!
//! [`merge`] is the two-way merge: the template is the structural base, its
//! insertions are accepted and every other local divergence is surrounded by
//! conflict markers. [`merge3`] is used instead when the template content
//! last applied to the file is known, and lets disjoint edits on both sides
//! merge cleanly.
//!
//! Both honour protected blocks of `ours` (see [`crate::blocks`]): their
//! lines are emitted verbatim and never conflict-marked.

use std::collections::BTreeSet;
use std::ops::Range;

use similar::{capture_diff_slices, Algorithm, DiffTag};

use crate::blocks::{find_blocks, sorted_blocks, BlockSpan};

pub const CONFLICT_LOCAL: &str = "<<<<<<< LOCAL\n";
pub const CONFLICT_SEPARATOR: &str = "=======\n";
pub const CONFLICT_TEMPLATE: &str = ">>>>>>> TEMPLATE\n";

/// Result of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub text: String,
    pub had_conflict: bool,
}

/// True when `text` still carries unresolved conflict markers.
pub fn has_conflict_markers(text: &str) -> bool {
    let mut open = false;
    for line in text.lines() {
        if line == CONFLICT_LOCAL.trim_end() {
            open = true;
        } else if open && line == CONFLICT_TEMPLATE.trim_end() {
            return true;
        }
    }
    false
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

fn bare(line: &str) -> &str {
    line.trim_end_matches('\n')
}

/// Append `line`, first terminating a previous unterminated line.
fn push_line(out: &mut String, line: &str) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(line);
}

fn push_conflict(out: &mut String, ours: &[&str], theirs: &[&str]) {
    push_line(out, CONFLICT_LOCAL);
    for line in ours {
        push_line(out, line);
    }
    push_line(out, CONFLICT_SEPARATOR);
    for line in theirs {
        push_line(out, line);
    }
    push_line(out, CONFLICT_TEMPLATE);
}

/// Make the trailing newline of `text` follow `theirs`.
fn follow_trailing_newline(mut text: String, theirs: &str) -> String {
    if theirs.ends_with('\n') {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
    } else {
        let len = text.trim_end_matches('\n').len();
        text.truncate(len);
    }
    text
}

// ---------------------------------------------------------------------------
// Two-way merge
// ---------------------------------------------------------------------------

struct TwoWay<'a> {
    ours: Vec<&'a str>,
    theirs: Vec<&'a str>,
    blocks: Vec<BlockSpan>,
    /// Template lines belonging to the template's own copy of a block that
    /// `ours` protects.
    shadowed: Vec<bool>,
    /// Template lines held back until the given `ours` line has been emitted.
    deferred: Vec<(usize, Vec<&'a str>)>,
    out: String,
    had_conflict: bool,
}

impl<'a> TwoWay<'a> {
    fn new(ours: &'a str, theirs: &'a str) -> Self {
        let blocks = sorted_blocks(ours);
        let theirs_lines = split_lines(theirs);
        let mut shadowed = vec![false; theirs_lines.len()];
        let protected: BTreeSet<&str> = blocks.iter().map(|b| b.id.as_str()).collect();
        for span in find_blocks(theirs).values() {
            if protected.contains(span.id.as_str()) {
                for flag in &mut shadowed[span.start..=span.end] {
                    *flag = true;
                }
            }
        }
        Self {
            ours: split_lines(ours),
            theirs: theirs_lines,
            blocks,
            shadowed,
            deferred: Vec::new(),
            out: String::new(),
            had_conflict: false,
        }
    }

    /// Insertion point strictly inside a protected block.
    fn inside_block(&self, at: usize) -> bool {
        self.blocks.iter().any(|b| b.start < at && at <= b.end)
    }

    fn theirs_kept(&self, range: Range<usize>) -> Vec<&'a str> {
        range
            .filter(|&j| !self.shadowed[j])
            .map(|j| self.theirs[j])
            .collect()
    }

    fn push_ours(&mut self, range: Range<usize>) {
        for i in range {
            push_line(&mut self.out, self.ours[i]);
            self.flush_deferred(|at| at == i);
        }
    }

    fn defer_theirs(&mut self, after: usize, range: Range<usize>) {
        let lines = self.theirs_kept(range);
        if !lines.is_empty() {
            self.deferred.push((after, lines));
        }
    }

    fn flush_deferred(&mut self, due: impl Fn(usize) -> bool) {
        if self.deferred.is_empty() {
            return;
        }
        let (ready, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.deferred).into_iter().partition(|(at, _)| due(*at));
        self.deferred = waiting;
        for (_, lines) in ready {
            for line in lines {
                push_line(&mut self.out, line);
            }
        }
    }

    fn push_theirs(&mut self, range: Range<usize>) {
        for line in self.theirs_kept(range) {
            push_line(&mut self.out, line);
        }
    }

    fn merge_range(&mut self, o: Range<usize>, t: Range<usize>) {
        let ops = capture_diff_slices(
            Algorithm::Myers,
            &self.ours[o.clone()],
            &self.theirs[t.clone()],
        );
        for op in ops {
            let (tag, or, tr) = op.as_tag_tuple();
            let or = (or.start + o.start)..(or.end + o.start);
            let tr = (tr.start + t.start)..(tr.end + t.start);
            match tag {
                DiffTag::Equal => self.push_ours(or),
                DiffTag::Insert => {
                    if self.inside_block(or.start) {
                        tracing::debug!("dropping template lines inside a protected block");
                    } else {
                        self.push_theirs(tr);
                    }
                }
                DiffTag::Delete | DiffTag::Replace => self.resolve(or, tr),
            }
        }
    }

    fn resolve(&mut self, o: Range<usize>, t: Range<usize>) {
        let overlapping: Vec<BlockSpan> = self
            .blocks
            .iter()
            .filter(|b| b.overlaps(o.start, o.end))
            .cloned()
            .collect();
        if overlapping.is_empty() {
            self.resolve_plain(o, t);
            return;
        }

        // Template lines are aligned to local lines by offset within the hunk.
        let t_at = |pos: usize| (t.start + pos.saturating_sub(o.start)).min(t.end);
        let mut pos = o.start;
        for block in &overlapping {
            if pos < block.start {
                self.merge_range(pos..block.start, t_at(pos)..t_at(block.start));
            }
            let from = block.start.max(pos);
            let to = (block.end + 1).min(o.end);
            if from < to {
                self.push_ours(from..to);
            }
            if pos <= block.end {
                // Template content aligned against the block follows it.
                if block.end < o.end {
                    self.push_theirs(t_at(from)..t_at(block.end + 1));
                } else {
                    // The block runs past this hunk; the rest of the template
                    // side waits for the block's end line.
                    self.defer_theirs(block.end, t_at(from)..t.end);
                }
                pos = block.end + 1;
            }
        }
        if pos < o.end {
            self.merge_range(pos..o.end, t_at(pos)..t.end);
        } else if pos == o.end {
            self.push_theirs(t_at(pos)..t.end);
        }
    }

    fn resolve_plain(&mut self, o: Range<usize>, t: Range<usize>) {
        let ours_at_end = o.end == self.ours.len();
        let theirs_at_end = t.end == self.theirs.len();
        let ours: Vec<&str> = self.ours[o].to_vec();
        let theirs = self.theirs_kept(t);

        let newline_only = ours.len() == 1
            && theirs.len() == 1
            && ours_at_end
            && theirs_at_end
            && bare(ours[0]) == bare(theirs[0]);
        // A lone trailing blank line yields to the template, whether the
        // template drops it or puts other lines in its place.
        let extra_blank_line = ours_at_end && ours == ["\n"];

        if newline_only || extra_blank_line || ours.is_empty() {
            for line in theirs {
                push_line(&mut self.out, line);
            }
        } else {
            push_conflict(&mut self.out, &ours, &theirs);
            self.had_conflict = true;
        }
    }
}

/// Two-way merge of local content with the rendered template.
///
/// - equal lines are copied, template insertions accepted;
/// - local deletions and replacements become conflict blocks, except a lone
///   final line differing only by its newline (template wins) and a single
///   blank last line of `ours`, which yields to whatever the template has
///   in its place (nothing, or replacement lines);
/// - protected blocks of `ours` are emitted verbatim;
/// - the result ends with a newline iff `theirs` does.
pub fn merge(ours: &str, theirs: &str) -> MergeOutcome {
    let mut state = TwoWay::new(ours, theirs);
    let (o, t) = (0..state.ours.len(), 0..state.theirs.len());
    state.merge_range(o, t);
    state.flush_deferred(|_| true);
    MergeOutcome {
        text: follow_trailing_newline(state.out, theirs),
        had_conflict: state.had_conflict,
    }
}

// ---------------------------------------------------------------------------
// Three-way merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Hunk {
    base: Range<usize>,
    side: Range<usize>,
}

fn hunks(base: &[&str], side: &[&str]) -> Vec<Hunk> {
    capture_diff_slices(Algorithm::Myers, base, side)
        .into_iter()
        .filter_map(|op| {
            let (tag, base, side) = op.as_tag_tuple();
            (tag != DiffTag::Equal).then_some(Hunk { base, side })
        })
        .collect()
}

/// A hunk belongs to the cluster `[start, end)` when it overlaps it, or when
/// an insertion sits on its boundary.
fn joins(hunk: &Hunk, start: usize, end: usize) -> bool {
    hunk.base.start < end || (hunk.base.start == end && (hunk.base.is_empty() || start == end))
}

/// Side range covering the cluster `[start, end)` of base.
fn side_range(hunks: &[Hunk], start: usize, end: usize) -> Option<Range<usize>> {
    let first = hunks.first()?;
    let last = hunks.last()?;
    Some((first.side.start - (first.base.start - start))..(last.side.end + (end - last.base.end)))
}

fn touches_block(blocks: &[BlockSpan], range: &Range<usize>) -> bool {
    blocks.iter().any(|b| {
        if range.is_empty() {
            b.start < range.start && range.start <= b.end
        } else {
            b.overlaps(range.start, range.end)
        }
    })
}

/// Three-way merge against `base`, the template content last applied.
///
/// Regions changed on one side only take that side; identical changes on
/// both sides are taken once; differing changes conflict. Any region touching
/// a protected block of `ours` resolves to `ours`.
pub fn merge3(base: &str, ours: &str, theirs: &str) -> MergeOutcome {
    let b = split_lines(base);
    let o = split_lines(ours);
    let t = split_lines(theirs);
    let ours_hunks = hunks(&b, &o);
    let theirs_hunks = hunks(&b, &t);
    let blocks = sorted_blocks(ours);

    let mut out = String::new();
    let mut had_conflict = false;
    let (mut io, mut it) = (0, 0);
    let mut base_pos = 0;
    let mut ours_pos = 0;

    loop {
        let start = match (ours_hunks.get(io), theirs_hunks.get(it)) {
            (None, None) => break,
            (Some(h), None) | (None, Some(h)) => h.base.start,
            (Some(x), Some(y)) => x.base.start.min(y.base.start),
        };
        for line in &b[base_pos..start] {
            push_line(&mut out, line);
        }
        ours_pos += start - base_pos;

        let (o_first, t_first) = (io, it);
        let mut end = start;
        loop {
            let mut grew = false;
            if let Some(h) = ours_hunks.get(io).filter(|h| joins(h, start, end)) {
                end = end.max(h.base.end);
                io += 1;
                grew = true;
            }
            if let Some(h) = theirs_hunks.get(it).filter(|h| joins(h, start, end)) {
                end = end.max(h.base.end);
                it += 1;
                grew = true;
            }
            if !grew {
                break;
            }
        }

        let ours_changed = side_range(&ours_hunks[o_first..io], start, end);
        let theirs_changed = side_range(&theirs_hunks[t_first..it], start, end);
        let ours_range = ours_changed
            .clone()
            .unwrap_or(ours_pos..ours_pos + (end - start));
        let ours_slice = &o[ours_range.clone()];
        let protected = touches_block(&blocks, &ours_range);

        match (&ours_changed, &theirs_changed) {
            (_, None) => ours_slice.iter().for_each(|l| push_line(&mut out, l)),
            (_, Some(_)) if protected => {
                tracing::debug!("template change touches a protected block; keeping local");
                ours_slice.iter().for_each(|l| push_line(&mut out, l));
            }
            (None, Some(tr)) => t[tr.clone()].iter().for_each(|l| push_line(&mut out, l)),
            (Some(_), Some(tr)) => {
                let theirs_slice = &t[tr.clone()];
                if ours_slice == theirs_slice {
                    ours_slice.iter().for_each(|l| push_line(&mut out, l));
                } else {
                    push_conflict(&mut out, ours_slice, theirs_slice);
                    had_conflict = true;
                }
            }
        }

        ours_pos = ours_range.end;
        base_pos = end;
    }
    for line in &b[base_pos..] {
        push_line(&mut out, line);
    }

    MergeOutcome {
        text: follow_trailing_newline(out, theirs),
        had_conflict,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
