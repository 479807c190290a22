//! Character-level diffing of two text snapshots into LSP edits.
//!
//! The raw script comes from a Myers diff over chars. Under the default policy
//! it is then post-processed so that edits land on word boundaries:
//!
//! * a pure insertion or deletion that can slide across identical text is moved
//!   to the leftmost position that best lines up with word boundaries and does
//!   not start with whitespace (`"foo bar"` to `"foo baz bar"` inserts `"baz "`
//!   before `bar`, not `"z ba"` inside it);
//! * a change that begins or ends inside a word is widened over the rest of
//!   that word, merging with a neighbouring change if they meet.
//!
//! Both steps only move or widen edits over text that is unchanged, so applying
//! the result still reproduces the new text exactly. Under every policy a `\r\n`
//! pair is never split by a fragment boundary, since LSP positions cannot address
//! the point between the two.

use crate::core::text_edit::EditFragment;
use crate::document::TextSnapshot;
use serde::{Deserialize, Serialize};
use similar::{Algorithm, ChangeTag, TextDiff};
use std::ops::Range;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonPolicy {
    /// Character diff aligned to word boundaries.
    #[default]
    Default,
    /// The raw minimal character diff.
    Exact,
    /// As `Default`, but changes that only touch whitespace are dropped.
    IgnoreWhitespaces,
}

/// Computes the ordered, non-overlapping fragments that turn `old` into `new`.
pub fn diff(old: &str, new: &str, policy: ComparisonPolicy) -> Vec<EditFragment> {
    if old == new {
        return Vec::new();
    }

    let text_diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(old, new);
    let fragments = collect_fragments(&text_diff);

    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    let fragments = match policy {
        ComparisonPolicy::Exact => fragments,
        _ => {
            let slid = slide_to_boundaries(&fragments, &old_chars, &new_chars);
            snap_to_words(&slid, &old_chars, &new_chars)
        }
    };
    let fragments = keep_crlf_whole(&fragments, &old_chars);

    match policy {
        ComparisonPolicy::IgnoreWhitespaces => fragments
            .into_iter()
            .filter(|fragment| !is_whitespace_only(fragment, &old_chars, &new_chars))
            .collect(),
        _ => fragments,
    }
}

/// Diffs two snapshots and renders every fragment against the old one.
pub fn text_edits(
    old: &TextSnapshot,
    new: &TextSnapshot,
    policy: ComparisonPolicy,
) -> Vec<lsp_types::TextEdit> {
    let fragments = diff(&old.text_string(), &new.text_string(), policy);
    tracing::debug!(
        "diff {} -> {}: {} fragment(s)",
        old.origin.display(),
        new.origin.display(),
        fragments.len()
    );
    fragments
        .iter()
        .map(|fragment| fragment.to_text_edit(&old.content, &new.content))
        .collect()
}

/// Walks the change script with one cursor per side. Consecutive deletes and
/// inserts form one fragment; every unchanged char closes the open one.
fn collect_fragments<'a>(text_diff: &TextDiff<'a, 'a, 'a, str>) -> Vec<EditFragment> {
    let mut fragments = Vec::new();
    let mut open: Option<EditFragment> = None;
    let mut old_cursor = 0usize;
    let mut new_cursor = 0usize;

    for change in text_diff.iter_all_changes() {
        let len = change.value().chars().count();
        match change.tag() {
            ChangeTag::Equal => {
                fragments.extend(open.take());
                old_cursor += len;
                new_cursor += len;
            }
            ChangeTag::Delete => {
                let (old_at, new_at) = (old_cursor, new_cursor);
                let fragment =
                    open.get_or_insert_with(|| EditFragment::new(old_at..old_at, new_at..new_at));
                old_cursor += len;
                fragment.old.end = old_cursor;
            }
            ChangeTag::Insert => {
                let (old_at, new_at) = (old_cursor, new_cursor);
                let fragment =
                    open.get_or_insert_with(|| EditFragment::new(old_at..old_at, new_at..new_at));
                new_cursor += len;
                fragment.new.end = new_cursor;
            }
        }
    }
    fragments.extend(open);
    fragments
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_boundary(before: char, after: char) -> bool {
    before == '\n' || is_word(before) != is_word(after)
}

fn slide_to_boundaries(
    fragments: &[EditFragment],
    old: &[char],
    new: &[char],
) -> Vec<EditFragment> {
    let mut out: Vec<EditFragment> = Vec::with_capacity(fragments.len());
    for (i, fragment) in fragments.iter().enumerate() {
        let lower = out.last().map_or(0, |prev| prev.old.end);
        let upper = fragments.get(i + 1).map_or(old.len(), |next| next.old.start);
        out.push(slide(fragment, old, new, lower, upper));
    }
    out
}

/// Slides a pure insertion or deletion within the unchanged gap `lower..upper`
/// of the old text.
fn slide(
    fragment: &EditFragment,
    old: &[char],
    new: &[char],
    lower: usize,
    upper: usize,
) -> EditFragment {
    let (seq, chunk) = if fragment.is_insertion() {
        (new, fragment.new.clone())
    } else if fragment.is_deletion() {
        (old, fragment.old.clone())
    } else {
        return fragment.clone();
    };

    let mut left = 0;
    while fragment.old.start - left > lower
        && chunk.start > left
        && seq[chunk.start - left - 1] == seq[chunk.end - left - 1]
    {
        left += 1;
    }
    let mut right = 0;
    while fragment.old.end + right < upper
        && chunk.end + right < seq.len()
        && seq[chunk.start + right] == seq[chunk.end + right]
    {
        right += 1;
    }
    if left == 0 && right == 0 {
        return fragment.clone();
    }

    let len = chunk.len();
    let score = |start: usize| {
        let end = start + len;
        let starts_clean = start == 0 || is_boundary(seq[start - 1], seq[start]);
        let ends_clean = end == seq.len() || is_boundary(seq[end - 1], seq[end]);
        let leading_space = seq[start].is_whitespace();
        (u8::from(starts_clean) + u8::from(ends_clean), !leading_space)
    };

    // Leftmost candidate with the best score.
    let first = chunk.start - left;
    let mut best = 0;
    let mut best_score = score(first);
    for k in 1..=left + right {
        let candidate = score(first + k);
        if candidate > best_score {
            best = k;
            best_score = candidate;
        }
    }

    EditFragment::new(
        fragment.old.start - left + best..fragment.old.end - left + best,
        fragment.new.start - left + best..fragment.new.end - left + best,
    )
}

fn first_char(seq: &[char], range: &Range<usize>) -> Option<char> {
    seq[range.clone()].first().copied()
}

fn last_char(seq: &[char], range: &Range<usize>) -> Option<char> {
    seq[range.clone()].last().copied()
}

fn snap_to_words(fragments: &[EditFragment], old: &[char], new: &[char]) -> Vec<EditFragment> {
    let mut out: Vec<EditFragment> = Vec::with_capacity(fragments.len());
    for (i, fragment) in fragments.iter().enumerate() {
        let lower = out.last().map_or(0, |prev| prev.old.end);
        let upper = fragments.get(i + 1).map_or(old.len(), |next| next.old.start);

        let touches_start = first_char(old, &fragment.old).is_some_and(is_word)
            || first_char(new, &fragment.new).is_some_and(is_word);
        let touches_end = last_char(old, &fragment.old).is_some_and(is_word)
            || last_char(new, &fragment.new).is_some_and(is_word);

        let mut snapped = fragment.clone();
        if touches_start {
            let mut k = 0;
            while snapped.old.start - k > lower && is_word(old[snapped.old.start - k - 1]) {
                k += 1;
            }
            snapped.old.start -= k;
            snapped.new.start -= k;
        }
        if touches_end {
            let mut k = 0;
            while snapped.old.end + k < upper && is_word(old[snapped.old.end + k]) {
                k += 1;
            }
            snapped.old.end += k;
            snapped.new.end += k;
        }

        match out.last_mut() {
            Some(prev) if prev.old.end == snapped.old.start => {
                prev.old.end = snapped.old.end;
                prev.new.end = snapped.new.end;
            }
            _ => out.push(snapped),
        }
    }
    out
}

fn splits_crlf(old: &[char], at: usize) -> bool {
    at > 0 && at < old.len() && old[at - 1] == '\r' && old[at] == '\n'
}

/// Widens fragments so that no boundary falls between `\r` and `\n` in the
/// old text. The widened-over chars sit in unchanged gaps, or in a touching
/// neighbour, which is then merged in.
fn keep_crlf_whole(fragments: &[EditFragment], old: &[char]) -> Vec<EditFragment> {
    let mut out: Vec<EditFragment> = Vec::with_capacity(fragments.len());
    for (i, fragment) in fragments.iter().enumerate() {
        let mut fragment = fragment.clone();

        if splits_crlf(old, fragment.old.start)
            && out.last().map_or(true, |prev| prev.old.end < fragment.old.start)
        {
            fragment.old.start -= 1;
            fragment.new.start -= 1;
        }
        if splits_crlf(old, fragment.old.end)
            && fragments
                .get(i + 1)
                .map_or(true, |next| next.old.start > fragment.old.end)
        {
            fragment.old.end += 1;
            fragment.new.end += 1;
        }

        match out.last_mut() {
            Some(prev) if prev.old.end >= fragment.old.start => {
                prev.old.end = fragment.old.end;
                prev.new.end = fragment.new.end;
            }
            _ => out.push(fragment),
        }
    }
    out
}

fn is_whitespace_only(fragment: &EditFragment, old: &[char], new: &[char]) -> bool {
    old[fragment.old.clone()].iter().all(|c| c.is_whitespace())
        && new[fragment.new.clone()].iter().all(|c| c.is_whitespace())
}
