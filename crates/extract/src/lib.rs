//! Fact extraction — recovers a bounded fact list from raw model output.
//!
//! Models are asked for a `<tmi>`-wrapped bulleted list but frequently drop
//! the wrapper while still emitting bullets, or occasionally emit plain
//! prose. Extraction therefore cascades through three tiers, each trading
//! format precision for recall:
//!
//! 1. **Delimiter tier** — bulleted lines inside the first `<tmi>...</tmi>`
//!    block. One item is enough; this is the contract the prompt requests.
//! 2. **Bulleted fallback** — bulleted lines anywhere in the text, with a
//!    stricter rejection table. Needs at least three survivors.
//! 3. **Sentence split** — last resort: sentence candidates from the whole
//!    text, strictest rejection table. Needs at least three survivors.
//!
//! No tier succeeding means a parse failure (`None`) — callers must surface
//! an error rather than show zero facts as success.
//!
//! Line classification is a rule table per tier, applied in order, so each
//! tier's acceptance behavior is independently testable. The length bounds
//! and keyword rejections are intentionally kept exactly as tuned upstream.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// First non-greedy delimiter block, case-insensitive, spanning newlines.
static TMI_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tmi>\s*(.*?)\s*</tmi>").expect("valid regex"));

/// A bulleted line: `-`, `*`, `•`, or `N.` prefix followed by whitespace.
static BULLET_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]|\d+\.)\s+").expect("valid regex"));

/// The bullet prefix to strip (tolerates a missing trailing space).
static BULLET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]|\d+\.)\s*").expect("valid regex"));

/// Any delimiter token, for stripping before the sentence tier.
static TMI_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?tmi>").expect("valid regex"));

/// Sentence-ending punctuation followed by whitespace.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid regex"));

/// One rejection rule applied to a candidate fact string.
#[derive(Debug, Clone, Copy)]
enum Rule {
    /// Reject candidates shorter than this many chars
    MinChars(usize),
    /// Reject candidates longer than this many chars
    MaxChars(usize),
    /// Reject candidates containing this literal substring
    Forbid(&'static str),
    /// Reject candidates containing this substring, case-insensitive
    ForbidCi(&'static str),
    /// Reject candidates starting with this prefix
    ForbidPrefix(&'static str),
}

impl Rule {
    fn rejects(&self, candidate: &str) -> bool {
        match *self {
            Self::MinChars(min) => candidate.chars().count() < min,
            Self::MaxChars(max) => candidate.chars().count() > max,
            Self::Forbid(token) => candidate.contains(token),
            Self::ForbidCi(token) => candidate.to_lowercase().contains(token),
            Self::ForbidPrefix(prefix) => candidate.starts_with(prefix),
        }
    }
}

/// Delimiter tier: only near-empty fragments are dropped.
const DELIMITER_RULES: &[Rule] = &[Rule::MinChars(6)];

/// Bulleted fallback: length bounds plus leaked-instruction heuristics.
const BULLETED_RULES: &[Rule] = &[
    Rule::MinChars(10),
    Rule::MaxChars(200),
    Rule::Forbid("<tmi>"),
    Rule::Forbid("</tmi>"),
    Rule::ForbidCi("format"),
    Rule::ForbidCi("example"),
];

/// Sentence tier: tightest bounds, plus code-fence and markup rejection.
const SENTENCE_RULES: &[Rule] = &[
    Rule::MinChars(20),
    Rule::MaxChars(150),
    Rule::ForbidCi("format"),
    Rule::ForbidCi("example"),
    Rule::Forbid("```"),
    Rule::ForbidPrefix("["),
];

fn passes(candidate: &str, rules: &[Rule]) -> bool {
    rules.iter().all(|rule| !rule.rejects(candidate))
}

/// Collect bulleted lines from `text`, prefix stripped, filtered by `rules`.
fn bullet_items(text: &str, rules: &[Rule]) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| BULLET_LINE.is_match(line))
        .map(|line| BULLET_PREFIX.replace(line, "").trim().to_string())
        .filter(|item| passes(item, rules))
        .collect()
}

/// Tier 1: bulleted lines inside the first delimiter block.
fn delimiter_tier(raw: &str) -> Vec<String> {
    let Some(captures) = TMI_BLOCK.captures(raw) else {
        return Vec::new();
    };
    let inner = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    bullet_items(inner, DELIMITER_RULES)
}

/// Tier 2: bulleted lines anywhere in the raw text.
fn bulleted_tier(raw: &str) -> Vec<String> {
    bullet_items(raw, BULLETED_RULES)
}

/// Tier 3: sentence candidates from the whole text, delimiters stripped.
fn sentence_tier(raw: &str) -> Vec<String> {
    let stripped = TMI_TOKEN.replace_all(raw, "");
    SENTENCE_END
        .split(&stripped)
        .map(str::trim)
        .filter(|candidate| passes(candidate, SENTENCE_RULES))
        .map(String::from)
        .collect()
}

/// Parse raw model output into an ordered fact list.
///
/// Returns at most `max_count` items (clamped to 1..=10), or `None` when no
/// tier yields enough parseable candidates.
pub fn extract(raw: &str, max_count: usize) -> Option<Vec<String>> {
    let max_count = max_count.clamp(1, 10);

    let items = delimiter_tier(raw);
    if !items.is_empty() {
        debug!(count = items.len(), "Parsed facts from delimiter block");
        return Some(take(items, max_count));
    }

    let items = bulleted_tier(raw);
    if items.len() >= 3 {
        debug!(count = items.len(), "Fallback: parsed bare bulleted list");
        return Some(take(items, max_count));
    }

    let items = sentence_tier(raw);
    if items.len() >= 3 {
        debug!(count = items.len(), "Last resort: split into sentences");
        return Some(take(items, max_count));
    }

    None
}

fn take(mut items: Vec<String>, max_count: usize) -> Vec<String> {
    items.truncate(max_count);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Tier 1: delimiter ──────────────────────────────────────────────

    #[test]
    fn wrapped_list_parses_in_order() {
        let raw = "<tmi>\n- Fact A\n- Fact B\n- Fact C\n</tmi>";
        assert_eq!(
            extract(raw, 10),
            Some(vec!["Fact A".into(), "Fact B".into(), "Fact C".into()])
        );
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let raw = "Here are some facts:\n<tmi>\n- The tavern was built 200 years ago.\n- Mira secretly distrusts the mayor.\n</tmi>\nHope that helps!";
        assert_eq!(
            extract(raw, 5),
            Some(vec![
                "The tavern was built 200 years ago.".into(),
                "Mira secretly distrusts the mayor.".into(),
            ])
        );
    }

    #[test]
    fn delimiter_tier_accepts_a_single_item() {
        let raw = "<tmi>\n- Just one fact here\n</tmi>";
        assert_eq!(extract(raw, 3), Some(vec!["Just one fact here".into()]));
    }

    #[test]
    fn tags_are_case_insensitive() {
        let raw = "<TMI>\n- Upper case tags work\n</TMI>";
        assert_eq!(extract(raw, 3), Some(vec!["Upper case tags work".into()]));
    }

    #[test]
    fn first_block_wins_non_greedy() {
        let raw = "<tmi>\n- First block fact\n</tmi>\n<tmi>\n- Second block fact\n</tmi>";
        assert_eq!(extract(raw, 5), Some(vec!["First block fact".into()]));
    }

    #[test]
    fn numbered_and_star_bullets_accepted() {
        let raw = "<tmi>\n1. Numbered fact one\n* Starred fact two\n• Dotted fact three\n</tmi>";
        assert_eq!(
            extract(raw, 10),
            Some(vec![
                "Numbered fact one".into(),
                "Starred fact two".into(),
                "Dotted fact three".into(),
            ])
        );
    }

    #[test]
    fn tiny_fragments_dropped_inside_block() {
        // ≤ 5 chars after stripping is dropped
        let raw = "<tmi>\n- ok\n- This one is long enough\n</tmi>";
        assert_eq!(
            extract(raw, 10),
            Some(vec!["This one is long enough".into()])
        );
    }

    #[test]
    fn non_bulleted_lines_inside_block_ignored() {
        let raw = "<tmi>\nPreamble line without a bullet\n- A real bulleted fact\n</tmi>";
        assert_eq!(extract(raw, 10), Some(vec!["A real bulleted fact".into()]));
    }

    // ── Tier 2: bulleted fallback ──────────────────────────────────────

    #[test]
    fn bare_bulleted_list_falls_through() {
        let raw = "- Fact one is long enough to pass.\n- Fact two is also long enough.\n- Fact three too.";
        assert_eq!(
            extract(raw, 3),
            Some(vec![
                "Fact one is long enough to pass.".into(),
                "Fact two is also long enough.".into(),
                "Fact three too.".into(),
            ])
        );
    }

    #[test]
    fn two_bare_bullets_are_not_enough() {
        let raw = "- Only two facts appear here.\n- And this is the second one.";
        assert_eq!(extract(raw, 5), None);
    }

    #[test]
    fn fallback_rejects_meta_lines() {
        // Lines mentioning "format"/"example" are leaked instructions
        let raw = "- This line follows the format requested above.\n\
                   - A perfectly valid fact about the world.\n\
                   - Another valid fact about the character.\n\
                   - For example, something to avoid.";
        assert_eq!(extract(raw, 10), None);
    }

    #[test]
    fn fallback_rejects_out_of_bounds_lengths() {
        let long = "x".repeat(201);
        let raw = format!("- short one\n- {long}\n- A valid middle-length fact.");
        // "short one" is 9 chars → rejected; long → rejected; one survivor < 3
        assert_eq!(extract(&raw, 10), None);
    }

    #[test]
    fn fallback_rejects_lines_with_tags() {
        let raw = "- A fact mentioning <tmi> inline here\n\
                   - Second fact that is fine here\n\
                   - Third fact that is fine here";
        assert_eq!(extract(raw, 10), None);
    }

    // ── Tier 3: sentence split ─────────────────────────────────────────

    #[test]
    fn prose_splits_into_sentences() {
        let raw = "The tavern has stood for two centuries. \
                   Mira inherited it from her grandmother last spring. \
                   The cellar hides a tunnel to the old keep. \
                   Nobody speaks of the night it was dug.";
        let items = extract(raw, 10).unwrap();
        assert!(items.len() >= 3);
        assert_eq!(items[0], "The tavern has stood for two centuries");
    }

    #[test]
    fn sentence_tier_rejects_markup_and_meta() {
        let raw = "I cannot help with format examples.";
        assert_eq!(extract(raw, 5), None);
    }

    #[test]
    fn sentence_tier_strips_delimiters_first() {
        let raw = "<tmi>The harbor bell rings twice at dawn every single day. \
                   Sailors claim the sound keeps the fog away from shore. \
                   The bellkeeper has never once missed a morning.</tmi>";
        // No bullets at all, so tiers 1-2 fail; tags must not pollute tier 3
        let items = extract(raw, 10).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].starts_with("The harbor bell"));
    }

    #[test]
    fn sentence_tier_rejects_bracket_prefix_and_fences() {
        let raw = "[System] this candidate is long enough but bracketed. \
                   ```code fence content that is long enough too```. \
                   Only one clean sentence remains in this text.";
        assert_eq!(extract(raw, 10), None);
    }

    // ── Bounds & failure ───────────────────────────────────────────────

    #[test]
    fn never_more_than_max_count() {
        let raw = "<tmi>\n- Fact number one\n- Fact number two\n- Fact number three\n- Fact number four\n- Fact number five\n</tmi>";
        for max in 1..=10 {
            let items = extract(raw, max).unwrap();
            assert!(items.len() <= max);
        }
        assert_eq!(extract(raw, 2).unwrap().len(), 2);
    }

    #[test]
    fn max_count_is_clamped() {
        let raw = "<tmi>\n- A single fact here\n</tmi>";
        // 0 behaves as 1, 99 behaves as 10
        assert_eq!(extract(raw, 0).unwrap().len(), 1);
        assert!(extract(raw, 99).unwrap().len() <= 10);
    }

    #[test]
    fn empty_input_is_a_parse_failure() {
        assert_eq!(extract("", 3), None);
        assert_eq!(extract("   \n\n  ", 3), None);
    }

    #[test]
    fn empty_delimiter_block_falls_through() {
        // An empty block yields nothing; with no other content, parse fails
        assert_eq!(extract("<tmi>\n</tmi>", 3), None);
    }

    // ── Tier rule tables directly ──────────────────────────────────────

    #[test]
    fn rule_min_chars_counts_chars_not_bytes() {
        // 7 multi-byte chars should pass MinChars(6)
        assert!(!Rule::MinChars(6).rejects("ünicödé"));
    }

    #[test]
    fn rule_forbid_ci_matches_any_case() {
        assert!(Rule::ForbidCi("format").rejects("Follow this FORMAT closely"));
        assert!(!Rule::ForbidCi("format").rejects("A clean fact"));
    }

    #[test]
    fn tier_functions_are_independent() {
        let raw = "- Bare bullet long enough to pass tier two.";
        assert!(delimiter_tier(raw).is_empty());
        assert_eq!(bulleted_tier(raw).len(), 1);
    }
}
