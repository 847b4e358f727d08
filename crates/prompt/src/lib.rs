//! Instruction composer — renders the generation prompt.
//!
//! The instruction deliberately over-specifies the output format: model
//! outputs are unreliable, so the wrapper contract, the exact count, the
//! per-line bullet form, and the "nothing outside the tags" constraint are
//! each stated separately to maximize first-pass parseability. The
//! extractor still tolerates violations of every one of them.

use std::fmt::Write;

use tidbit_config::PromptConfig;

/// The opening delimiter the model is instructed to emit.
pub const OPEN_TAG: &str = "<tmi>";
/// The closing delimiter the model is instructed to emit.
pub const CLOSE_TAG: &str = "</tmi>";

/// Compose the full generation instruction.
///
/// Layout, in order:
/// 1. the free-text directive (variable substitution is the host's job)
/// 2. an optional language directive
/// 3. the literal structural instruction showing the delimiter wrapper
/// 4. requirements restating the exact fact count and length hint
/// 5. the constraint forbidding text outside the delimiter pair
///
/// Deterministic: identical inputs render identical strings.
pub fn compose(directive: &str, config: &PromptConfig) -> String {
    let mut prompt = String::with_capacity(directive.len() + 512);
    prompt.push_str(directive.trim_end());

    if let Some(language) = config.language.as_deref().filter(|l| !l.trim().is_empty()) {
        let _ = write!(prompt, "\n\nWrite in {}.", language.trim());
    }

    let _ = write!(
        prompt,
        "\n\n\
        CRITICAL FORMAT - You MUST use this EXACT structure:\n\
        {OPEN_TAG}\n\
        - Fact 1 here\n\
        - Fact 2 here\n\
        - Fact 3 here\n\
        {CLOSE_TAG}\n\
        \n\
        Requirements:\n\
        - Generate exactly {count} TMI facts\n\
        - Length per fact: {hint}\n\
        - MUST start with {OPEN_TAG} and end with {CLOSE_TAG}\n\
        - Each fact on a new line starting with \"- \"\n\
        - NO other text outside the tags",
        count = config.fact_count,
        hint = config.length.sentence_hint(),
    );

    prompt
}
