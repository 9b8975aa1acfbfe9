// Context assembly
// Formats similarity matches for the downstream answer-generation call


use itertools::Itertools;

use crate::database::QueryMatch;

/// Separator placed between rendered matches
pub const BLOCK_SEPARATOR: &str = "\n\n";

const ASSISTANT_INSTRUCTIONS: &str = "You are a smart study assistant.
- You ALWAYS format your answers in nice Markdown.
- Use **bold** for key terms.
- Use lists for steps.
- Use LaTeX for math equations (wrap inline math in $...$ and block math in $$...$$).
- Answer ONLY using the context below.";

const EMPTY_CONTEXT_INSTRUCTION: &str = "- The context is empty: no uploaded material covers this question. \
Say so politely instead of answering from general knowledge.";

/// Render one match as `Source: <document>\nContent: <text>`
#[inline]
pub fn render_match(item: &QueryMatch) -> String {
    format!(
        "Source: {}\nContent: {}",
        item.metadata.document_name, item.metadata.text
    )
}

/// Render `matches` in the order given, separated by blank lines.
///
/// No matches yields an empty string.
#[inline]
pub fn assemble(matches: &[QueryMatch]) -> String {
    matches.iter().map(render_match).join(BLOCK_SEPARATOR)
}

/// System prompt for the generation model with `context` appended
#[inline]
pub fn system_prompt(context: &str) -> String {
    if context.is_empty() {
        format!(
            "{}\n{}\n\nContext:\n",
            ASSISTANT_INSTRUCTIONS, EMPTY_CONTEXT_INSTRUCTION
        )
    } else {
        format!("{}\n\nContext:\n{}", ASSISTANT_INSTRUCTIONS, context)
    }
}
