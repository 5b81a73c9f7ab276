//! System instruction assembly
//!
//! Merges the persona text with the active document, if any.

use crate::llm::prompts::GROUNDING_INSTRUCTION;

/// Build the effective system instruction for one turn.
///
/// Without a document (or with an empty one) the persona is returned as is.
/// Otherwise the persona comes first, then the grounding instruction, then
/// the document verbatim between `---` delimiters.
pub fn build_system_instruction(persona: &str, document: Option<&str>) -> String {
    match document {
        Some(document) if !document.is_empty() => format!(
            "{}\n\n{}\n\nContext:\n---\n{}\n---",
            persona, GROUNDING_INSTRUCTION, document
        ),
        _ => persona.to_string(),
    }
}
