//! Fixed instructions sent to the language model.

use docrag_core::RetrievedChunk;

/// System instruction for every answer.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant who answers questions based on the context extracted from the document.";

/// Answer returned without calling the model when retrieval found nothing.
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant excerpts were retrieved from the document, hence I can't answer your query.";

/// Separator between retrieved chunks in the context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Join retrieved chunk texts, best match first.
#[must_use]
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Fill the question-answering template.
#[must_use]
pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "Use the following context from the document to answer the question regarding the document. \n    \
         If you don't know the answer, say you don't know.\n    \n    \
         Context: {context}\n    \n    \
         Question: {query}\n    \
         Answer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(text: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            page: None,
            score,
        }
    }

    #[test]
    fn test_context_keeps_retrieval_order() {
        let chunks = vec![chunk("best", 0.9), chunk("second", 0.8), chunk("third", 0.1)];
        assert_eq!(build_context(&chunks), "best\n\nsecond\n\nthird");
    }

    #[test]
    fn test_context_of_nothing_is_empty() {
        assert!(build_context(&[]).is_empty());
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("Revenue grew 12%.", "How did revenue change?");
        let lines: Vec<&str> = prompt.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Use the following context from the document to answer the question regarding the document. ",
                "    If you don't know the answer, say you don't know.",
                "    ",
                "    Context: Revenue grew 12%.",
                "    ",
                "    Question: How did revenue change?",
                "    Answer:",
            ]
        );
    }
}
