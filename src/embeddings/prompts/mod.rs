
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of generation templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// No retrieved context; answer from general knowledge
    Plain,
    /// Answer grounded in chunks retrieved from the persistent collection
    DocumentGrounded,
    /// Answer strictly from one document supplied with the request
    FileSpecific,
}

impl fmt::Display for PromptKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::DocumentGrounded => "document_grounded",
            Self::FileSpecific => "file_specific",
        })
    }
}

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Render the prompt for `kind`; context chunks are joined by blank lines
#[inline]
pub fn render(kind: PromptKind, query: &str, context: &[String]) -> String {
    let context = context.iter().join(CONTEXT_SEPARATOR);

    match kind {
        PromptKind::Plain => format!(
            "You are a helpful AI assistant. Answer the user's question.\n\n\
             User Question: {query}\n\n\
             Please provide a clear, accurate, and helpful response."
        ),
        PromptKind::DocumentGrounded => format!(
            "You are a helpful AI assistant. Use the following context to answer the user's question.\n\
             If the context doesn't contain relevant information, you can use your general knowledge, \
             but prioritize the provided context.\n\n\
             Context:\n{context}\n\n\
             User Question: {query}\n\n\
             Please provide a clear, accurate, and helpful response based on the context provided."
        ),
        PromptKind::FileSpecific => format!(
            "You are a helpful AI assistant. The user is asking about a specific document.\n\
             Answer their question based ONLY on the content of that document provided below.\n\n\
             Document Content:\n{context}\n\n\
             User Question: {query}\n\n\
             If the document doesn't contain information relevant to the question, say so."
        ),
    }
}
