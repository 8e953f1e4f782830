use crate::{AssistOutcome, Assistant};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Conversation about the current document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatSession {
    history: Vec<ChatTurn>,
    max_context_chars: usize,
}

impl ChatSession {
    pub fn new(max_context_chars: usize) -> Self {
        Self { history: Vec::new(), max_context_chars }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Asks about `document_text`. Only successful exchanges are added to the history.
    pub fn send(
        &mut self,
        assistant: &dyn Assistant,
        message: &str,
        document_text: &str,
    ) -> AssistOutcome {
        let context = truncate_context(document_text, self.max_context_chars);
        debug!(
            context_chars = context.chars().count(),
            history = self.history.len(),
            "sending chat message"
        );

        let outcome = AssistOutcome::from_result(assistant.chat(message, context, &self.history));
        if let AssistOutcome::Completed { text } = &outcome {
            self.history.push(ChatTurn { speaker: Speaker::User, text: message.to_owned() });
            self.history.push(ChatTurn { speaker: Speaker::Assistant, text: text.clone() });
        }

        outcome
    }
}

/// First `max_chars` characters of `text`.
pub fn truncate_context(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
