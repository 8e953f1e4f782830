//! Text rewriting and document Q&A through a hosted language model.
//!
//! Failures are never retried here. They come back as [`AssistOutcome::Failed`] with the
//! service's error text so the caller can show it in place of the result.

use serde::{Deserialize, Serialize};
use tracing::warn;

mod chat;
mod http;

pub use chat::{truncate_context, ChatSession, ChatTurn, Speaker};
pub use http::HttpAssistant;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssistError {
    #[error("network error: {0}")]
    Network(String),
    #[error("service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("service returned an empty reply")]
    EmptyReply,
    #[error("API key variable {var} is not set")]
    MissingApiKey { var: String },
}

/// The fixed set of rewrite operations offered on a selected text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RewriteInstruction {
    Improve,
    FixGrammar,
    Shorten,
    Expand,
    Formal,
    Simplify,
}

impl RewriteInstruction {
    pub const ALL: [Self; 6] =
        [Self::Improve, Self::FixGrammar, Self::Shorten, Self::Expand, Self::Formal, Self::Simplify];

    pub fn key(self) -> &'static str {
        match self {
            Self::Improve => "improve",
            Self::FixGrammar => "fix-grammar",
            Self::Shorten => "shorten",
            Self::Expand => "expand",
            Self::Formal => "formal",
            Self::Simplify => "simplify",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|instruction| instruction.key() == key)
    }

    /// System prompt sent with the text to rewrite.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Improve => "Improve the clarity and flow of the following text. Keep its meaning.",
            Self::FixGrammar => "Correct spelling, grammar and punctuation in the following text.",
            Self::Shorten => "Make the following text shorter while keeping the key points.",
            Self::Expand => "Expand the following text with more detail in the same voice.",
            Self::Formal => "Rewrite the following text in a formal, professional tone.",
            Self::Simplify => "Rewrite the following text in plain, simple language.",
        }
    }
}

/// Hosted rewrite and chat capability.
pub trait Assistant {
    fn rewrite(&self, text: &str, instruction: RewriteInstruction) -> Result<String, AssistError>;

    /// `context` is already truncated by the caller.
    fn chat(&self, message: &str, context: &str, history: &[ChatTurn]) -> Result<String, AssistError>;
}

/// Result of one assistant call as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssistOutcome {
    Completed { text: String },
    /// Nothing was changed; `message` is the inline error to display.
    Failed { message: String },
}

impl AssistOutcome {
    pub fn from_result(result: Result<String, AssistError>) -> Self {
        match result {
            Ok(text) => Self::Completed { text },
            Err(err) => {
                warn!(error = %err, "assistant call failed");
                Self::Failed { message: err.to_string() }
            }
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed { text } => Some(text),
            Self::Failed { .. } => None,
        }
    }
}

/// Rewrites `text`; on failure the caller keeps its original text.
pub fn rewrite_text(
    assistant: &dyn Assistant,
    text: &str,
    instruction: RewriteInstruction,
) -> AssistOutcome {
    AssistOutcome::from_result(assistant.rewrite(text, instruction))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    /// Full URL of an OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub max_context_chars: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            api_key_env: "OPENAI_API_KEY".to_owned(),
            max_context_chars: 12_000,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Scripted assistant that records the calls it receives.
    #[derive(Default)]
    pub(crate) struct ScriptedAssistant {
        pub replies: RefCell<Vec<Result<String, AssistError>>>,
        pub contexts: RefCell<Vec<String>>,
    }

    impl ScriptedAssistant {
        pub(crate) fn replying(replies: Vec<Result<String, AssistError>>) -> Self {
            Self { replies: RefCell::new(replies), contexts: RefCell::default() }
        }

        fn next(&self) -> Result<String, AssistError> {
            let mut replies = self.replies.borrow_mut();
            if replies.is_empty() {
                return Err(AssistError::EmptyReply);
            }
            replies.remove(0)
        }
    }

    impl Assistant for ScriptedAssistant {
        fn rewrite(&self, text: &str, _: RewriteInstruction) -> Result<String, AssistError> {
            self.contexts.borrow_mut().push(text.to_owned());
            self.next()
        }

        fn chat(&self, _: &str, context: &str, _: &[ChatTurn]) -> Result<String, AssistError> {
            self.contexts.borrow_mut().push(context.to_owned());
            self.next()
        }
    }

    #[test]
    fn instruction_keys_round_trip() {
        for instruction in RewriteInstruction::ALL {
            assert_eq!(RewriteInstruction::from_key(instruction.key()), Some(instruction));
        }
        assert_eq!(RewriteInstruction::from_key("translate"), None);
    }

    #[test]
    fn failed_rewrite_reports_the_service_error() {
        let assistant = ScriptedAssistant::replying(vec![Err(AssistError::Service {
            status: 503,
            message: "overloaded".to_owned(),
        })]);

        let outcome = rewrite_text(&assistant, "Draft text", RewriteInstruction::Shorten);

        assert_eq!(
            outcome,
            AssistOutcome::Failed { message: "service returned 503: overloaded".to_owned() }
        );
        assert_eq!(outcome.text(), None);
    }

    #[test]
    fn successful_rewrite_returns_text() {
        let assistant = ScriptedAssistant::replying(vec![Ok("Short.".to_owned())]);

        let outcome = rewrite_text(&assistant, "A much longer draft.", RewriteInstruction::Shorten);
        assert_eq!(outcome.text(), Some("Short."));
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: AssistantSettings =
            serde_json::from_str(r#"{ "model": "local-model" }"#).expect("settings should parse");

        assert_eq!(settings.model, "local-model");
        assert_eq!(settings.max_context_chars, 12_000);
        assert_eq!(settings.api_key_env, "OPENAI_API_KEY");
    }
}
