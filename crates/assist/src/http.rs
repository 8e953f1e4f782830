use crate::{AssistError, Assistant, AssistantSettings, ChatTurn, RewriteInstruction, Speaker};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct HttpAssistant {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self { role: role.to_owned(), content: content.into() }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

impl HttpAssistant {
    /// Reads the API key from the configured environment variable.
    pub fn from_settings(settings: &AssistantSettings) -> Self {
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|key| !key.is_empty());
        Self {
            agent: ureq::agent(),
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key_env: settings.api_key_env.clone(),
            api_key,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn complete(&self, messages: Vec<Message>) -> Result<String, AssistError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AssistError::MissingApiKey { var: self.api_key_env.clone() })?;

        let body = serde_json::to_string(&CompletionRequest { model: &self.model, messages })
            .map_err(|e| AssistError::InvalidResponse(e.to_string()))?;

        debug!(endpoint = %self.endpoint, model = %self.model, "requesting completion");
        let resp = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {api_key}"))
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(|e| match e {
                ureq::Error::Status(status, resp) => AssistError::Service {
                    status,
                    message: resp.into_string().unwrap_or_default(),
                },
                other => AssistError::Network(other.to_string()),
            })?;

        let body = resp.into_string().map_err(|e| AssistError::InvalidResponse(e.to_string()))?;
        parse_reply(&body)
    }
}

impl Assistant for HttpAssistant {
    fn rewrite(&self, text: &str, instruction: RewriteInstruction) -> Result<String, AssistError> {
        self.complete(rewrite_messages(text, instruction))
    }

    fn chat(&self, message: &str, context: &str, history: &[ChatTurn]) -> Result<String, AssistError> {
        self.complete(chat_messages(message, context, history))
    }
}

fn rewrite_messages(text: &str, instruction: RewriteInstruction) -> Vec<Message> {
    vec![
        Message::new(
            "system",
            format!("{} Reply with the rewritten text only.", instruction.prompt()),
        ),
        Message::new("user", text),
    ]
}

fn chat_messages(message: &str, context: &str, history: &[ChatTurn]) -> Vec<Message> {
    let mut messages = vec![Message::new(
        "system",
        format!(
            "You answer questions about the document below.\n\n--- DOCUMENT ---\n{context}\n--- END ---"
        ),
    )];

    messages.extend(history.iter().map(|turn| {
        let role = match turn.speaker {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
        };
        Message::new(role, turn.text.as_str())
    }));
    messages.push(Message::new("user", message));
    messages
}

fn parse_reply(body: &str) -> Result<String, AssistError> {
    let response = serde_json::from_str::<CompletionResponse>(body)
        .map_err(|e| AssistError::InvalidResponse(e.to_string()))?;

    let reply = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_owned())
        .unwrap_or_default();

    if reply.is_empty() {
        return Err(AssistError::EmptyReply);
    }
    Ok(reply)
}
