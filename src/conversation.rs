use crate::chart::ChartSpec;
use crate::Copilot;
use serde::{Deserialize, Serialize};

pub const GREETING: &str = "How can I help you analyze the latest financials?";

pub const SAMPLE_QUESTIONS: [&str; 4] = [
    "What was June 2025 revenue vs budget in USD?",
    "Show Gross Margin % trend for the last 6 months.",
    "Break down Opex by category for May 2025.",
    "What is our cash runway right now?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub chart: Option<ChartSpec>,
}

/// Message history for one chat session. It is display state only: every
/// question is answered from scratch and earlier turns are never consulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage {
                role: Role::Assistant,
                content: GREETING.to_string(),
                chart: None,
            }],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Records the question, answers it, records and returns the answer.
    pub fn ask(&mut self, copilot: &Copilot, query: &str) -> &ChatMessage {
        self.messages.push(ChatMessage {
            role: Role::User,
            content: query.to_string(),
            chart: None,
        });

        let response = copilot.answer(query);
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: response.text,
            chart: response.chart,
        });

        &self.messages[self.messages.len() - 1]
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CopilotConfig;

    #[test]
    fn test_new_conversation_starts_with_greeting() {
        let conversation = Conversation::new();
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::Assistant);
        assert_eq!(conversation.messages()[0].content, GREETING);
    }

    #[test]
    fn test_ask_records_both_turns() {
        let copilot = Copilot::new(CopilotConfig::with_data_source(
            "/definitely/not/here/data.json",
        ));
        let mut conversation = Conversation::new();

        let reply = conversation.ask(&copilot, SAMPLE_QUESTIONS[3]).clone();
        assert_eq!(reply.role, Role::Assistant);
        assert!(reply.content.starts_with("Error loading data:"));

        let messages = conversation.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, SAMPLE_QUESTIONS[3]);

        conversation.clear();
        assert_eq!(conversation.messages().len(), 1);
    }
}
