//! Rolling conversation transcript.
//!
//! Append-only turn sequence owned by the session. Only the most recent
//! turns are forwarded to the reasoning service to bound prompt size.

use serde::{Deserialize, Serialize};

/// How many trailing turns are forwarded to the reasoning service.
pub const RECENT_TURN_WINDOW: usize = 10;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Append-only transcript. Turns are appended only after a submission
/// fully completes, so two concurrent sends are not representable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role: Role::User,
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The trailing window forwarded to the reasoning service.
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Content of the most recent user turn, if any.
    pub fn latest_user(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }

    /// Plain "role: content" rendering used inside planner prompts.
    pub fn render_recent(&self, n: usize) -> String {
        let mut out = String::new();
        for turn in self.recent(n) {
            out.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_window_is_bounded() {
        let mut transcript = Transcript::new();
        for i in 0..25 {
            transcript.push_user(format!("question {}", i));
        }
        assert_eq!(transcript.recent(RECENT_TURN_WINDOW).len(), 10);
        assert_eq!(
            transcript.recent(RECENT_TURN_WINDOW)[0].content,
            "question 15"
        );
    }

    #[test]
    fn test_latest_user_skips_assistant_turns() {
        let mut transcript = Transcript::new();
        transcript.push_user("why is my pc slow");
        transcript.push_assistant("let me check");
        assert_eq!(transcript.latest_user(), Some("why is my pc slow"));
    }

    #[test]
    fn test_render_recent_format() {
        let mut transcript = Transcript::new();
        transcript.push_user("hello");
        transcript.push_assistant("hi");
        let rendered = transcript.render_recent(10);
        assert_eq!(rendered, "user: hello\nassistant: hi\n");
    }
}
