//! Conversation turns and the Llama-2 chat prompt they flatten into.

use log::debug;
use serde::{Deserialize, Serialize};

/// One labelled message of a conversation.
///
/// On the wire a turn is `{"role": ..., "content": ...}`. Roles other than
/// system / human / assistant are kept as [`ConversationTurn::Unrecognized`]
/// so they can be skipped instead of rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireTurn", into = "WireTurn")]
pub enum ConversationTurn {
    System(String),
    Human(String),
    Assistant(String),
    Unrecognized { role: String, content: String },
}

impl ConversationTurn {
    pub fn system(text: impl Into<String>) -> Self {
        Self::System(text.into())
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self::Human(text.into())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant(text.into())
    }

    pub fn role(&self) -> &str {
        match self {
            Self::System(_) => "system",
            Self::Human(_) => "human",
            Self::Assistant(_) => "assistant",
            Self::Unrecognized { role, .. } => role.as_str(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System(c) | Self::Human(c) | Self::Assistant(c) => c.as_str(),
            Self::Unrecognized { content, .. } => content.as_str(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireTurn {
    role: String,
    #[serde(default)]
    content: String,
}

impl From<WireTurn> for ConversationTurn {
    fn from(w: WireTurn) -> Self {
        match w.role.to_ascii_lowercase().as_str() {
            "system" => Self::System(w.content),
            "human" | "user" => Self::Human(w.content),
            "assistant" | "ai" => Self::Assistant(w.content),
            _ => Self::Unrecognized {
                role: w.role,
                content: w.content,
            },
        }
    }
}

impl From<ConversationTurn> for WireTurn {
    fn from(t: ConversationTurn) -> Self {
        WireTurn {
            role: t.role().to_string(),
            content: t.content().to_string(),
        }
    }
}

/// Flatten turns into one Llama-2 chat prompt, in order.
pub fn build_prompt(turns: &[ConversationTurn]) -> String {
    let mut prompt = String::new();
    for turn in turns {
        match turn {
            ConversationTurn::System(text) => {
                prompt.push_str(&format!("[INST] <<SYS>>\n{text}\n<</SYS>>\n\n"));
            }
            ConversationTurn::Human(text) => {
                prompt.push_str(&format!("{text} [/INST]"));
            }
            // earlier model turns are echoed back and the instruction reopened
            ConversationTurn::Assistant(text) => {
                prompt.push_str(&format!("{text} [INST]"));
            }
            ConversationTurn::Unrecognized { role, .. } => {
                debug!("skipping turn with unrecognized role {role:?}");
            }
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_then_human() {
        let prompt = build_prompt(&[
            ConversationTurn::system("be terse"),
            ConversationTurn::human("hi"),
        ]);
        assert_eq!(prompt, "[INST] <<SYS>>\nbe terse\n<</SYS>>\n\nhi [/INST]");
    }

    #[test]
    fn assistant_turn_reopens_instruction() {
        let prompt = build_prompt(&[
            ConversationTurn::human("move?"),
            ConversationTurn::assistant("e4"),
            ConversationTurn::human("again"),
        ]);
        assert_eq!(prompt, "move? [/INST]e4 [INST]again [/INST]");
    }

    #[test]
    fn unrecognized_roles_are_skipped() {
        let turns: Vec<ConversationTurn> = serde_json::from_str(
            r#"[{"role": "tool", "content": "ignored"}, {"role": "user", "content": "hi"}]"#,
        )
        .unwrap();
        assert!(matches!(turns[0], ConversationTurn::Unrecognized { .. }));
        assert_eq!(build_prompt(&turns), "hi [/INST]");
    }

    #[test]
    fn roles_round_trip_through_json() {
        let turns: Vec<ConversationTurn> = serde_json::from_str(
            r#"[{"role": "System", "content": "s"}, {"role": "ai", "content": "a"}]"#,
        )
        .unwrap();
        assert_eq!(
            turns,
            [ConversationTurn::system("s"), ConversationTurn::assistant("a")]
        );
        let back = serde_json::to_value(&turns[1]).unwrap();
        assert_eq!(back, serde_json::json!({"role": "assistant", "content": "a"}));
    }
}
