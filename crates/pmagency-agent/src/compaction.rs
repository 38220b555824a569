//! Prompt trimming -- keep each request inside a token budget.
//!
//! Histories in an agency grow without bound (threads persist for the life of
//! the process), so before every request the runtime trims the history it
//! sends:
//!
//! 1. System messages are always kept.
//! 2. Everything from the most recent user message onward is always kept.
//! 3. Older messages are grouped so an assistant tool-call message stays with
//!    its tool results, then added back newest-first while they fit.
//!
//! Token counts are estimates (`chars / 4` plus a fixed per-message overhead);
//! they only need to be good enough to stay clear of the context window.

use tracing::{debug, warn};

use crate::llm::types::{Message, Role};

/// Fixed cost charged for every message (role, separators, call ids).
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Rough token estimate for one message.
pub fn estimate_tokens(message: &Message) -> usize {
    let mut chars = message.content.chars().count();
    for call in &message.tool_calls {
        chars += call.name.len() + call.arguments_json().len();
    }
    chars / 4 + MESSAGE_OVERHEAD_TOKENS
}

/// Estimate for a slice of messages.
pub fn estimate_total(messages: &[Message]) -> usize {
    messages.iter().map(estimate_tokens).sum()
}

/// Return the messages that fit in `budget` tokens, in original order.
///
/// System messages and the latest user turn are mandatory; if they alone
/// exceed the budget they are still returned and a warning is logged.
pub fn trim_to_token_budget(messages: &[Message], budget: usize) -> Vec<Message> {
    if estimate_total(messages) <= budget {
        return messages.to_vec();
    }

    let tail_start = messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .unwrap_or(messages.len());

    let mut keep = vec![false; messages.len()];
    let mut used = 0usize;
    for (i, m) in messages.iter().enumerate() {
        if m.role == Role::System || i >= tail_start {
            keep[i] = true;
            used += estimate_tokens(m);
        }
    }

    if used > budget {
        warn!(
            used,
            budget, "system prompt and latest turn exceed the prompt budget"
        );
    } else {
        for group in history_groups(&messages[..tail_start]).into_iter().rev() {
            let cost: usize = group.clone().map(|i| estimate_tokens(&messages[i])).sum();
            if used + cost > budget {
                break;
            }
            used += cost;
            for i in group {
                keep[i] = true;
            }
        }
    }

    let trimmed: Vec<Message> = messages
        .iter()
        .zip(&keep)
        .filter(|(_, k)| **k)
        .map(|(m, _)| m.clone())
        .collect();

    debug!(
        before = messages.len(),
        after = trimmed.len(),
        estimated_tokens = used,
        budget,
        "trimmed prompt history"
    );
    trimmed
}

/// Split non-system history into index ranges that must be kept or dropped
/// together.  An assistant message with tool calls absorbs the tool results
/// that follow it; orphaned tool results form their own group so they are
/// never sent without their call.
fn history_groups(history: &[Message]) -> Vec<std::ops::Range<usize>> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < history.len() {
        match history[i].role {
            Role::System => {
                i += 1;
            }
            Role::Assistant if history[i].has_tool_calls() => {
                let start = i;
                i += 1;
                while i < history.len() && history[i].role == Role::Tool {
                    i += 1;
                }
                groups.push(start..i);
            }
            Role::Tool => {
                // Orphaned result, never re-added on its own.
                i += 1;
            }
            _ => {
                groups.push(i..i + 1);
                i += 1;
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ToolCall;
    use serde_json::json;

    fn long(role_msg: fn(String) -> Message, chars: usize) -> Message {
        role_msg("x".repeat(chars))
    }

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "notion_get_tasks", json!({}))
    }

    #[test]
    fn estimate_counts_chars_and_overhead() {
        assert_eq!(estimate_tokens(&Message::user("abcdefgh")), 2 + MESSAGE_OVERHEAD_TOKENS);
        assert_eq!(estimate_tokens(&Message::user("")), MESSAGE_OVERHEAD_TOKENS);
    }

    #[test]
    fn history_within_budget_is_untouched() {
        let msgs = vec![Message::system("sys"), Message::user("hi")];
        assert_eq!(trim_to_token_budget(&msgs, 1000), msgs);
    }

    #[test]
    fn oldest_messages_are_dropped_first() {
        let msgs = vec![
            Message::system("sys"),
            long(Message::user, 400),
            long(Message::assistant, 400),
            long(Message::user, 40),
            long(Message::assistant, 40),
            Message::user("latest"),
        ];
        // system 4 + latest 5 + two recent 14 each = 37; the old pair costs 208.
        let trimmed = trim_to_token_budget(&msgs, 60);
        assert_eq!(trimmed.len(), 4);
        assert_eq!(trimmed[0].role, Role::System);
        assert_eq!(trimmed[1], msgs[3]);
        assert_eq!(trimmed.last().map(|m| m.content.as_str()), Some("latest"));
    }

    #[test]
    fn tool_calls_stay_with_their_results() {
        let msgs = vec![
            Message::system("sys"),
            Message::user("q1"),
            Message::assistant_tool_calls(vec![call("c1")]),
            long(|s| Message::tool_result("c1", s), 400),
            Message::assistant("a1"),
            Message::user("q2"),
        ];
        let trimmed = trim_to_token_budget(&msgs, 40);
        assert!(trimmed.iter().all(|m| !m.has_tool_calls()));
        assert!(trimmed.iter().all(|m| m.role != Role::Tool));
        assert_eq!(trimmed.last().map(|m| m.content.as_str()), Some("q2"));
    }

    #[test]
    fn latest_turn_is_kept_even_over_budget() {
        let msgs = vec![
            Message::system("sys"),
            Message::user("old"),
            long(Message::user, 4000),
            Message::assistant_tool_calls(vec![call("c2")]),
            Message::tool_result("c2", "ok"),
        ];
        let trimmed = trim_to_token_budget(&msgs, 10);
        assert_eq!(trimmed.len(), 4);
        assert_eq!(trimmed[1].content.len(), 4000);
        assert_eq!(trimmed[3].role, Role::Tool);
    }
}
