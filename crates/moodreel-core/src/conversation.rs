//! Terms-gated conversation state machine.
//!
//! `transition` is pure: it never touches the session store or the network.
//! The gateway applies the returned state and carries out the action.

use serde::{Deserialize, Serialize};

use crate::messages::{self, Reply};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    AwaitingTerms,
    AwaitingMood,
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationState::AwaitingTerms => write!(f, "awaiting_terms"),
            ConversationState::AwaitingMood => write!(f, "awaiting_mood"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Start { sender_name: Option<String> },
    /// Any slash command other than /start
    Command(String),
    Text(String),
}

/// Classify raw message text. `/start@SomeBot` and trailing arguments are
/// accepted the way Telegram clients send them in groups.
pub fn parse_input(text: &str, sender_name: Option<&str>) -> Input {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return Input::Text(text.to_string());
    }

    let cmd = trimmed.split_whitespace().next().unwrap_or(trimmed);
    let cmd = cmd.split('@').next().unwrap_or(cmd).to_lowercase();
    match cmd.as_str() {
        "/start" => Input::Start {
            sender_name: sender_name.map(str::to_string),
        },
        _ => Input::Command(cmd),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reply(Reply),
    /// Hand the text to the recommender and send whatever it produces
    Recommend(String),
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State after this input. `None` only when there was no session and
    /// none should be created.
    pub next: Option<ConversationState>,
    pub action: Action,
}

pub fn transition(
    current: Option<ConversationState>,
    input: &Input,
    acceptance_token: &str,
) -> Transition {
    match (current, input) {
        (_, Input::Start { sender_name }) => Transition {
            next: Some(ConversationState::AwaitingTerms),
            action: Action::Reply(messages::greeting(
                sender_name.as_deref(),
                acceptance_token,
            )),
        },
        (state, Input::Command(_)) => Transition {
            next: state,
            action: Action::Ignore,
        },
        (None, Input::Text(_)) => Transition {
            next: None,
            action: Action::Reply(messages::start_hint()),
        },
        (Some(ConversationState::AwaitingTerms), Input::Text(text)) => {
            if contains_token(text, acceptance_token) {
                Transition {
                    next: Some(ConversationState::AwaitingMood),
                    action: Action::Reply(messages::mood_prompt()),
                }
            } else {
                Transition {
                    next: Some(ConversationState::AwaitingTerms),
                    action: Action::Reply(messages::accept_reminder(acceptance_token)),
                }
            }
        }
        (Some(ConversationState::AwaitingMood), Input::Text(text)) => Transition {
            next: Some(ConversationState::AwaitingMood),
            action: Action::Recommend(text.clone()),
        },
    }
}

fn contains_token(text: &str, token: &str) -> bool {
    let token = token.trim().to_lowercase();
    !token.is_empty() && text.to_lowercase().contains(&token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "accept";

    fn text(s: &str) -> Input {
        Input::Text(s.to_string())
    }

    fn start() -> Input {
        Input::Start {
            sender_name: Some("Ana".into()),
        }
    }

    #[test]
    fn parse_start_variants() {
        assert!(matches!(parse_input("/start", None), Input::Start { .. }));
        assert!(matches!(parse_input("  /START  ", None), Input::Start { .. }));
        assert!(matches!(
            parse_input("/start@moodreel_bot", None),
            Input::Start { .. }
        ));
        assert!(matches!(parse_input("/start deep-link", None), Input::Start { .. }));
    }

    #[test]
    fn parse_start_carries_sender_name() {
        assert_eq!(
            parse_input("/start", Some("Ana")),
            Input::Start {
                sender_name: Some("Ana".into())
            }
        );
    }

    #[test]
    fn parse_other_commands_and_text() {
        assert_eq!(parse_input("/help", None), Input::Command("/help".into()));
        assert_eq!(parse_input("I accept", None), text("I accept"));
        assert_eq!(parse_input("restart /start", None), text("restart /start"));
    }

    #[test]
    fn start_from_nothing_enters_terms() {
        let t = transition(None, &start(), TOKEN);
        assert_eq!(t.next, Some(ConversationState::AwaitingTerms));
        let Action::Reply(reply) = t.action else {
            panic!("expected reply");
        };
        assert!(reply.to_plain_text().starts_with("Hi, Ana!"));
    }

    #[test]
    fn start_mid_flow_resets_to_terms() {
        let t = transition(Some(ConversationState::AwaitingMood), &start(), TOKEN);
        assert_eq!(t.next, Some(ConversationState::AwaitingTerms));
    }

    #[test]
    fn acceptance_token_is_case_insensitive_substring() {
        for msg in ["accept", "ACCEPT", "ok, I Accept the terms", "accepted"] {
            let t = transition(Some(ConversationState::AwaitingTerms), &text(msg), TOKEN);
            assert_eq!(t.next, Some(ConversationState::AwaitingMood), "{msg}");
            assert_eq!(t.action, Action::Reply(messages::mood_prompt()));
        }
    }

    #[test]
    fn other_text_in_terms_reprompts() {
        for msg in ["yes", "sure", "acept", ""] {
            let t = transition(Some(ConversationState::AwaitingTerms), &text(msg), TOKEN);
            assert_eq!(t.next, Some(ConversationState::AwaitingTerms), "{msg}");
            assert_eq!(t.action, Action::Reply(messages::accept_reminder(TOKEN)));
        }
    }

    #[test]
    fn mood_state_recommends_and_stays() {
        let t = transition(Some(ConversationState::AwaitingMood), &text("I'm sad"), TOKEN);
        assert_eq!(t.next, Some(ConversationState::AwaitingMood));
        assert_eq!(t.action, Action::Recommend("I'm sad".into()));
    }

    #[test]
    fn accept_in_mood_state_is_just_text() {
        let t = transition(Some(ConversationState::AwaitingMood), &text("accept"), TOKEN);
        assert_eq!(t.action, Action::Recommend("accept".into()));
    }

    #[test]
    fn text_without_session_hints_start_and_creates_nothing() {
        let t = transition(None, &text("accept"), TOKEN);
        assert_eq!(t.next, None);
        assert_eq!(t.action, Action::Reply(messages::start_hint()));
    }

    #[test]
    fn unknown_commands_are_ignored() {
        for state in [
            None,
            Some(ConversationState::AwaitingTerms),
            Some(ConversationState::AwaitingMood),
        ] {
            let t = transition(state, &Input::Command("/help".into()), TOKEN);
            assert_eq!(t.next, state);
            assert_eq!(t.action, Action::Ignore);
        }
    }

    #[test]
    fn custom_token() {
        let t = transition(Some(ConversationState::AwaitingTerms), &text("Aceito!"), "aceito");
        assert_eq!(t.next, Some(ConversationState::AwaitingMood));
    }

    #[test]
    fn state_display() {
        assert_eq!(ConversationState::AwaitingTerms.to_string(), "awaiting_terms");
        assert_eq!(ConversationState::AwaitingMood.to_string(), "awaiting_mood");
    }
}
