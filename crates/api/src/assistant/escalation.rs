//! Ticket escalation detection
//!
//! The model signals escalation in its own words; a ticket is only worth
//! opening once the customer has actually described a problem.

use super::conversation::{user_messages, ConversationTurn};

/// Phrases in a model response that mean "this goes to a ticket"
///
/// Only the create/open forms count; passing mentions of tickets do not.
pub const ESCALATION_PHRASES: &[&str] = &[
    "create a ticket",
    "created a ticket",
    "creating a ticket",
    "open a ticket",
    "opened a ticket",
    "opening a ticket",
];

/// Phrases in a user message that only ask for a ticket
pub const TICKET_REQUEST_PHRASES: &[&str] = &[
    "create a ticket",
    "open a ticket",
    "make a ticket",
    "raise a ticket",
    "submit a ticket",
    "file a ticket",
    "new ticket",
    "talk to a human",
    "speak to a human",
    "talk to an agent",
    "speak to an agent",
    "real person",
];

/// A user message must be longer than this to count as a problem description
pub const MIN_DESCRIPTION_CHARS: usize = 50;

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    let text = text.to_lowercase();
    phrases.iter().any(|phrase| text.contains(phrase))
}

/// Whether the model response talks about opening a ticket
pub fn response_mentions_ticket(response: &str) -> bool {
    contains_any(response, ESCALATION_PHRASES)
}

/// Whether a user message is a bare request for a ticket or a human
pub fn is_ticket_request(message: &str) -> bool {
    contains_any(message, TICKET_REQUEST_PHRASES)
}

/// Whether some user message describes an issue in enough detail
pub fn has_issue_description(history: &[ConversationTurn]) -> bool {
    user_messages(history)
        .any(|message| message.chars().count() > MIN_DESCRIPTION_CHARS && !is_ticket_request(message))
}

/// Escalate only when the model suggests a ticket and the customer explained the problem
pub fn needs_ticket(response: &str, history: &[ConversationTurn]) -> bool {
    response_mentions_ticket(response) && has_issue_description(history)
}
