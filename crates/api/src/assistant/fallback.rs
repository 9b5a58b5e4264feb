//! Canned replies used when the model is unavailable

use super::conversation::{user_messages, ConversationTurn};

/// A static reply and whether it should open a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CannedReply {
    pub text: &'static str,
    pub needs_ticket: bool,
}

struct Topic {
    keywords: &'static [&'static str],
    reply: CannedReply,
}

const TOPICS: &[Topic] = &[
    Topic {
        keywords: &["order", "orders", "shipping", "shipped", "delivery", "deliver", "delivered", "tracking", "track", "package", "parcel"],
        reply: CannedReply {
            text: "I can help with your order. You can follow its status under My Orders in your account, and tracking details are emailed as soon as it ships. If something still looks wrong, please share your order number.",
            needs_ticket: false,
        },
    },
    Topic {
        keywords: &["refund", "refunds", "return", "returns", "exchange", "damaged", "broken", "defective"],
        reply: CannedReply {
            text: "We accept returns within 30 days of delivery. Start a return from My Orders, and refunds are issued to the original payment method within 5-7 business days after we receive the item.",
            needs_ticket: false,
        },
    },
    Topic {
        keywords: &["payment", "payments", "charge", "charged", "billing", "card", "invoice", "paid"],
        reply: CannedReply {
            text: "For payment questions, please check that your card details and billing address are up to date. Pending charges from failed payments usually drop off within a few business days.",
            needs_ticket: false,
        },
    },
    Topic {
        keywords: &["password", "login", "account", "sign in", "log in", "signin", "email"],
        reply: CannedReply {
            text: "If you can't get into your account, use the Forgot Password link on the login page to reset your password. Make sure you're using the email address you signed up with.",
            needs_ticket: false,
        },
    },
    Topic {
        keywords: &["hello", "hi", "hey", "thanks", "thank you"],
        reply: CannedReply {
            text: "Hello! I'm the store assistant. Ask me about orders, shipping, returns, payments, or your account.",
            needs_ticket: false,
        },
    },
];

/// Reply used when nothing more specific matches
pub const GENERIC_FALLBACK: CannedReply = CannedReply {
    text: "I'm having trouble answering right now. I've passed your conversation to our support team, and someone will follow up with you shortly.",
    needs_ticket: true,
};

/// Subject used when no user message is available
pub const DEFAULT_SUBJECT: &str = "Customer support request";

/// Lowercase words separated by single spaces, padded for phrase matching
fn normalize(text: &str) -> String {
    let words: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    format!(" {} ", words.join(" "))
}

/// Pick a canned reply by keyword matching on the user's last message
pub fn canned_reply(last_user_message: &str) -> CannedReply {
    let normalized = normalize(last_user_message);

    TOPICS
        .iter()
        .find(|topic| {
            topic
                .keywords
                .iter()
                .any(|keyword| normalized.contains(&format!(" {} ", keyword)))
        })
        .map(|topic| topic.reply)
        .unwrap_or(GENERIC_FALLBACK)
}

/// Subject derived from the conversation itself, for when the model can't write one
pub fn fallback_subject(history: &[ConversationTurn]) -> String {
    let first = user_messages(history)
        .find(|m| !super::escalation::is_ticket_request(m))
        .or_else(|| user_messages(history).next());

    match first {
        Some(message) => super::responder::truncate_subject(message),
        None => DEFAULT_SUBJECT.to_string(),
    }
}
