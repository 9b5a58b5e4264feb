//! Chat assistant responder
//!
//! Turns a conversation into a reply, decides whether it should become a
//! support ticket, and writes the ticket subject.

use std::sync::Arc;

use serde::Serialize;

use super::conversation::{format_history, last_user_message, ConversationTurn};
use super::escalation::needs_ticket;
use super::fallback::{canned_reply, fallback_subject};
use super::model::ChatModel;
use super::retry::{with_retry, RetryPolicy};

/// Maximum ticket subject length (characters)
pub const MAX_SUBJECT_CHARS: usize = 100;

const SYSTEM_PROMPT: &str = "You are the customer support assistant for an online store. \
Answer questions about orders, shipping, returns, refunds, payments and accounts in a friendly, \
concise way. Never invent order details you were not given. If the customer's problem needs \
follow-up from staff (damaged or missing items, billing errors, account lockouts you cannot \
resolve), tell them you will create a ticket for our support team.";

const SUBJECT_PROMPT: &str = "Write a short subject line (at most 10 words) summarizing the \
customer's issue in the support conversation below. Reply with the subject line only, without \
quotes or punctuation at the end.";

/// Outcome of a responder run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantReply {
    pub response: String,
    pub needs_ticket: bool,
    /// Generated subject; present whenever `needs_ticket` is true
    pub subject: Option<String>,
    /// True when the reply is a canned fallback rather than model output
    pub fallback: bool,
}

/// AI responder over a [`ChatModel`]
#[derive(Clone)]
pub struct Responder {
    model: Arc<dyn ChatModel>,
    retry: RetryPolicy,
}

impl Responder {
    pub fn new(model: Arc<dyn ChatModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    /// Produce a reply for the conversation so far
    pub async fn respond(&self, history: &[ConversationTurn]) -> AssistantReply {
        let prompt = format!(
            "{}\n\nConversation so far:\n{}\nAssistant:",
            SYSTEM_PROMPT,
            format_history(history)
        );

        match with_retry(self.retry, "generate_response", || self.model.generate(&prompt)).await {
            Ok(response) => {
                let needs_ticket = needs_ticket(&response, history);
                let subject = if needs_ticket {
                    Some(self.generate_subject(history).await)
                } else {
                    None
                };

                tracing::info!(needs_ticket, "Assistant reply generated");

                AssistantReply {
                    response,
                    needs_ticket,
                    subject,
                    fallback: false,
                }
            }
            Err(e) => {
                let canned = canned_reply(last_user_message(history).unwrap_or_default());
                tracing::warn!(
                    error = %e,
                    retryable = e.is_retryable(),
                    needs_ticket = canned.needs_ticket,
                    "Model unavailable, using canned reply"
                );

                AssistantReply {
                    response: canned.text.to_string(),
                    needs_ticket: canned.needs_ticket,
                    // The model just failed; don't spend another retry loop on a subject
                    subject: canned.needs_ticket.then(|| fallback_subject(history)),
                    fallback: true,
                }
            }
        }
    }

    /// Ask the model for a ticket subject, at most [`MAX_SUBJECT_CHARS`] long
    pub async fn generate_subject(&self, history: &[ConversationTurn]) -> String {
        let prompt = format!("{}\n\n{}", SUBJECT_PROMPT, format_history(history));

        match with_retry(self.retry, "generate_subject", || self.model.generate(&prompt)).await {
            Ok(raw) => clean_subject(&raw).unwrap_or_else(|| fallback_subject(history)),
            Err(e) => {
                tracing::warn!(error = %e, "Subject generation failed, deriving from conversation");
                fallback_subject(history)
            }
        }
    }
}

/// First line of model output with wrapping quotes removed, truncated
pub fn clean_subject(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .trim_start_matches(|c| c == '"' || c == '\'' || c == '*')
        .trim_end_matches(|c| c == '"' || c == '\'' || c == '*')
        .trim();
    let line = line.strip_prefix("Subject:").unwrap_or(line).trim();

    if line.is_empty() {
        None
    } else {
        Some(truncate_subject(line))
    }
}

/// Truncate to [`MAX_SUBJECT_CHARS`] characters
pub fn truncate_subject(subject: &str) -> String {
    subject.trim().chars().take(MAX_SUBJECT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::fallback::GENERIC_FALLBACK;
    use crate::assistant::model::ModelError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Model that replays scripted results and counts calls
    struct ScriptedModel {
        results: Mutex<VecDeque<Result<String, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(results: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(
                    results
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.results.lock().await.pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(body)) => Err(ModelError::InvalidResponse(body)),
                None => Err(ModelError::EmptyResponse),
            }
        }
    }

    fn responder(model: Arc<ScriptedModel>) -> Responder {
        Responder::new(model, RetryPolicy::new(3, Duration::from_millis(1)))
    }

    const DETAILED: &str = "The smart speaker I bought keeps disconnecting from wifi every few minutes.";

    #[tokio::test]
    async fn test_plain_answer_needs_no_ticket() {
        let model = ScriptedModel::new(vec![Ok("Standard shipping takes 3-5 business days.")]);
        let reply = responder(model.clone())
            .respond(&[ConversationTurn::user("How long does shipping take?")])
            .await;

        assert_eq!(reply.response, "Standard shipping takes 3-5 business days.");
        assert!(!reply.needs_ticket);
        assert!(reply.subject.is_none());
        assert!(!reply.fallback);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_escalation_generates_subject() {
        let model = ScriptedModel::new(vec![
            Ok("Sorry about that! I'll create a ticket so our technicians can take a look."),
            Ok("\"Smart speaker keeps dropping wifi\""),
        ]);
        let reply = responder(model.clone())
            .respond(&[ConversationTurn::user(DETAILED)])
            .await;

        assert!(reply.needs_ticket);
        assert_eq!(
            reply.subject.as_deref(),
            Some("Smart speaker keeps dropping wifi")
        );
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_then_succeed() {
        let model = ScriptedModel::new(vec![Err("model overloaded"), Ok("Here to help!")]);
        let reply = responder(model.clone())
            .respond(&[ConversationTurn::user("hello")])
            .await;

        assert_eq!(reply.response, "Here to help!");
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_use_keyword_fallback() {
        let model = ScriptedModel::new(vec![Err("503"), Err("503"), Err("503")]);
        let reply = responder(model.clone())
            .respond(&[ConversationTurn::user("Where is my order?")])
            .await;

        assert!(reply.fallback);
        assert!(!reply.needs_ticket);
        assert!(reply.response.contains("My Orders"));
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_falls_back_immediately() {
        let model = ScriptedModel::new(vec![Err("invalid argument")]);
        let reply = responder(model.clone())
            .respond(&[ConversationTurn::user(DETAILED)])
            .await;

        assert_eq!(model.calls(), 1);
        assert!(reply.fallback);
        assert_eq!(reply.response, GENERIC_FALLBACK.text);
        assert!(reply.needs_ticket);
        assert_eq!(reply.subject.as_deref(), Some(DETAILED));
    }

    #[tokio::test]
    async fn test_subject_falls_back_when_model_fails() {
        let model = ScriptedModel::new(vec![Err("invalid argument")]);
        let subject = responder(model)
            .generate_subject(&[ConversationTurn::user(DETAILED)])
            .await;

        assert_eq!(subject, DETAILED);
    }

    #[tokio::test]
    async fn test_generated_subject_is_truncated() {
        let long = "a".repeat(250);
        let model = ScriptedModel::new(vec![Ok(long.as_str())]);
        let subject = responder(model)
            .generate_subject(&[ConversationTurn::user(DETAILED)])
            .await;

        assert_eq!(subject.chars().count(), MAX_SUBJECT_CHARS);
    }

    #[test]
    fn test_clean_subject() {
        assert_eq!(clean_subject("Subject: Late delivery\nextra"), Some("Late delivery".to_string()));
        assert_eq!(clean_subject("**Refund not received**"), Some("Refund not received".to_string()));
        assert_eq!(clean_subject("  \n "), None);
    }
}
