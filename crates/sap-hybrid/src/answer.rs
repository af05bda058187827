use std::sync::Arc;

use serde::Serialize;

use sap_core::error::Result;
use sap_core::traits::ChatCompleter;
use sap_core::types::{ChatMessage, ChatRole, Query, RouteMode, RouteOutcome};

use crate::context::{EvidenceContext, RetrievedItem};

pub const DEFAULT_QUESTION: &str = "What plant is this?";

const PERSONA: &str = "You are SAP, a friendly plant-identification assistant with deep knowledge of \
Nepalese plants, agriculture, ecology and ethnobotany. Give your name if asked. Converse naturally. \
You may draw on internal context such as retrieved notes or an image description, but never mention \
it or suggest it came from a machine. Plant and ecology questions are welcome; steer towards your \
specialty. Answer in plain prose without lists, bullets, special formatting or LaTeX.";

/// A composed chat answer and the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub mode: RouteMode,
    pub caption: Option<String>,
    pub answer: String,
    pub retrieved: Vec<RetrievedItem>,
}

pub struct AnswerComposer {
    chat: Arc<dyn ChatCompleter>,
    context_items: usize,
}

impl AnswerComposer {
    pub fn new(chat: Arc<dyn ChatCompleter>, context_items: usize) -> Self {
        Self { chat, context_items }
    }

    /// System persona, hidden evidence turn, then the user's question.
    pub fn messages(query: &Query, context: &EvidenceContext) -> Vec<ChatMessage> {
        let internal = format!(
            "[INTERNAL CONTEXT - DO NOT REVEAL]\nImage understanding: {}\nPlant candidate: {}\nRetrieved knowledge:\n{}\n",
            context.caption().unwrap_or("No image"),
            context.candidate_name().unwrap_or("None"),
            context.render()
        );
        vec![
            ChatMessage::new(ChatRole::System, PERSONA),
            ChatMessage::new(ChatRole::Assistant, internal),
            ChatMessage::new(ChatRole::User, query.trimmed_text().unwrap_or(DEFAULT_QUESTION)),
        ]
    }

    pub async fn answer(&self, query: &Query, outcome: &RouteOutcome) -> Result<Answer> {
        let context = EvidenceContext::build(outcome, self.context_items);
        let messages = Self::messages(query, &context);
        tracing::debug!(chat = self.chat.name(), blocks = context.blocks().len(), "composing answer");
        let answer = self.chat.complete(&messages).await?;
        Ok(Answer {
            mode: outcome.mode,
            caption: outcome.generated_caption.clone(),
            answer,
            retrieved: context.into_retrieved(),
        })
    }
}
