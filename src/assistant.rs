//! The answer orchestration loop.
//!
//! [`Assistant::answer`] drives one query through the generative model:
//! send system instructions, conversation history, the user query, and
//! the declared tool schemas; execute any requested tool calls
//! sequentially; feed the results back; repeat until the model answers
//! directly or the round limit forces finalization.
//!
//! The loop is an explicit state machine —
//! `AwaitingModel → ToolRequested → ToolExecuted → AwaitingModel … →
//! Finalized` — bounded by `generation.max_tool_rounds`. The whole query
//! runs under a deadline; on expiry the caller gets
//! [`AssistantError::Timeout`] and the conversation history is left
//! untouched, so a retry is safe. History is appended only on successful
//! finalization.
//!
//! Citations always come from the most recent tool round: each executed
//! round replaces the citation list with the sources its tools returned.

use std::time::Duration;

use std::sync::Arc;

use tracing::{debug, warn};

use lectern_core::models::{ConversationTurn, Role, SourceRef};

use crate::config::{GenerationConfig, SessionConfig};
use crate::error::{AssistantError, RetrievalError};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, ModelTurn};
use crate::session::SessionStore;
use crate::tools::ToolRegistry;

const SYSTEM_PROMPT: &str = "\
You are a teaching assistant for a library of indexed course materials.

Tool usage:
- Use search_course_content for questions about specific course content or materials.
- Use get_course_outline for questions about a course's structure or lesson list.
- You may make additional tool calls after seeing results; refine filters rather than repeating an identical search.
- If a search returns nothing, say so plainly instead of guessing.

Answering:
- Answer directly and concisely; do not narrate tool usage.
- For general questions unrelated to the indexed courses, answer from your own knowledge without tools.";

const FORCED_FINAL_NOTE: &str =
    "\n\nProvide your final answer based on the tool results gathered above.";

const DEGRADED_NOTE: &str = "\n\nNote: the course search backend is currently unavailable. \
Tell the user that search is unavailable and answer as best you can without it.";

const DEGRADED_FALLBACK: &str =
    "The course search backend is currently unavailable. Please try again shortly.";

/// A finalized answer with its provenance.
#[derive(Debug, Clone)]
pub struct AssistantAnswer {
    pub text: String,
    /// Ordered citations from the most recent tool execution round.
    pub citations: Vec<SourceRef>,
    pub session_id: String,
}

/// States of the per-query orchestration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    AwaitingModel,
    ToolRequested,
    ToolExecuted,
    Finalized,
}

pub struct Assistant {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    sessions: SessionStore,
    max_tool_rounds: usize,
    query_timeout: Duration,
}

impl Assistant {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolRegistry,
        session_config: &SessionConfig,
        generation_config: &GenerationConfig,
    ) -> Self {
        Self {
            model,
            tools,
            sessions: SessionStore::new(session_config.max_turns),
            max_tool_rounds: generation_config.max_tool_rounds,
            query_timeout: Duration::from_secs(generation_config.query_timeout_secs),
        }
    }

    /// Answer one query within a conversation.
    ///
    /// On timeout the conversation history is not modified.
    pub async fn answer(
        &self,
        session_id: &str,
        query: &str,
    ) -> Result<AssistantAnswer, AssistantError> {
        match tokio::time::timeout(self.query_timeout, self.run_query(session_id, query)).await {
            Ok(result) => result,
            Err(_) => Err(AssistantError::Timeout(self.query_timeout)),
        }
    }

    /// Drop all history for a conversation.
    pub fn clear_session(&self, session_id: &str) {
        self.sessions.clear(session_id);
    }

    /// Retained history for a conversation, oldest first.
    pub fn session_history(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.sessions.history(session_id)
    }

    async fn run_query(
        &self,
        session_id: &str,
        query: &str,
    ) -> Result<AssistantAnswer, AssistantError> {
        let mut messages: Vec<ChatMessage> = self
            .sessions
            .history(session_id)
            .into_iter()
            .map(|turn| match turn.role {
                Role::User => ChatMessage::User(turn.text),
                Role::Assistant => ChatMessage::assistant(turn.text),
            })
            .collect();
        messages.push(ChatMessage::User(query.to_string()));

        let tool_definitions = self.tools.definitions();
        let mut citations: Vec<SourceRef> = Vec::new();
        let mut rounds = 0usize;
        let mut state = LoopState::AwaitingModel;

        loop {
            debug!(?state, rounds, "requesting model turn");
            let turn = self
                .model
                .complete(&ChatRequest {
                    system: SYSTEM_PROMPT.to_string(),
                    messages: messages.clone(),
                    tools: tool_definitions.clone(),
                })
                .await?;

            if turn.is_final() {
                state = LoopState::Finalized;
                debug!(?state, rounds, "model answered directly");
                return Ok(self.finalize(session_id, query, answer_text(&turn), citations));
            }

            state = LoopState::ToolRequested;
            rounds += 1;
            debug!(?state, rounds, calls = turn.tool_calls.len(), "executing tool round");

            let tool_calls = turn.tool_calls.clone();
            messages.push(ChatMessage::Assistant {
                text: turn.text.clone(),
                tool_calls: tool_calls.clone(),
            });

            let mut round_sources: Vec<SourceRef> = Vec::new();
            for call in &tool_calls {
                match self.tools.execute(&call.name, call.arguments.clone()).await {
                    Ok(outcome) => {
                        round_sources.extend(outcome.sources);
                        messages.push(ChatMessage::ToolResult {
                            call_id: call.id.clone(),
                            content: outcome.text,
                        });
                    }
                    Err(RetrievalError::Unavailable(reason)) => {
                        warn!(%reason, tool = %call.name, "retrieval unavailable, degrading");
                        messages.push(ChatMessage::ToolResult {
                            call_id: call.id.clone(),
                            content: "Search is currently unavailable.".to_string(),
                        });
                        let text = self.finalize_without_tools(&messages, DEGRADED_NOTE).await;
                        return Ok(self.finalize(session_id, query, text, Vec::new()));
                    }
                }
            }

            // The most recent tool execution owns the citation list.
            citations = round_sources;
            state = LoopState::ToolExecuted;
            debug!(?state, rounds, sources = citations.len(), "tool round complete");

            if rounds >= self.max_tool_rounds {
                debug!(rounds, "tool round limit reached, forcing finalization");
                let text = match self.complete_without_tools(&messages, FORCED_FINAL_NOTE).await {
                    Ok(turn) => answer_text(&turn),
                    Err(err) => return Err(err.into()),
                };
                return Ok(self.finalize(session_id, query, text, citations));
            }

            state = LoopState::AwaitingModel;
        }
    }

    async fn complete_without_tools(
        &self,
        messages: &[ChatMessage],
        system_note: &str,
    ) -> Result<ModelTurn, crate::error::ModelError> {
        self.model
            .complete(&ChatRequest {
                system: format!("{}{}", SYSTEM_PROMPT, system_note),
                messages: messages.to_vec(),
                tools: Vec::new(),
            })
            .await
    }

    /// Best-effort final completion for the degraded path: if even the
    /// tool-free completion fails, fall back to a static notice rather
    /// than failing the whole query.
    async fn finalize_without_tools(&self, messages: &[ChatMessage], system_note: &str) -> String {
        match self.complete_without_tools(messages, system_note).await {
            Ok(turn) => answer_text(&turn),
            Err(err) => {
                warn!(%err, "degraded finalization failed, using fallback text");
                DEGRADED_FALLBACK.to_string()
            }
        }
    }

    fn finalize(
        &self,
        session_id: &str,
        query: &str,
        text: String,
        citations: Vec<SourceRef>,
    ) -> AssistantAnswer {
        self.sessions.append(session_id, Role::User, query);
        self.sessions.append(session_id, Role::Assistant, &text);
        AssistantAnswer {
            text,
            citations,
            session_id: session_id.to_string(),
        }
    }
}

fn answer_text(turn: &ModelTurn) -> String {
    turn.text.clone().unwrap_or_default()
}
