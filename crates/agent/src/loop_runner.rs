//! The agent loop controller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ragent_config::AgentConfig;
use ragent_core::{
    ContextDocument, Event, GatewayError, ModelGateway, ModelStep, PluginRegistry, Retriever,
    ToolCallResult,
};
use ragent_memory::SessionStore;
use tokio::sync::OwnedMutexGuard;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::prompt::PromptAssembler;

/// Why a turn failed. Tool failures never appear here.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model gateway failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("model did not converge after {iterations} iterations")]
    IterationExhausted { iterations: u32 },

    #[error("turn exceeded the {secs}s deadline")]
    Timeout { secs: u64 },

    #[error("failed to render prompt: {0}")]
    Prompt(#[from] serde_json::Error),
}

/// A completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// The final answer, also stored as the session's assistant event.
    pub content: String,
    /// Number of tool rounds executed before the answer.
    pub tool_rounds: u32,
    /// Tool results gathered over the whole turn.
    pub tool_results: Vec<ToolCallResult>,
}

/// One async mutex per session id, serialising turns on the same session.
///
/// `tokio::sync::Mutex` is fair, so turns run in arrival order.
#[derive(Default)]
struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(session_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop the entry unless a turn holds or awaits it.
    fn prune(&self, session_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(session_id);
        }
    }
}

/// Drives model calls and tool execution for one message at a time per
/// session.
pub struct AgentLoop {
    /// The model gateway
    gateway: Arc<dyn ModelGateway>,

    /// Built-in plugins
    tools: Arc<PluginRegistry>,

    /// Rolling per-session history
    sessions: Arc<SessionStore>,

    assembler: PromptAssembler,

    /// Optional retrieval backend queried once per turn
    retriever: Option<Arc<dyn Retriever>>,

    /// Documents fetched per turn
    top_k: usize,

    /// Model re-invocations allowed after tool rounds
    max_iterations: u32,

    /// Deadline for the whole turn
    turn_timeout: Option<Duration>,

    locks: SessionLocks,
}

impl AgentLoop {
    /// Create a new agent loop with the default limits.
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<PluginRegistry>,
        sessions: Arc<SessionStore>,
        system_prompt: impl Into<String>,
    ) -> Self {
        let assembler = PromptAssembler::new(system_prompt, tools.definitions().to_vec(), 300);
        Self {
            gateway,
            tools,
            sessions,
            assembler,
            retriever: None,
            top_k: 3,
            max_iterations: 5,
            turn_timeout: None,
            locks: SessionLocks::default(),
        }
    }

    /// Build from the `[agent]` config section.
    pub fn from_config(
        gateway: Arc<dyn ModelGateway>,
        tools: Arc<PluginRegistry>,
        sessions: Arc<SessionStore>,
        config: &AgentConfig,
    ) -> Self {
        let turn_timeout =
            (config.turn_timeout_secs > 0).then(|| Duration::from_secs(config.turn_timeout_secs));
        Self::new(gateway, tools, sessions, config.system_prompt.clone())
            .with_history_char_limit(config.history_char_limit)
            .with_max_iterations(config.max_iterations)
            .with_turn_timeout(turn_timeout)
    }

    /// Set the number of model re-invocations allowed after tool rounds.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set (or remove) the deadline covering a whole turn.
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Attach a retriever; its results become the prompt's context.
    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the per-entry character limit for chat history.
    pub fn with_history_char_limit(mut self, limit: usize) -> Self {
        self.assembler = self.assembler.with_history_char_limit(limit);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn tools(&self) -> &Arc<PluginRegistry> {
        &self.tools
    }

    /// Remove a session's history. Waits for an in-flight turn on it.
    pub async fn clear_session(&self, session_id: &str) {
        {
            let _guard = self.locks.acquire(session_id).await;
            self.sessions.clear(session_id);
        }
        self.locks.prune(session_id);
    }

    /// Process one inbound message and produce the final answer.
    ///
    /// The user event is stored first; the assistant event is stored only
    /// when the turn succeeds. A failed or timed-out turn leaves the user
    /// event in place and nothing else.
    pub async fn process(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<TurnOutcome, AgentError> {
        if session_id.trim().is_empty() {
            return Err(AgentError::InvalidInput("session_id is empty".into()));
        }
        if message.trim().is_empty() {
            return Err(AgentError::InvalidInput("message is empty".into()));
        }

        let turn_id = Uuid::new_v4();
        self.process_turn(session_id, message)
            .instrument(info_span!("turn", %turn_id, session_id))
            .await
    }

    async fn process_turn(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let _guard = self.locks.acquire(session_id).await;
        info!(message_chars = message.len(), "Processing message");

        self.sessions.append(session_id, Event::user(message));

        let turn = async {
            let context = self.retrieve_context(message).await;
            self.run(session_id, message, &context).await
        };
        let outcome = match self.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, turn).await.map_err(|_| {
                warn!(secs = limit.as_secs(), "Turn deadline exceeded");
                AgentError::Timeout {
                    secs: limit.as_secs(),
                }
            })?,
            None => turn.await,
        }?;

        self.sessions
            .append(session_id, Event::assistant(outcome.content.as_str()));
        info!(
            tool_rounds = outcome.tool_rounds,
            tool_results = outcome.tool_results.len(),
            "Turn complete"
        );
        Ok(outcome)
    }

    async fn retrieve_context(&self, message: &str) -> Vec<ContextDocument> {
        let Some(retriever) = &self.retriever else {
            return vec![];
        };

        match retriever.search(message, self.top_k).await {
            Ok(docs) => {
                debug!(retriever = retriever.name(), count = docs.len(), "Retrieved context");
                docs
            }
            Err(e) => {
                warn!(retriever = retriever.name(), "Retrieval failed, continuing without context: {e}");
                vec![]
            }
        }
    }

    /// The bounded model/tool exchange.
    async fn run(
        &self,
        session_id: &str,
        message: &str,
        context: &[ContextDocument],
    ) -> Result<TurnOutcome, AgentError> {
        let mut tool_results: Vec<ToolCallResult> = Vec::new();
        let mut remaining = self.max_iterations;
        let mut tool_rounds = 0;

        loop {
            let prompt = self
                .assembler
                .build(&self.sessions, session_id, message, context, &tool_results)
                .render()?;

            debug!(
                tool_rounds,
                prompt_chars = prompt.len(),
                gateway = self.gateway.name(),
                "Calling model"
            );

            let step = self
                .gateway
                .generate(&prompt)
                .await
                .and_then(|reply| reply.into_step())
                .map_err(|e| {
                    error!("Model gateway failed: {e}");
                    AgentError::Gateway(e)
                })?;

            let calls = match step {
                ModelStep::Final(content) => {
                    return Ok(TurnOutcome {
                        content,
                        tool_rounds,
                        tool_results,
                    });
                }
                ModelStep::ToolCalls(calls) => calls,
            };

            if remaining == 0 {
                warn!(
                    iterations = self.max_iterations,
                    "Model still requesting tools, giving up"
                );
                return Err(AgentError::IterationExhausted {
                    iterations: self.max_iterations,
                });
            }

            debug!(tool_count = calls.len(), "Executing tool calls");
            let results = self.tools.execute_plugins(&calls).await;
            for failed in results.iter().filter(|r| !r.success) {
                warn!(
                    tool = %failed.tool_name,
                    error = failed.error.as_deref().unwrap_or_default(),
                    "Tool call failed"
                );
            }

            tool_results.extend(results);
            tool_rounds += 1;
            remaining -= 1;
        }
    }
}
