//! The agent service — the reasoning loop behind every conversation turn.
//!
//! `process_message` appends the user message to the session, then alternates
//! provider calls and tool executions until the model produces a plain text
//! answer, the iteration cap is hit, or the turn deadline expires. Tool
//! failures are folded back into the transcript as error text so the model
//! can recover; only provider transport failures abort the turn.

use crate::context::ContextAssembler;
use crate::session::SessionStore;
use chrono::Utc;
use nimbus_config::AgentConfig;
use nimbus_core::event::{DomainEvent, EventBus};
use nimbus_core::message::{ConversationId, Message};
use nimbus_core::provider::{Provider, ProviderRequest};
use nimbus_core::tool::{ToolContext, ToolRegistry};
use nimbus_telemetry::UsageLedger;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Shared handle to the current tool catalog.
///
/// Readers take a cheap `Arc` snapshot; a turn already in flight keeps its
/// snapshot even if a new catalog is installed mid-turn.
#[derive(Clone)]
pub struct RegistryCell {
    inner: Arc<RwLock<Arc<ToolRegistry>>>,
}

impl RegistryCell {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    pub fn snapshot(&self) -> Arc<ToolRegistry> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the catalog. In-flight turns keep their old snapshot.
    pub fn install(&self, registry: ToolRegistry) {
        let registry = Arc::new(registry);
        match self.inner.write() {
            Ok(mut guard) => *guard = registry,
            Err(poisoned) => *poisoned.into_inner() = registry,
        }
    }
}

/// Orchestrates sessions, the provider, and tool dispatch.
pub struct AgentService {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    registry: RegistryCell,
    sessions: SessionStore,
    assembler: ContextAssembler,
    ledger: Option<Arc<UsageLedger>>,
    event_bus: Arc<EventBus>,
    limits: AgentConfig,
}

impl AgentService {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        registry: RegistryCell,
        assembler: ContextAssembler,
        event_bus: Arc<EventBus>,
        limits: AgentConfig,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            registry,
            sessions: SessionStore::new(),
            assembler,
            ledger: None,
            event_bus,
            limits,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Override the model for one conversation. An empty string resets to
    /// the service default.
    pub async fn set_model(&self, id: &ConversationId, model: &str) {
        let value = (!model.is_empty()).then(|| model.to_string());
        self.sessions.set_model(id, value).await;
    }

    /// The model a conversation currently resolves to.
    pub async fn get_model(&self, id: &ConversationId) -> String {
        self.sessions
            .model(id)
            .await
            .unwrap_or_else(|| self.model.clone())
    }

    /// Rebuild the session's system prompt immediately, outside the normal
    /// refresh cadence. No-op for unknown conversations.
    pub async fn force_refresh_session(&self, id: &ConversationId) {
        if !self.sessions.contains(id).await {
            return;
        }
        let registry = self.registry.snapshot();
        let prompt = self.assembler.assemble(&registry).await;
        self.sessions.set_system_prompt(id, &prompt).await;
    }

    /// Swap in a new tool catalog for future turns.
    pub fn install_registry(&self, registry: ToolRegistry) {
        self.registry.install(registry);
    }

    /// Current transcript for a conversation (empty if unknown).
    pub async fn transcript(&self, id: &ConversationId) -> Vec<Message> {
        self.sessions.snapshot(id).await
    }

    /// Deliver an out-of-band notification (e.g. a finished background task)
    /// into a conversation's transcript, so the model sees it next turn.
    pub async fn notify(&self, id: &ConversationId, text: &str) {
        self.sessions.push(id, Message::system(text)).await;
    }

    /// Process one user message and return the agent's reply.
    pub async fn process_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<String, nimbus_core::Error> {
        info!(conversation_id = %conversation_id, "Processing message");

        if let Some(ledger) = &self.ledger {
            ledger.record_message();
        }

        let deadline = Instant::now() + Duration::from_secs(self.limits.turn_timeout_secs);
        let registry = self.registry.snapshot();

        // The prompt is assembled outside the session lock; create/refresh
        // only touch the store briefly.
        if !self.sessions.contains(conversation_id).await {
            let prompt = self.assembler.assemble(&registry).await;
            self.sessions
                .create(conversation_id, &prompt, self.limits.session_max_messages)
                .await;
        } else if self
            .sessions
            .needs_refresh(conversation_id, self.limits.prompt_refresh_interval)
            .await
        {
            let prompt = self.assembler.assemble(&registry).await;
            self.sessions
                .set_system_prompt(conversation_id, &prompt)
                .await;
        }

        self.sessions
            .push(conversation_id, Message::user(text))
            .await;

        let model = self.get_model(conversation_id).await;
        let tool_definitions = registry.definitions();
        let cx = ToolContext::for_conversation(conversation_id.clone()).with_deadline(deadline);
        let mut partial_text: Option<String> = None;

        for iteration in 1..=self.limits.max_iterations {
            debug!(conversation_id = %conversation_id, iteration, "Agent loop iteration");

            let request = ProviderRequest {
                model: model.clone(),
                messages: self.sessions.snapshot(conversation_id).await,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            let response =
                match tokio::time::timeout_at(deadline, self.provider.complete(request)).await {
                    Ok(Ok(response)) => response,
                    Ok(Err(e)) => {
                        self.event_bus.publish(DomainEvent::ErrorOccurred {
                            context: "agent_loop".into(),
                            error_message: e.to_string(),
                            timestamp: Utc::now(),
                        });
                        return Err(e.into());
                    }
                    Err(_) => {
                        warn!(
                            conversation_id = %conversation_id,
                            timeout_secs = self.limits.turn_timeout_secs,
                            "Turn deadline expired"
                        );
                        let reply = "I ran out of time while working on this turn. \
                                     Ask me to continue and I will pick up where I stopped.";
                        self.sessions
                            .push(conversation_id, Message::assistant(reply))
                            .await;
                        self.persist_usage();
                        return Ok(reply.to_string());
                    }
                };

            if let Some(ledger) = &self.ledger {
                ledger.record_oracle_call(&response.model, response.usage);
            }
            if let Some(usage) = response.usage {
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    conversation_id: conversation_id.to_string(),
                    model: response.model.clone(),
                    tokens_used: usage.total_tokens,
                    timestamp: Utc::now(),
                });
            }

            if response.message.tool_calls.is_empty() {
                let reply = response.message.content.clone();
                self.sessions.push(conversation_id, response.message).await;
                self.persist_usage();
                return Ok(reply);
            }

            if !response.message.content.is_empty() {
                partial_text = Some(response.message.content.clone());
            }
            let tool_calls = response.message.tool_calls.clone();
            self.sessions.push(conversation_id, response.message).await;

            for tc in &tool_calls {
                let start = std::time::Instant::now();
                let (success, output) = match registry.dispatch(&cx, tc).await {
                    Ok(output) => (true, output),
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        (false, format!("Error: {e}"))
                    }
                };

                if let Some(ledger) = &self.ledger {
                    ledger.record_tool_call(&tc.name);
                }
                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: tc.name.clone(),
                    success,
                    duration_ms: start.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                });

                self.sessions
                    .push(conversation_id, Message::tool_result(&tc.id, output))
                    .await;
            }
        }

        warn!(
            conversation_id = %conversation_id,
            max_iterations = self.limits.max_iterations,
            "Iteration cap reached, forcing text response"
        );
        let reply = partial_text.unwrap_or_else(|| {
            "I hit the tool-call iteration limit before finishing. \
             Ask me to continue and I will keep going."
                .to_string()
        });
        self.sessions
            .push(conversation_id, Message::assistant(&reply))
            .await;
        self.persist_usage();
        Ok(reply)
    }

    /// Persist lifetime usage off the hot path.
    fn persist_usage(&self) {
        if let Some(ledger) = &self.ledger {
            let ledger = ledger.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = ledger.save_lifetime() {
                    warn!("Failed to persist usage stats: {e}");
                }
            });
        }
    }
}
