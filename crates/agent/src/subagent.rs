//! Delegation — hand a task to a child agent, synchronously or in the
//! background.
//!
//! A child gets the parent's tool catalog minus the delegation tools, so
//! delegation never nests. When the parent names a sub-workspace, the child's
//! file and shell tools are rebuilt against that directory; the path is
//! validated before any child state is constructed.

use crate::service::RegistryCell;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_core::error::{ProviderError, ToolError};
use nimbus_core::event::{DomainEvent, EventBus};
use nimbus_core::message::{ConversationId, Message};
use nimbus_core::provider::{Provider, ProviderRequest};
use nimbus_core::tool::{Tool, ToolContext, ToolRegistry, ToolResult};
use nimbus_tools::{register_workspace_tools, WORKSPACE_TOOL_NAMES};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DELEGATION_TOOL_NAMES: [&str; 2] = ["subagent", "spawn"];

const SYNC_TIMEOUT_DEFAULT_SECS: u64 = 180;
const ASYNC_TIMEOUT_DEFAULT_SECS: u64 = 300;
const TIMEOUT_MAX_SECS: u64 = 600;

const TRACKER_CAP: usize = 256;

const CHILD_SYSTEM_PROMPT: &str = "You are a focused subagent. Complete the task you were \
    given using the available tools, then reply with a concise final summary of what you did \
    and what you found. Do not ask follow-up questions.";

/// Called once when a background task finishes, with the owning conversation
/// and the result text.
pub type CompletionHandler = Arc<dyn Fn(ConversationId, String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One delegated task, as seen by the `status` command.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub task_id: String,
    pub label: String,
    pub status: TaskStatus,
    pub conversation_id: Option<ConversationId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Bookkeeping for delegated tasks.
///
/// Bounded: once full, the oldest finished record is evicted to make room.
/// Running tasks are never evicted.
pub struct SubagentTracker {
    tasks: Mutex<Vec<TaskRecord>>,
    next_id: AtomicU64,
}

impl SubagentTracker {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<TaskRecord>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a new running task and return its id.
    pub fn record_start(
        &self,
        label: &str,
        conversation_id: Option<ConversationId>,
    ) -> String {
        let task_id = format!("subagent-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut tasks = self.tasks();
        if tasks.len() >= TRACKER_CAP {
            if let Some(pos) = tasks.iter().position(|t| t.status != TaskStatus::Running) {
                tasks.remove(pos);
            }
        }
        tasks.push(TaskRecord {
            task_id: task_id.clone(),
            label: label.to_string(),
            status: TaskStatus::Running,
            conversation_id,
            started_at: Utc::now(),
            finished_at: None,
            summary: None,
        });
        task_id
    }

    /// Mark a task finished. Later calls for the same task are ignored.
    pub fn record_complete(&self, task_id: &str, success: bool, summary: &str) {
        let mut tasks = self.tasks();
        let Some(task) = tasks
            .iter_mut()
            .find(|t| t.task_id == task_id && t.status == TaskStatus::Running)
        else {
            return;
        };
        task.status = if success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        task.finished_at = Some(Utc::now());
        task.summary = Some(summary.to_string());
    }

    /// All tasks, optionally filtered to one conversation, oldest first.
    pub fn list(&self, conversation_id: Option<&ConversationId>) -> Vec<TaskRecord> {
        self.tasks()
            .iter()
            .filter(|t| match conversation_id {
                Some(id) => t.conversation_id.as_ref() == Some(id),
                None => true,
            })
            .cloned()
            .collect()
    }
}

impl Default for SubagentTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a delegated task needs from the parent agent.
pub struct DelegationConfig {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub registry: RegistryCell,
    pub workspace_root: PathBuf,
    pub max_iterations: usize,
    pub event_bus: Arc<EventBus>,
    pub tracker: Arc<SubagentTracker>,
    pub on_complete: CompletionHandler,
}

/// Build the `subagent` and `spawn` tools over a shared delegation config.
pub fn delegation_tools(config: DelegationConfig) -> Vec<Arc<dyn Tool>> {
    let shared = Arc::new(config);
    vec![
        Arc::new(SubagentTool {
            shared: shared.clone(),
        }),
        Arc::new(SpawnTool { shared }),
    ]
}

fn clamp_timeout(requested: Option<u64>, default_secs: u64) -> u64 {
    match requested {
        // Zero means "no preference", not an instant timeout.
        None | Some(0) => default_secs,
        Some(secs) => secs.min(TIMEOUT_MAX_SECS),
    }
}

/// Validate and prepare an optional sub-workspace, then derive the child's
/// restricted tool catalog. Fails before any child state exists.
fn build_child_registry(
    shared: &DelegationConfig,
    workspace: Option<&str>,
    tool_name: &str,
) -> Result<ToolRegistry, ToolError> {
    let parent = shared.registry.snapshot();
    let mut child = parent.without(&DELEGATION_TOOL_NAMES);

    if let Some(sub) = workspace {
        let sub_root = nimbus_security::resolve_sub_workspace(&shared.workspace_root, sub)
            .map_err(|e| ToolError::PermissionDenied {
                tool_name: tool_name.into(),
                reason: e.to_string(),
            })?;
        std::fs::create_dir_all(&sub_root).map_err(|e| ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: format!("Failed to create sub-workspace: {e}"),
        })?;
        child = child.without(&WORKSPACE_TOOL_NAMES);
        register_workspace_tools(&mut child, &sub_root);
    }

    Ok(child)
}

/// Run one delegated task to completion against its own local transcript.
async fn run_task(
    shared: &DelegationConfig,
    registry: &ToolRegistry,
    task: &str,
    deadline: Instant,
) -> Result<String, ProviderError> {
    let mut messages = vec![Message::system(CHILD_SYSTEM_PROMPT), Message::user(task)];
    let tool_definitions = registry.definitions();
    let cx = ToolContext::default();
    let mut partial_text: Option<String> = None;

    for iteration in 1..=shared.max_iterations {
        debug!(iteration, "Subagent loop iteration");

        let request = ProviderRequest {
            model: shared.model.clone(),
            messages: messages.clone(),
            temperature: shared.temperature,
            max_tokens: shared.max_tokens,
            tools: tool_definitions.clone(),
        };

        let response = tokio::time::timeout_at(deadline, shared.provider.complete(request))
            .await
            .map_err(|_| ProviderError::Timeout("subagent deadline expired".into()))??;

        if response.message.tool_calls.is_empty() {
            return Ok(response.message.content);
        }

        if !response.message.content.is_empty() {
            partial_text = Some(response.message.content.clone());
        }
        let tool_calls = response.message.tool_calls.clone();
        messages.push(response.message);

        for tc in &tool_calls {
            let output = match registry.dispatch(&cx, tc).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(tool = %tc.name, error = %e, "Subagent tool failed");
                    format!("Error: {e}")
                }
            };
            messages.push(Message::tool_result(&tc.id, output));
        }
    }

    Ok(partial_text
        .unwrap_or_else(|| "Reached the iteration limit before finishing the task.".into()))
}

/// Delegate a task and wait for the result.
pub struct SubagentTool {
    shared: Arc<DelegationConfig>,
}

#[async_trait]
impl Tool for SubagentTool {
    fn name(&self) -> &str {
        "subagent"
    }

    fn description(&self) -> &str {
        "Delegate a self-contained task to a subagent and wait for its result. \
         The subagent has the same tools except delegation, and can be fenced \
         to a sub-directory of the workspace."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Complete description of the task, with all needed context"
                },
                "label": {
                    "type": "string",
                    "description": "Short label for tracking (default: 'subagent')"
                },
                "workspace": {
                    "type": "string",
                    "description": "Optional sub-directory (relative) to fence file and shell access to"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Max seconds to wait (default 180, max 600)"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(
        &self,
        cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let task = arguments["task"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'task' argument".into()))?;
        let label = arguments["label"].as_str().unwrap_or("subagent");
        let timeout_secs =
            clamp_timeout(arguments["timeout_secs"].as_u64(), SYNC_TIMEOUT_DEFAULT_SECS);

        let registry =
            build_child_registry(&self.shared, arguments["workspace"].as_str(), "subagent")?;

        info!(label = %label, timeout_secs, "Delegating task to subagent");
        let task_id = self
            .shared
            .tracker
            .record_start(label, cx.conversation_id.clone());

        // A synchronous child runs inside the parent's turn, so its deadline
        // is capped at whatever remains of the turn's budget.
        let mut deadline = Instant::now() + Duration::from_secs(timeout_secs);
        if let Some(turn_deadline) = cx.deadline {
            deadline = deadline.min(turn_deadline);
        }
        match run_task(&self.shared, &registry, task, deadline).await {
            Ok(summary) => {
                self.shared.tracker.record_complete(&task_id, true, &summary);
                Ok(ToolResult::ok(format!(
                    "Subagent '{label}' completed:\n{summary}"
                )))
            }
            Err(ProviderError::Timeout(_)) => {
                self.shared
                    .tracker
                    .record_complete(&task_id, false, "timed out");
                Err(ToolError::Timeout {
                    tool_name: "subagent".into(),
                    timeout_secs,
                })
            }
            Err(e) => {
                self.shared
                    .tracker
                    .record_complete(&task_id, false, &e.to_string());
                Err(ToolError::ExecutionFailed {
                    tool_name: "subagent".into(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Delegate a task in the background and get notified when it finishes.
pub struct SpawnTool {
    shared: Arc<DelegationConfig>,
}

#[async_trait]
impl Tool for SpawnTool {
    fn name(&self) -> &str {
        "spawn"
    }

    fn description(&self) -> &str {
        "Start a background subagent for a long-running task and return \
         immediately. The result is delivered to the conversation when the \
         task finishes."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Complete description of the task, with all needed context"
                },
                "label": {
                    "type": "string",
                    "description": "Short label for tracking (default: 'background task')"
                },
                "workspace": {
                    "type": "string",
                    "description": "Optional sub-directory (relative) to fence file and shell access to"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Max seconds the task may run (default 300, max 600)"
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(
        &self,
        cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let conversation_id = cx.conversation_id.clone().ok_or_else(|| {
            ToolError::ExecutionFailed {
                tool_name: "spawn".into(),
                reason: "spawn requires an active conversation".into(),
            }
        })?;

        let task = arguments["task"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'task' argument".into()))?
            .to_string();
        let label = arguments["label"]
            .as_str()
            .unwrap_or("background task")
            .to_string();
        let timeout_secs =
            clamp_timeout(arguments["timeout_secs"].as_u64(), ASYNC_TIMEOUT_DEFAULT_SECS);

        // Validate the workspace and snapshot the catalog now, so a bad
        // request fails here instead of silently inside the spawned task.
        let registry =
            build_child_registry(&self.shared, arguments["workspace"].as_str(), "spawn")?;

        let task_id = self
            .shared
            .tracker
            .record_start(&label, Some(conversation_id.clone()));
        self.shared.event_bus.publish(DomainEvent::SubagentStarted {
            task_id: task_id.clone(),
            label: label.clone(),
            timestamp: Utc::now(),
        });
        info!(task_id = %task_id, label = %label, timeout_secs, "Spawned background subagent");

        let ack = format!(
            "Started background task '{label}' (id {task_id}). \
             You will be notified when it completes."
        );
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let deadline = Instant::now() + Duration::from_secs(timeout_secs);
            let (success, text) = match run_task(&shared, &registry, &task, deadline).await {
                Ok(summary) => (true, summary),
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Background subagent failed");
                    (false, e.to_string())
                }
            };

            shared.tracker.record_complete(&task_id, success, &text);
            shared.event_bus.publish(DomainEvent::SubagentFinished {
                task_id: task_id.clone(),
                label: label.clone(),
                success,
                timestamp: Utc::now(),
            });

            let outcome = if success { "finished" } else { "failed" };
            (shared.on_complete)(
                conversation_id,
                format!("Background task '{label}' {outcome}:\n{text}"),
            );
        });

        Ok(ToolResult::ok(ack))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::message::MessageToolCall;
    use nimbus_core::provider::{ProviderResponse, Usage};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    struct ScriptedProvider {
        responses: Mutex<VecDeque<ProviderResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ProviderResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProviderError::Network("script exhausted".into()))
        }
    }

    /// Never responds within any deadline.
    struct StalledProvider;

    #[async_trait]
    impl Provider for StalledProvider {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(86_400)).await;
            Err(ProviderError::Network("unreachable".into()))
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }
        async fn execute(
            &self,
            _cx: &ToolContext,
            arguments: serde_json::Value,
        ) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(arguments["text"].as_str().unwrap_or("")))
        }
    }

    fn text_response(content: &str) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant(content),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "test-model".into(),
        }
    }

    fn call_response(tool: &str, arguments: &str) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant_with_calls(
                "",
                vec![MessageToolCall {
                    id: "call_1".into(),
                    name: tool.into(),
                    arguments: arguments.into(),
                }],
            ),
            usage: None,
            model: "test-model".into(),
        }
    }

    fn config(
        provider: Arc<dyn Provider>,
        workspace_root: PathBuf,
        on_complete: CompletionHandler,
    ) -> DelegationConfig {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        DelegationConfig {
            provider,
            model: "test-model".into(),
            temperature: 0.7,
            max_tokens: None,
            registry: RegistryCell::new(registry),
            workspace_root,
            max_iterations: 20,
            event_bus: Arc::new(EventBus::default()),
            tracker: Arc::new(SubagentTracker::new()),
            on_complete,
        }
    }

    fn no_handler() -> CompletionHandler {
        Arc::new(|_, _| {})
    }

    #[test]
    fn tracker_lifecycle() {
        let tracker = SubagentTracker::new();
        let id = tracker.record_start("research", None);

        let tasks = tracker.list(None);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Running);

        tracker.record_complete(&id, true, "all done");
        let tasks = tracker.list(None);
        assert_eq!(tasks[0].status, TaskStatus::Completed);
        assert_eq!(tasks[0].summary.as_deref(), Some("all done"));

        // A second completion must not overwrite the first.
        tracker.record_complete(&id, false, "late failure");
        assert_eq!(tracker.list(None)[0].status, TaskStatus::Completed);
    }

    #[test]
    fn tracker_evicts_oldest_finished_never_running() {
        let tracker = SubagentTracker::new();
        let running_id = tracker.record_start("stays running", None);
        for i in 0..TRACKER_CAP {
            let id = tracker.record_start(&format!("task {i}"), None);
            tracker.record_complete(&id, true, "done");
        }

        let tasks = tracker.list(None);
        assert_eq!(tasks.len(), TRACKER_CAP);
        assert!(tasks.iter().any(|t| t.task_id == running_id));
        // The oldest finished record is the one that got evicted.
        assert!(!tasks.iter().any(|t| t.label == "task 0"));
    }

    #[test]
    fn tracker_list_filters_by_conversation() {
        let tracker = SubagentTracker::new();
        let conv_a = ConversationId::from("a");
        let conv_b = ConversationId::from("b");
        tracker.record_start("for a", Some(conv_a.clone()));
        tracker.record_start("for b", Some(conv_b));

        let tasks = tracker.list(Some(&conv_a));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].label, "for a");
    }

    #[test]
    fn timeout_clamped_to_maximum() {
        assert_eq!(clamp_timeout(None, SYNC_TIMEOUT_DEFAULT_SECS), 180);
        assert_eq!(clamp_timeout(Some(60), SYNC_TIMEOUT_DEFAULT_SECS), 60);
        assert_eq!(clamp_timeout(Some(9999), SYNC_TIMEOUT_DEFAULT_SECS), 600);
        // Zero is "no preference", not an instant timeout.
        assert_eq!(clamp_timeout(Some(0), ASYNC_TIMEOUT_DEFAULT_SECS), 300);
    }

    #[tokio::test]
    async fn sync_subagent_runs_task_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![
            call_response("echo", r#"{"text":"checked"}"#),
            text_response("Everything checked out."),
        ]));
        let shared = Arc::new(config(provider, dir.path().to_path_buf(), no_handler()));
        let tool = SubagentTool {
            shared: shared.clone(),
        };

        let result = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({"task": "check things", "label": "checker"}),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("Subagent 'checker' completed"));
        assert!(result.output.contains("Everything checked out."));

        let tasks = shared.tracker.list(None);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_subagent_capped_by_turn_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let shared = Arc::new(config(
            Arc::new(StalledProvider),
            dir.path().to_path_buf(),
            no_handler(),
        ));
        let tool = SubagentTool { shared };

        // The turn has 5 seconds left; the requested 600 must not win.
        let start = Instant::now();
        let cx = ToolContext::for_conversation(ConversationId::from("conv"))
            .with_deadline(start + Duration::from_secs(5));
        let result = tool
            .execute(
                &cx,
                serde_json::json!({"task": "stall", "timeout_secs": 600}),
            )
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
        assert!(start.elapsed() <= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn escaping_sub_workspace_rejected_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("never called")]));
        let shared = Arc::new(config(
            provider.clone(),
            dir.path().to_path_buf(),
            no_handler(),
        ));
        let tool = SubagentTool {
            shared: shared.clone(),
        };

        let result = tool
            .execute(
                &ToolContext::default(),
                serde_json::json!({"task": "escape", "workspace": "../../etc"}),
            )
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(shared.tracker.list(None).is_empty());
    }

    #[tokio::test]
    async fn spawn_requires_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let shared = Arc::new(config(provider, dir.path().to_path_buf(), no_handler()));
        let tool = SpawnTool { shared };

        let result = tool
            .execute(&ToolContext::default(), serde_json::json!({"task": "bg"}))
            .await;
        assert!(matches!(result, Err(ToolError::ExecutionFailed { .. })));
    }

    #[tokio::test]
    async fn spawn_delivers_result_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![text_response(
            "background work done",
        )]));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handler: CompletionHandler = Arc::new(move |conv, text| {
            let _ = tx.send((conv, text));
        });
        let shared = Arc::new(config(provider, dir.path().to_path_buf(), handler));
        let tool = SpawnTool {
            shared: shared.clone(),
        };

        let conv = ConversationId::from("conv");
        let ack = tool
            .execute(
                &ToolContext::for_conversation(conv.clone()),
                serde_json::json!({"task": "work in background", "label": "bg"}),
            )
            .await
            .unwrap();
        assert!(ack.output.contains("Started background task"));
        assert!(!ack.output.contains("background work done"));

        let (delivered_conv, text) = rx.recv().await.unwrap();
        assert_eq!(delivered_conv, conv);
        assert!(text.contains("'bg' finished"));
        assert!(text.contains("background work done"));

        // Delivery happens after the tracker is updated, and only once.
        let tasks = shared.tracker.list(Some(&conv));
        assert_eq!(tasks[0].status, TaskStatus::Completed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn spawn_reports_failure_to_handler() {
        let dir = tempfile::tempdir().unwrap();
        // Empty script: the provider errors on first call.
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handler: CompletionHandler = Arc::new(move |conv, text| {
            let _ = tx.send((conv, text));
        });
        let shared = Arc::new(config(provider, dir.path().to_path_buf(), handler));
        let tool = SpawnTool {
            shared: shared.clone(),
        };

        let conv = ConversationId::from("conv");
        tool.execute(
            &ToolContext::for_conversation(conv.clone()),
            serde_json::json!({"task": "doomed", "label": "doomed"}),
        )
        .await
        .unwrap();

        let (_, text) = rx.recv().await.unwrap();
        assert!(text.contains("'doomed' failed"));
        assert_eq!(
            shared.tracker.list(Some(&conv))[0].status,
            TaskStatus::Failed
        );
    }

    #[tokio::test]
    async fn child_catalog_excludes_delegation() {
        let dir = tempfile::tempdir().unwrap();
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::new(vec![]));
        let shared = config(provider, dir.path().to_path_buf(), no_handler());

        // Install a full parent catalog including the delegation tools.
        let parent_registry = {
            let mut r = ToolRegistry::new();
            r.register(Arc::new(EchoTool));
            let shared_for_tools = Arc::new(config(
                Arc::new(ScriptedProvider::new(vec![])),
                dir.path().to_path_buf(),
                no_handler(),
            ));
            r.register(Arc::new(SubagentTool {
                shared: shared_for_tools.clone(),
            }));
            r.register(Arc::new(SpawnTool {
                shared: shared_for_tools,
            }));
            r
        };
        shared.registry.install(parent_registry);

        let child = build_child_registry(&shared, None, "subagent").unwrap();
        assert!(child.get("echo").is_some());
        assert!(child.get("subagent").is_none());
        assert!(child.get("spawn").is_none());
    }

    #[tokio::test]
    async fn child_workspace_tools_rescoped() {
        let dir = tempfile::tempdir().unwrap();
        let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider::new(vec![]));
        let shared = config(provider, dir.path().to_path_buf(), no_handler());

        let mut parent_registry = ToolRegistry::new();
        parent_registry.register(Arc::new(EchoTool));
        register_workspace_tools(&mut parent_registry, dir.path());
        shared.registry.install(parent_registry);

        let child = build_child_registry(&shared, Some("sandbox"), "subagent").unwrap();
        assert!(dir.path().join("sandbox").is_dir());
        assert!(child.get("echo").is_some());
        for name in WORKSPACE_TOOL_NAMES {
            assert!(child.get(name).is_some(), "missing {name}");
        }

        // The rescoped read_file cannot see files outside the sandbox.
        std::fs::write(dir.path().join("secret.txt"), "top secret").unwrap();
        let read = child.get("read_file").unwrap();
        let result = read
            .execute(
                &ToolContext::default(),
                serde_json::json!({"path": "../secret.txt"}),
            )
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}
