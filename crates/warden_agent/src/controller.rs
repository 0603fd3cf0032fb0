//! The turn controller drives one user turn through the model and the tools.
//!
//! See [`TurnController`] for details.

use std::{collections::HashMap, fmt, future::Future, ops::Deref, sync::Arc};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use warden_config::turn::{SensitiveFailure, TurnConfig};
use warden_conversation::{
    ConversationState, Message, PendingInterrupt, ThreadId, ToolCallRequest, ToolCallResponse,
};
use warden_llm::{ChatQuery, Provider, Reply};
use warden_storage::CheckpointStore;
use warden_tool::{ToolContext, ToolDescriptor, ToolRegistry};

use crate::{
    error::{Error, Result},
    host::HostContext,
    prompt::system_prompt,
};

/// The only confirmation value that authorizes a sensitive tool call.
pub const CONFIRM: &str = "confirm";

/// The confirmation value that explicitly cancels a sensitive tool call.
pub const CANCEL: &str = "cancel";

const CANCELLED_BY_USER: &str = "The user cancelled the tool call. It was not executed.";
const TOOL_STEP_CANCELLED: &str = "The tool call was cancelled before it completed.";

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The model answered without requesting a tool.
    Completed { message: String },

    /// A sensitive tool call waits for the user to confirm it.
    AwaitingConfirmation { tool_call_id: String, prompt: String },

    /// The model requested a host action. The host executes it and reports
    /// the result with [`TurnController::submit_tool_result`].
    HostAction { call: ToolCallRequest },

    /// The turn was cancelled with [`TurnController::cancel_turn`].
    Cancelled,
}

/// Whether a thread can take a new user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    Idle,
    AwaitingConfirmation { tool_call_id: String, prompt: String },
}

/// Where a requested tool call goes.
#[derive(Debug)]
enum Route<'a> {
    Host,
    Auto(&'a ToolDescriptor),
    Sensitive(&'a ToolDescriptor),
}

/// The states of a turn.
///
/// A turn starts in [`Step::AwaitingModel`] (new user message, rejected
/// confirmation, host result) or [`Step::ExecutingSensitiveTool`] (accepted
/// confirmation), and runs until it reaches [`Step::Terminated`].
enum Step<'a> {
    AwaitingModel,
    ExecutingAutoTool(&'a ToolDescriptor, ToolCallRequest),
    AwaitingConfirmation(&'a ToolDescriptor, ToolCallRequest),
    ExecutingSensitiveTool(&'a ToolDescriptor, ToolCallRequest),
    Terminated(TurnOutcome),
}

impl Step<'_> {
    const fn name(&self) -> &'static str {
        match self {
            Self::AwaitingModel => "awaiting_model",
            Self::ExecutingAutoTool(..) => "executing_auto_tool",
            Self::AwaitingConfirmation(..) => "awaiting_confirmation",
            Self::ExecutingSensitiveTool(..) => "executing_sensitive_tool",
            Self::Terminated(_) => "terminated",
        }
    }
}

/// The state of a turn in progress.
struct Turn<'a> {
    thread: &'a ThreadId,
    state: ConversationState,
    host: &'a HostContext,

    /// Tool calls executed or suspended in this turn.
    rounds: u32,

    token: CancellationToken,
}

impl Turn<'_> {
    fn tool_context(&self, call: &ToolCallRequest) -> ToolContext {
        ToolContext {
            thread: self.thread.clone(),
            tool_call_id: call.id.clone(),
            shared: self.state.context().clone(),
        }
    }
}

/// Serializes the turns of a single thread.
#[derive(Debug, Default)]
struct ThreadSlot {
    turn: tokio::sync::Mutex<()>,

    /// Cancels the step in flight, replaced at the start of every turn.
    token: Mutex<CancellationToken>,
}

impl ThreadSlot {
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.token.lock() = token.clone();
        token
    }
}

/// A claim on the [`ThreadSlot`] of a thread.
///
/// The slot is removed from the controller once its last claim is dropped.
struct SlotClaim<'a> {
    threads: &'a Mutex<HashMap<ThreadId, Arc<ThreadSlot>>>,
    thread: &'a ThreadId,
    slot: Arc<ThreadSlot>,
}

impl Deref for SlotClaim<'_> {
    type Target = ThreadSlot;

    fn deref(&self) -> &Self::Target {
        &self.slot
    }
}

impl Drop for SlotClaim<'_> {
    fn drop(&mut self) {
        let mut threads = self.threads.lock();

        // One reference is held by the map, the other by this claim.
        let last = threads
            .get(self.thread)
            .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) == 2);

        if last {
            threads.remove(self.thread);
        }
    }
}

/// Drives conversation turns.
///
/// A turn is one or more request-response cycle(s) between the user and the
/// model. It starts with a user message and continues for as long as the
/// model requests tools that can be executed right away. It ends when:
///
/// - the model answers without a tool call,
/// - the model requests a host action,
/// - the model requests a sensitive tool, which suspends the turn until the
///   user confirms or rejects the call (see [`Self::submit_confirmation`]),
/// - the turn fails or is cancelled.
///
/// Only the first tool call of a model reply is routed, any others are
/// dropped before the reply is recorded. The conversation state is persisted
/// at every stable point, so a suspended turn survives a restart.
///
/// Turns of the same thread run one at a time, turns of distinct threads run
/// concurrently.
pub struct TurnController {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn CheckpointStore>,
    config: TurnConfig,

    /// The database schema shown to the model, if any.
    schema: Option<String>,

    threads: Mutex<HashMap<ThreadId, Arc<ThreadSlot>>>,
}

impl fmt::Debug for TurnController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnController")
            .field("provider", &self.provider)
            .field("tools", &self.registry.len())
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TurnController {
    #[must_use]
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn CheckpointStore>,
        config: TurnConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            store,
            config,
            schema: None,
            threads: Mutex::new(HashMap::new()),
        }
    }

    /// Include the database schema in the system message.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Start a new turn with a user message.
    ///
    /// Tool calls left without a result by an earlier turn are answered with
    /// an "interrupted" error first. Fails with [`Error::ConfirmationPending`]
    /// while the thread waits for a confirmation.
    pub async fn submit_user_message(
        &self,
        thread: &ThreadId,
        text: &str,
        host: &HostContext,
    ) -> Result<TurnOutcome> {
        let slot = self.slot(thread);
        let _guard = slot.turn.lock().await;

        let mut state = self.store.load(thread)?.unwrap_or_default();
        if let Some(interrupt) = state.pending_interrupt() {
            return Err(Error::ConfirmationPending {
                thread: thread.clone(),
                tool_call_id: interrupt.tool_call_id().to_owned(),
            });
        }

        let sanitized = state.sanitize_orphaned_tool_calls();
        if sanitized > 0 {
            debug!(%thread, sanitized, "Answered orphaned tool calls.");
        }

        state.extend_context(host.shared.clone());
        state.add_user_message(text);

        info!(%thread, messages = state.len(), "Starting turn.");
        let turn = Turn {
            thread,
            state,
            host,
            rounds: 0,
            token: slot.begin(),
        };

        self.persist(&turn)?;
        self.drive(turn, Step::AwaitingModel).await
    }

    /// Resume a turn suspended on a sensitive tool call.
    ///
    /// Only the exact value [`CONFIRM`] executes the call. Any other value
    /// rejects it, [`CANCEL`] with a dedicated message. Either way the model is
    /// asked to continue afterwards.
    ///
    /// The pending confirmation is cleared and persisted before the tool
    /// runs, so a crash can never execute the call twice. Clearing it is a
    /// single store operation, so of two controllers confirming the same
    /// thread over a shared store only one executes the call, the other
    /// fails with [`Error::NoPendingConfirmation`].
    pub async fn submit_confirmation(
        &self,
        thread: &ThreadId,
        value: &str,
        host: &HostContext,
    ) -> Result<TurnOutcome> {
        let slot = self.slot(thread);
        let _guard = slot.turn.lock().await;

        let Some((mut state, interrupt)) = self.store.take_pending_interrupt(thread)? else {
            self.load(thread)?;
            return Err(Error::NoPendingConfirmation(thread.clone()));
        };

        state.extend_context(host.shared.clone());

        let mut turn = Turn {
            thread,
            state,
            host,
            rounds: interrupt.rounds,
            token: slot.begin(),
        };

        let call = interrupt.tool_call;
        if value != CONFIRM {
            let reason = if value == CANCEL {
                CANCELLED_BY_USER.to_owned()
            } else {
                format!("The user did not confirm the tool call (replied {value:?}). It was not executed.")
            };

            info!(%thread, tool = %call.name, value, "Tool call rejected.");
            turn.state
                .add_tool_call_response(ToolCallResponse::error(&call.id, reason));
            self.persist(&turn)?;

            return self.drive(turn, Step::AwaitingModel).await;
        }

        info!(%thread, tool = %call.name, "Tool call confirmed.");
        self.persist(&turn)?;

        let tool = match self.registry.resolve(&call.name) {
            Ok(tool) => tool,
            Err(_) => return Err(self.reject_unknown(&mut turn, &call)),
        };

        self.drive(turn, Step::ExecutingSensitiveTool(tool, call))
            .await
    }

    /// Report the result of a host action and continue the turn.
    pub async fn submit_tool_result(
        &self,
        thread: &ThreadId,
        tool_call_id: &str,
        content: &str,
        host: &HostContext,
    ) -> Result<TurnOutcome> {
        let slot = self.slot(thread);
        let _guard = slot.turn.lock().await;

        let mut state = self.load(thread)?;
        if let Some(interrupt) = state.pending_interrupt() {
            return Err(Error::ConfirmationPending {
                thread: thread.clone(),
                tool_call_id: interrupt.tool_call_id().to_owned(),
            });
        }

        let unanswered = state.find_tool_call_request(tool_call_id).is_some()
            && state.find_tool_call_response(tool_call_id).is_none();

        if !unanswered {
            return Err(Error::UnknownToolCall {
                thread: thread.clone(),
                tool_call_id: tool_call_id.to_owned(),
            });
        }

        state.extend_context(host.shared.clone());
        state.add_tool_call_response(ToolCallResponse::success(tool_call_id, content));

        debug!(%thread, tool_call_id, "Recorded host action result.");
        let turn = Turn {
            thread,
            state,
            host,
            rounds: 0,
            token: slot.begin(),
        };

        self.persist(&turn)?;
        self.drive(turn, Step::AwaitingModel).await
    }

    /// Cancel the turn of a thread.
    ///
    /// A model request or auto tool call in flight is aborted, the turn in
    /// progress then ends with [`TurnOutcome::Cancelled`]. A pending
    /// confirmation is rejected without executing the tool.
    ///
    /// Returns `true` if there was anything to cancel.
    pub async fn cancel_turn(&self, thread: &ThreadId) -> Result<bool> {
        let slot = self.slot(thread);

        let in_flight = slot.turn.try_lock().is_err();
        if in_flight {
            info!(%thread, "Cancelling turn in progress.");
            slot.token.lock().cancel();
        }

        let _guard = slot.turn.lock().await;
        let Some((mut state, interrupt)) = self.store.take_pending_interrupt(thread)? else {
            return Ok(in_flight);
        };

        info!(%thread, tool = %interrupt.tool_call.name, "Pending tool call cancelled.");
        state.add_tool_call_response(ToolCallResponse::error(
            interrupt.tool_call_id(),
            CANCELLED_BY_USER,
        ));
        self.store.persist(thread, &state)?;

        Ok(true)
    }

    /// Whether the thread waits for a confirmation.
    pub fn status(&self, thread: &ThreadId) -> Result<TurnStatus> {
        let state = self.load(thread)?;

        Ok(match state.pending_interrupt() {
            Some(interrupt) => TurnStatus::AwaitingConfirmation {
                tool_call_id: interrupt.tool_call_id().to_owned(),
                prompt: interrupt.prompt.clone(),
            },
            None => TurnStatus::Idle,
        })
    }

    /// The persisted state of a thread.
    pub fn history(&self, thread: &ThreadId) -> Result<ConversationState> {
        self.load(thread)
    }

    /// All persisted threads.
    pub fn threads(&self) -> Result<Vec<ThreadId>> {
        self.store.list().map_err(Into::into)
    }

    async fn drive<'a>(&'a self, mut turn: Turn<'_>, mut step: Step<'a>) -> Result<TurnOutcome> {
        loop {
            trace!(thread = %turn.thread, step = step.name(), round = turn.rounds, "Turn step.");

            step = match step {
                Step::AwaitingModel => self.request_model(&mut turn).await?,
                Step::ExecutingAutoTool(tool, call) => {
                    self.execute_auto(&mut turn, tool, call).await?
                }
                Step::AwaitingConfirmation(tool, call) => self.suspend(&mut turn, tool, call)?,
                Step::ExecutingSensitiveTool(tool, call) => {
                    self.execute_sensitive(&mut turn, tool, call).await?
                }
                Step::Terminated(outcome) => {
                    info!(thread = %turn.thread, rounds = turn.rounds, "Turn ended.");
                    return Ok(outcome);
                }
            };
        }
    }

    async fn request_model(&self, turn: &mut Turn<'_>) -> Result<Step<'_>> {
        let query = self.query(&turn.state, turn.host);

        let Some(reply) = cancellable(&turn.token, self.provider.chat_completion(&query)).await
        else {
            info!(thread = %turn.thread, "Model request cancelled.");
            return Ok(Step::Terminated(TurnOutcome::Cancelled));
        };

        let Reply {
            content,
            mut tool_calls,
        } = reply?;

        if tool_calls.len() > 1 {
            let dropped = tool_calls
                .drain(1..)
                .map(|call| call.name)
                .collect::<Vec<_>>();

            warn!(
                thread = %turn.thread,
                ?dropped,
                "Model requested multiple tool calls, only the first one is routed."
            );
        }

        let call = tool_calls.first().cloned();
        turn.state.add_assistant_message(content.clone(), tool_calls);

        let Some(call) = call else {
            self.persist(turn)?;
            return Ok(Step::Terminated(TurnOutcome::Completed { message: content }));
        };

        let route = match self.route(&call, turn.host) {
            Ok(route) => route,
            Err(_) => return Err(self.reject_unknown(turn, &call)),
        };

        if !matches!(route, Route::Host) {
            self.spend_round(turn, &call)?;
        }

        self.persist(turn)?;

        Ok(match route {
            Route::Host => {
                info!(thread = %turn.thread, action = %call.name, "Handing host action to the host.");
                Step::Terminated(TurnOutcome::HostAction { call })
            }
            Route::Auto(tool) => Step::ExecutingAutoTool(tool, call),
            Route::Sensitive(tool) => Step::AwaitingConfirmation(tool, call),
        })
    }

    async fn execute_auto<'a>(
        &'a self,
        turn: &mut Turn<'_>,
        tool: &ToolDescriptor,
        call: ToolCallRequest,
    ) -> Result<Step<'a>> {
        let ctx = turn.tool_context(&call);

        let Some(result) = cancellable(&turn.token, tool.invoke(&call.arguments, &ctx)).await else {
            info!(thread = %turn.thread, tool = %call.name, "Tool call cancelled.");
            turn.state
                .add_tool_call_response(ToolCallResponse::error(&call.id, TOOL_STEP_CANCELLED));
            self.persist(turn)?;

            return Ok(Step::Terminated(TurnOutcome::Cancelled));
        };

        let response = match result {
            Ok(content) => ToolCallResponse::success(&call.id, content),
            Err(error) => {
                debug!(thread = %turn.thread, tool = %call.name, %error, "Tool call failed.");
                ToolCallResponse::error(&call.id, error.to_string())
            }
        };

        turn.state.add_tool_call_response(response);
        self.persist(turn)?;

        Ok(Step::AwaitingModel)
    }

    fn suspend<'a>(
        &'a self,
        turn: &mut Turn<'_>,
        tool: &ToolDescriptor,
        call: ToolCallRequest,
    ) -> Result<Step<'a>> {
        let prompt = tool.confirmation_prompt(&call.arguments);
        let tool_call_id = call.id.clone();

        turn.state
            .set_pending_interrupt(PendingInterrupt::new(call, prompt.clone(), turn.rounds))?;
        self.persist(turn)?;

        info!(thread = %turn.thread, tool = %tool.name(), %tool_call_id, "Waiting for confirmation.");
        Ok(Step::Terminated(TurnOutcome::AwaitingConfirmation {
            tool_call_id,
            prompt,
        }))
    }

    /// Execute a confirmed tool call.
    ///
    /// Once started, the call runs to completion even if the turn is
    /// cancelled: its side effects cannot be rolled back.
    async fn execute_sensitive<'a>(
        &'a self,
        turn: &mut Turn<'_>,
        tool: &ToolDescriptor,
        call: ToolCallRequest,
    ) -> Result<Step<'a>> {
        let ctx = turn.tool_context(&call);

        match tool.invoke(&call.arguments, &ctx).await {
            Ok(content) => {
                turn.state
                    .add_tool_call_response(ToolCallResponse::success(&call.id, content));
                self.persist(turn)?;

                Ok(Step::AwaitingModel)
            }
            Err(error) => {
                warn!(thread = %turn.thread, tool = %call.name, %error, "Confirmed tool call failed.");
                turn.state
                    .add_tool_call_response(ToolCallResponse::error(&call.id, error.to_string()));
                self.persist(turn)?;

                match self.config.sensitive_failure {
                    SensitiveFailure::Report => Ok(Step::AwaitingModel),
                    SensitiveFailure::Abort => Err(Error::SensitiveExecutionFailure {
                        tool: call.name,
                        error: error.to_string(),
                    }),
                }
            }
        }
    }

    fn route<'a>(&'a self, call: &ToolCallRequest, host: &HostContext) -> Result<Route<'a>> {
        if host.is_action(&call.name) {
            return Ok(Route::Host);
        }

        let tool = self
            .registry
            .resolve(&call.name)
            .map_err(|_| Error::UnknownTool(call.name.clone()))?;

        Ok(if tool.is_sensitive() {
            Route::Sensitive(tool)
        } else {
            Route::Auto(tool)
        })
    }

    /// Count a tool call against the turn budget.
    ///
    /// When the budget is spent, the call is answered with an error and the
    /// turn ends with an explicit "unable to complete" message.
    fn spend_round(&self, turn: &mut Turn<'_>, call: &ToolCallRequest) -> Result<()> {
        let limit = self.config.max_tool_rounds;
        if turn.rounds < limit {
            turn.rounds += 1;
            return Ok(());
        }

        warn!(thread = %turn.thread, tool = %call.name, limit, "Tool budget exhausted.");
        let reason = format!("the limit of {limit} tool calls per turn was reached");

        turn.state.add_tool_call_response(ToolCallResponse::error(
            &call.id,
            format!("Tool call not executed: {reason}."),
        ));
        turn.state.add_assistant_message(
            format!("Unable to complete the request: {reason}."),
            vec![],
        );
        self.persist(turn)?;

        Err(Error::TurnBudgetExceeded { limit })
    }

    /// Answer a call to an unknown tool with an error, so the history stays
    /// consistent, and return the error that ends the turn.
    fn reject_unknown(&self, turn: &mut Turn<'_>, call: &ToolCallRequest) -> Error {
        warn!(thread = %turn.thread, tool = %call.name, "Model requested an unknown tool.");
        turn.state.add_tool_call_response(ToolCallResponse::error(
            &call.id,
            format!("Unknown tool: {}", call.name),
        ));

        match self.persist(turn) {
            Ok(()) => Error::UnknownTool(call.name.clone()),
            Err(error) => error,
        }
    }

    fn query(&self, state: &ConversationState, host: &HostContext) -> ChatQuery {
        let system = system_prompt(host, state.context(), self.schema.as_deref());

        let messages = std::iter::once(Message::system(system))
            .chain(state.messages().iter().cloned())
            .collect();

        let tools = self
            .registry
            .list_for_model()
            .into_iter()
            .filter(|tool| !host.is_action(&tool.name))
            .chain(host.actions.iter().cloned())
            .collect();

        ChatQuery::new(messages, tools)
    }

    fn load(&self, thread: &ThreadId) -> Result<ConversationState> {
        self.store
            .load(thread)?
            .ok_or_else(|| Error::UnknownThread(thread.clone()))
    }

    fn persist(&self, turn: &Turn<'_>) -> Result<()> {
        self.store
            .persist(turn.thread, &turn.state)
            .map_err(Into::into)
    }

    fn slot<'a>(&'a self, thread: &'a ThreadId) -> SlotClaim<'a> {
        let slot = self
            .threads
            .lock()
            .entry(thread.clone())
            .or_default()
            .clone();

        SlotClaim {
            threads: &self.threads,
            thread,
            slot,
        }
    }
}

/// Run `future` unless `token` is cancelled first.
async fn cancellable<F: Future>(token: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;

        () = token.cancelled() => None,
        output = future => Some(output),
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
