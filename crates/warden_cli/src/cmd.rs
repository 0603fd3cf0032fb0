mod ask;
mod cancel;
mod confirm;
mod schema;
mod show;
mod threads;

use std::{fmt, num::NonZeroI32};

use serde_json::{Value, json};
use tracing::{info, warn};
use warden_agent::{TurnController, TurnOutcome};
use warden_conversation::ThreadId;

use crate::ctx::Ctx;

const FAILURE: NonZeroI32 = match NonZeroI32::new(1) {
    Some(code) => code,
    None => unreachable!(),
};

#[derive(Debug, clap::Subcommand)]
pub(crate) enum Commands {
    /// Send a message to the assistant.
    #[command(visible_alias = "a")]
    Ask(ask::Ask),

    /// Answer the pending confirmation of a sensitive tool call.
    Confirm(confirm::Confirm),

    /// Cancel the pending confirmation of a thread.
    Cancel(cancel::Cancel),

    /// Show the history and status of a thread.
    Show(show::Show),

    /// List all persisted threads.
    #[command(visible_alias = "ls")]
    Threads(threads::Threads),

    /// Print the schema of the database.
    Schema(schema::Schema),
}

impl Commands {
    pub(crate) async fn run(self, ctx: &Ctx) -> Output {
        match self {
            Commands::Ask(args) => args.run(ctx).await,
            Commands::Confirm(args) => args.run(ctx).await,
            Commands::Cancel(args) => args.run(ctx).await,
            Commands::Show(args) => args.run(ctx),
            Commands::Threads(args) => args.run(ctx),
            Commands::Schema(args) => args.run(ctx),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Commands::Ask(_) => "ask",
            Commands::Confirm(_) => "confirm",
            Commands::Cancel(_) => "cancel",
            Commands::Show(_) => "show",
            Commands::Threads(_) => "threads",
            Commands::Schema(_) => "schema",
        }
    }
}

pub(crate) type Output = std::result::Result<Success, Error>;

/// The type of output that should be printed to the screen.
#[derive(Debug, PartialEq)]
pub(crate) enum Success {
    /// The command was successful.
    Ok,

    /// Single message to be printed to the screen.
    Message(String),

    /// JSON value to be printed.
    Json(Value),
}

impl From<String> for Success {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<&str> for Success {
    fn from(value: &str) -> Self {
        value.to_owned().into()
    }
}

impl From<Value> for Success {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Run a turn, cancelling it when the user presses Ctrl-C.
///
/// The turn keeps being polled while the cancellation is processed, so it can
/// observe the cancellation and release the thread.
pub(crate) async fn interruptible<F>(
    controller: &TurnController,
    thread: &ThreadId,
    turn: F,
) -> Result<TurnOutcome, warden_agent::Error>
where
    F: Future<Output = Result<TurnOutcome, warden_agent::Error>>,
{
    tokio::pin!(turn);

    tokio::select! {
        outcome = &mut turn => outcome,
        signal = tokio::signal::ctrl_c() => {
            if let Err(error) = signal {
                warn!(%error, "Unable to listen for Ctrl-C.");
                return turn.await;
            }

            info!(%thread, "Interrupted, cancelling turn.");
            let (outcome, cancelled) = tokio::join!(&mut turn, controller.cancel_turn(thread));
            cancelled?;
            outcome
        }
    }
}

/// Render the outcome of a turn.
pub(crate) fn render_outcome(outcome: TurnOutcome, is_tty: bool) -> Success {
    if !is_tty {
        return match outcome {
            TurnOutcome::Completed { message } => {
                json!({ "status": "completed", "message": message })
            }
            TurnOutcome::AwaitingConfirmation {
                tool_call_id,
                prompt,
            } => json!({
                "status": "awaiting_confirmation",
                "tool_call_id": tool_call_id,
                "prompt": prompt,
            }),
            TurnOutcome::HostAction { call } => json!({ "status": "host_action", "call": call }),
            TurnOutcome::Cancelled => json!({ "status": "cancelled" }),
        }
        .into();
    }

    match outcome {
        TurnOutcome::Completed { message } => message.into(),
        TurnOutcome::AwaitingConfirmation { prompt, .. } => format!(
            "{prompt}\n\nRun `warden confirm` to execute it, or `warden confirm cancel` to reject \
             it."
        )
        .into(),
        TurnOutcome::HostAction { call } => json!(call).into(),
        TurnOutcome::Cancelled => "Turn cancelled.".into(),
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) struct Error {
    /// The error code.
    ///
    /// Used to exit the CLI with a specific exit code. This is usually `1`.
    pub(crate) code: NonZeroI32,

    /// The optional error message to be displayed to the user.
    pub(crate) message: Option<String>,

    /// Metadata to be displayed to the user.
    pub(crate) metadata: Vec<(String, Value)>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message.as_deref().unwrap_or_default())
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self {
            code: FAILURE,
            message: Some(message),
            metadata: vec![],
        }
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        message.to_owned().into()
    }
}

impl From<crate::error::Error> for Error {
    fn from(error: crate::error::Error) -> Self {
        use crate::error::Error::*;

        match error {
            Command(error) => error,
            Config(error) => error.into(),
            Agent(error) => error.into(),
            Storage(error) => error.into(),
            Sql(error) => error.into(),
            Tool(error) => error.into(),
            Llm(error) => error.into(),
            Http(error) => error.into(),
            Io(error) => error.into(),
            error @ NonUtf8Path(_) => error.to_string().into(),
        }
    }
}

/// An error with its chain of sources as metadata.
fn with_cause(mut error: &dyn std::error::Error, message: &str) -> Error {
    let mut metadata = vec![("error".to_owned(), Value::String(error.to_string()))];

    let mut causes = vec![];
    while let Some(cause) = error.source() {
        error = cause;
        causes.push(Value::String(error.to_string()));
    }

    if !causes.is_empty() {
        metadata.push(("causes".to_owned(), Value::Array(causes)));
    }

    Error {
        code: FAILURE,
        message: Some(message.to_owned()),
        metadata,
    }
}

macro_rules! impl_from_error {
    ($error:ty, $message:expr) => {
        impl From<$error> for Error {
            fn from(error: $error) -> Self {
                with_cause(&error, $message)
            }
        }
    };
}

impl_from_error!(warden_agent::Error, "Agent error");
impl_from_error!(warden_config::Error, "Config error");
impl_from_error!(warden_llm::Error, "LLM error");
impl_from_error!(warden_sql::Error, "Database error");
impl_from_error!(warden_storage::Error, "Storage error");
impl_from_error!(warden_tool::Error, "Tool error");
impl_from_error!(reqwest::Error, "Error while making HTTP request");
impl_from_error!(std::io::Error, "IO error");

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use warden_conversation::ToolCallRequest;

    use super::*;

    #[test]
    fn test_render_outcome_tty() {
        assert_eq!(
            render_outcome(
                TurnOutcome::Completed {
                    message: "There are 275 artists.".into()
                },
                true
            ),
            Success::Message("There are 275 artists.".into())
        );

        let Success::Message(message) = render_outcome(
            TurnOutcome::AwaitingConfirmation {
                tool_call_id: "call_1".into(),
                prompt: "Execute this statement?".into(),
            },
            true,
        ) else {
            panic!("expected a message");
        };

        assert!(message.starts_with("Execute this statement?\n\n"));
        assert!(message.contains("`warden confirm cancel`"));
    }

    #[test]
    fn test_render_outcome_json() {
        assert_eq!(
            render_outcome(
                TurnOutcome::AwaitingConfirmation {
                    tool_call_id: "call_1".into(),
                    prompt: "Execute?".into(),
                },
                false
            ),
            Success::Json(json!({
                "status": "awaiting_confirmation",
                "tool_call_id": "call_1",
                "prompt": "Execute?",
            }))
        );

        let call = ToolCallRequest::new("call_2", "setThemeColor", serde_json::Map::new());
        assert_eq!(
            render_outcome(TurnOutcome::HostAction { call }, false),
            Success::Json(json!({
                "status": "host_action",
                "call": { "id": "call_2", "name": "setThemeColor", "arguments": {} },
            }))
        );

        assert_eq!(
            render_outcome(TurnOutcome::Cancelled, false),
            Success::Json(json!({ "status": "cancelled" }))
        );
    }

    #[test]
    fn test_error_with_cause() {
        let error = Error::from(warden_agent::Error::TurnBudgetExceeded { limit: 2 });

        assert_eq!(error.code, FAILURE);
        assert_eq!(error.message.as_deref(), Some("Agent error"));
        assert_eq!(error.metadata[0].0, "error");
        assert_eq!(error.to_string(), "Agent error");
    }
}
