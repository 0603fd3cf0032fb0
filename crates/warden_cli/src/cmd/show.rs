use serde_json::json;
use warden_agent::TurnStatus;
use warden_conversation::{ConversationState, Message, Role};

use crate::{
    cmd::{Output, Success},
    ctx::Ctx,
};

#[derive(Debug, clap::Args)]
pub(crate) struct Show {}

impl Show {
    pub(crate) fn run(self, ctx: &Ctx) -> Output {
        let controller = ctx.controller(false)?;
        let state = controller.history(&ctx.thread)?;
        let status = controller.status(&ctx.thread)?;

        if !ctx.is_tty {
            let status = match status {
                TurnStatus::Idle => json!({ "status": "idle" }),
                TurnStatus::AwaitingConfirmation {
                    tool_call_id,
                    prompt,
                } => json!({
                    "status": "awaiting_confirmation",
                    "tool_call_id": tool_call_id,
                    "prompt": prompt,
                }),
            };

            return Ok(json!({
                "thread": ctx.thread,
                "status": status,
                "state": state,
            })
            .into());
        }

        Ok(Success::Message(render(&state, &status)))
    }
}

fn render(state: &ConversationState, status: &TurnStatus) -> String {
    let mut lines = state.messages().iter().map(render_message).collect::<Vec<_>>();

    lines.push(match status {
        TurnStatus::Idle => "-- idle".to_owned(),
        TurnStatus::AwaitingConfirmation { tool_call_id, .. } => {
            format!("-- awaiting confirmation of {tool_call_id}")
        }
    });

    lines.join("\n")
}

fn render_message(message: &Message) -> String {
    let role = message.role().as_str();

    if let Some(response) = message.as_tool_call_response() {
        let kind = if response.is_error() { "error" } else { "ok" };
        return format!("{role} [{}, {kind}]: {}", response.id, response.content());
    }

    let calls = message
        .tool_calls()
        .iter()
        .map(|call| format!("\n  -> {} [{}] {}", call.name, call.id, json!(call.arguments)))
        .collect::<String>();

    match message.role() {
        Role::Assistant if message.content().is_empty() => format!("{role}:{calls}"),
        _ => format!("{role}: {}{calls}", message.content()),
    }
}
