use clap::ArgAction;
use serde_json::Value;
use warden_agent::HostContext;

use super::{interruptible, render_outcome};
use crate::{cmd::Output, ctx::Ctx};

#[derive(Debug, clap::Args)]
pub(crate) struct Ask {
    /// The message to send.
    #[arg(required = true, num_args = 1..)]
    message: Vec<String>,

    /// Context to give the assistant, listed in the system message.
    #[arg(
        short,
        long,
        value_name = "DESCRIPTION=VALUE",
        value_parser = parse_key_value,
        action = ArgAction::Append
    )]
    context: Vec<(String, String)>,

    /// A shared state field. Values that are not valid JSON are used as
    /// strings.
    #[arg(
        short,
        long,
        value_name = "KEY=JSON",
        value_parser = parse_shared,
        action = ArgAction::Append
    )]
    shared: Vec<(String, Value)>,
}

impl Ask {
    pub(crate) async fn run(self, ctx: &Ctx) -> Output {
        let text = self.message.join(" ");
        if text.trim().is_empty() {
            return Err("The message must not be empty.".into());
        }

        let host = self
            .context
            .into_iter()
            .fold(HostContext::new(), |host, (description, value)| {
                host.with_context(description, value)
            });
        let host = self
            .shared
            .into_iter()
            .fold(host, |host, (key, value)| host.with_shared(key, value));

        let controller = ctx.controller(true)?;
        let turn = controller.submit_user_message(&ctx.thread, &text, &host);
        let outcome = interruptible(&controller, &ctx.thread, turn).await?;

        Ok(render_outcome(outcome, ctx.is_tty))
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.to_owned()))
        }
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

fn parse_shared(s: &str) -> Result<(String, Value), String> {
    let (key, value) = parse_key_value(s)?;
    let value = serde_json::from_str(&value).unwrap_or(Value::String(value));

    Ok((key, value))
}
