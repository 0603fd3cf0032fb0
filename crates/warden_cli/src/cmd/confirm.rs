use warden_agent::{CONFIRM, HostContext};

use super::{interruptible, render_outcome};
use crate::{cmd::Output, ctx::Ctx};

#[derive(Debug, clap::Args)]
pub(crate) struct Confirm {
    /// The reply to the confirmation prompt.
    ///
    /// Only `confirm` executes the tool call. `cancel`, or any other reply,
    /// rejects it and lets the assistant continue.
    #[arg(default_value = CONFIRM)]
    value: String,
}

impl Confirm {
    pub(crate) async fn run(self, ctx: &Ctx) -> Output {
        let controller = ctx.controller(true)?;
        let host = HostContext::new();

        let turn = controller.submit_confirmation(&ctx.thread, &self.value, &host);
        let outcome = interruptible(&controller, &ctx.thread, turn).await?;

        Ok(render_outcome(outcome, ctx.is_tty))
    }
}
