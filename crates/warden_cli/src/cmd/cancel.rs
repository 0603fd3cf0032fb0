use serde_json::json;
use tracing::debug;

use crate::{
    cmd::{Output, Success},
    ctx::Ctx,
};

/// Turns in progress are owned by the process running them, and are
/// cancelled with Ctrl-C. This command rejects a pending confirmation.
#[derive(Debug, clap::Args)]
pub(crate) struct Cancel {}

impl Cancel {
    pub(crate) async fn run(self, ctx: &Ctx) -> Output {
        let controller = ctx.controller(false)?;
        let cancelled = controller.cancel_turn(&ctx.thread).await?;
        debug!(thread = %ctx.thread, cancelled, "Cancel requested.");

        if !ctx.is_tty {
            return Ok(json!({ "cancelled": cancelled }).into());
        }

        Ok(Success::from(if cancelled {
            "The pending tool call was cancelled."
        } else {
            "Nothing to cancel."
        }))
    }
}
