use serde_json::json;

use crate::{
    cmd::{Output, Success},
    ctx::Ctx,
};

#[derive(Debug, clap::Args)]
pub(crate) struct Threads {}

impl Threads {
    pub(crate) fn run(self, ctx: &Ctx) -> Output {
        let threads = ctx.controller(false)?.threads()?;

        if !ctx.is_tty {
            return Ok(json!(threads).into());
        }

        if threads.is_empty() {
            return Ok("No threads.".into());
        }

        let list = threads
            .iter()
            .map(|thread| {
                let marker = if *thread == ctx.thread { "*" } else { " " };
                format!("{marker} {thread}")
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Success::Message(list))
    }
}
