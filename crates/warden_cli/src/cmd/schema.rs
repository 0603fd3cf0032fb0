use crate::{cmd::Output, ctx::Ctx};

#[derive(Debug, clap::Args)]
pub(crate) struct Schema {}

impl Schema {
    pub(crate) fn run(self, ctx: &Ctx) -> Output {
        let schema = ctx.db.schema()?;
        if schema.trim().is_empty() {
            return Ok("The database has no tables.".into());
        }

        Ok(schema.into())
    }
}
