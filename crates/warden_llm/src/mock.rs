//! A [`Provider`] that replays scripted replies.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use warden_conversation::ToolCallRequest;

use crate::{
    error::{Error, Result},
    provider::{Provider, Reply},
    query::ChatQuery,
};

#[derive(Debug)]
enum Step {
    Reply(Reply),
    Fail(u16, String),
    Hang,
}

/// Replays a fixed sequence of replies, one per request, and records every
/// query it receives.
///
/// When the script runs out, requests fail with [`Error::Script`].
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    queries: Mutex<Vec<ChatQuery>>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reply(self, reply: Reply) -> Self {
        self.steps.lock().push_back(Step::Reply(reply));
        self
    }

    /// Reply with plain text.
    #[must_use]
    pub fn text(self, content: &str) -> Self {
        self.reply(Reply::text(content))
    }

    /// Reply with a single tool call.
    #[must_use]
    pub fn tool_call(self, id: &str, name: &str, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        self.reply(Reply::tool_call(ToolCallRequest::new(id, name, arguments)))
    }

    /// Fail the request with an API error.
    #[must_use]
    pub fn fail(self, code: u16, message: &str) -> Self {
        self.steps
            .lock()
            .push_back(Step::Fail(code, message.to_owned()));
        self
    }

    /// Never answer the request.
    #[must_use]
    pub fn hang(self) -> Self {
        self.steps.lock().push_back(Step::Hang);
        self
    }

    /// The queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<ChatQuery> {
        self.queries.lock().clone()
    }

    /// The number of steps not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.steps.lock().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat_completion(&self, query: &ChatQuery) -> Result<Reply> {
        self.queries.lock().push(query.clone());

        let step = self.steps.lock().pop_front();
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(code, message)) => Err(Error::Api { code, message }),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(Error::Script("no scripted reply left".into())),
        }
    }
}
