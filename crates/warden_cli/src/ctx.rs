use std::{
    io::{self, IsTerminal as _},
    sync::Arc,
    time::Duration,
};

use tracing::{debug, trace};
use warden_agent::TurnController;
use warden_config::{Config, tools::RetrievalConfig};
use warden_conversation::ThreadId;
use warden_llm::{OpenAiCompatible, Provider, RetryConfig};
use warden_sql::Database;
use warden_storage::FileStore;
use warden_tool::{
    ToolRegistry,
    builtin::{AdviceTool, QueryTool, WeatherTool, WriteTool},
    retrieval::{InMemoryRetriever, Retriever},
};

use crate::{Globals, error::Result};

/// Context for the CLI application
pub(crate) struct Ctx {
    /// Merged file/env/CLI configuration.
    config: Config,

    /// The thread the command operates on.
    pub(crate) thread: ThreadId,

    /// Whether or not stdout is connected to a TTY.
    pub(crate) is_tty: bool,

    pub(crate) db: Arc<Database>,
    store: Arc<FileStore>,
    registry: Arc<ToolRegistry>,
}

impl Ctx {
    pub(crate) fn new(globals: Globals, config: Config) -> Result<Self> {
        let db_path = config.database.path_or_default(&config.storage.root);
        if let Some(parent) = db_path.parent().filter(|p| !p.as_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        debug!(path = %db_path, "Opening database.");
        let db = Arc::new(Database::open(&db_path)?);

        trace!(root = %config.storage.root, "Opening checkpoint store.");
        let store = Arc::new(FileStore::new(config.storage.root.clone())?);
        let registry = Arc::new(build_registry(&config, &db)?);

        Ok(Self {
            config,
            thread: globals.thread,
            is_tty: io::stdout().is_terminal(),
            db,
            store,
            registry,
        })
    }

    /// Build the turn controller.
    ///
    /// Commands that never call the model pass `require_key = false`, so
    /// inspecting a thread works without the API key being set.
    pub(crate) fn controller(&self, require_key: bool) -> Result<TurnController> {
        let model = &self.config.model;
        let timeout = Duration::from_secs(model.timeout_secs);

        let provider = if require_key {
            OpenAiCompatible::from_env(
                model.base_url.clone(),
                &model.name,
                &model.api_key_env,
                timeout,
            )?
        } else {
            OpenAiCompatible::new(model.base_url.clone(), &model.name, "", timeout)?
        };

        let provider = provider.with_retry(RetryConfig {
            max_retries: model.max_retries,
            ..RetryConfig::default()
        });
        let provider: Arc<dyn Provider> = Arc::new(provider);

        let controller = TurnController::new(
            provider,
            self.registry.clone(),
            self.store.clone(),
            self.config.turn.clone(),
        );

        let schema = self.db.schema()?;
        if schema.trim().is_empty() {
            return Ok(controller);
        }

        Ok(controller.with_schema(schema))
    }
}

fn build_registry(config: &Config, db: &Arc<Database>) -> Result<ToolRegistry> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.model.timeout_secs))
        .build()?;

    let retriever = retriever(&config.retrieval)?;

    let registry = ToolRegistry::new()
        .with(WeatherTool::new(client, config.weather.base_url.clone()).into_descriptor())?
        .with(AdviceTool::new(retriever, config.retrieval.k).into_descriptor())?
        .with(QueryTool::new(db.clone(), config.sql.default_limit).into_descriptor())?
        .with(WriteTool::new(db.clone()).into_descriptor())?;

    debug!(tools = registry.len(), "Registered tools.");
    Ok(registry)
}

/// The corpus searched by the operation advice tool.
///
/// A missing corpus is logged at debug level, since it is built on every
/// invocation.
fn retriever(config: &RetrievalConfig) -> Result<Arc<dyn Retriever>> {
    let retriever: Arc<dyn Retriever> = match &config.corpus {
        Some(path) => Arc::new(InMemoryRetriever::from_json_file(path)?),
        None => {
            debug!("No retrieval corpus configured, operation advice will find no documents.");
            Arc::new(InMemoryRetriever::default())
        }
    };

    Ok(retriever)
}
