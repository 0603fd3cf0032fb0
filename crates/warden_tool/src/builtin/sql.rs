use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;
use warden_sql::{Database, sanitize_with_limit};

use crate::{
    SafetyClass, ToolContext, ToolDefinition, ToolDescriptor, ToolHandler, ToolParameter,
    definition::required_str,
    error::ToolError,
};

pub const HANDLE_SQL: &str = "handleSql";
pub const CREATE_SQL: &str = "createSql";

const DATABASE_CONTENTS: &str = "The database contains music content (artists, albums, tracks), \
                                 customers and employees, sales invoices and invoice lines, and \
                                 playlists.";

/// Read-only queries, validated before they reach the database.
#[derive(Debug, Clone)]
pub struct QueryTool {
    db: Arc<Database>,
    limit: u32,
}

impl QueryTool {
    #[must_use]
    pub const fn new(db: Arc<Database>, limit: u32) -> Self {
        Self { db, limit }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(HANDLE_SQL)
            .with_description(format!(
                "Answer database questions by executing a single read-only SELECT statement. \
                 {DATABASE_CONTENTS} Only queries are handled, never deletes, updates or inserts."
            ))
            .with_parameter(
                "query",
                ToolParameter::string("The SELECT statement answering the question.").required(),
            )
    }

    #[must_use]
    pub fn into_descriptor(self) -> ToolDescriptor {
        ToolDescriptor::new(Self::definition(), SafetyClass::Auto, Arc::new(self))
    }
}

#[async_trait]
impl ToolHandler for QueryTool {
    async fn call(&self, arguments: &Map<String, Value>, _ctx: &ToolContext) -> Result<String, ToolError> {
        let query = sanitize_with_limit(required_str(arguments, "query")?, self.limit)?;
        debug!(%query, "Running read-only query.");

        run(&self.db, query).await
    }
}

/// Statements that add data, executed as given once the user confirms.
#[derive(Debug, Clone)]
pub struct WriteTool {
    db: Arc<Database>,
}

impl WriteTool {
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(CREATE_SQL)
            .with_description(format!(
                "Execute a SQL statement that adds data to the database. {DATABASE_CONTENTS} Only \
                 handles add, create and insert operations. The user must confirm the statement \
                 before it runs."
            ))
            .with_parameter(
                "query",
                ToolParameter::string("The SQL statement to execute.").required(),
            )
    }

    #[must_use]
    pub fn into_descriptor(self) -> ToolDescriptor {
        ToolDescriptor::new(Self::definition(), SafetyClass::Sensitive, Arc::new(self))
    }
}

#[async_trait]
impl ToolHandler for WriteTool {
    async fn call(&self, arguments: &Map<String, Value>, _ctx: &ToolContext) -> Result<String, ToolError> {
        let query = required_str(arguments, "query")?.to_owned();
        debug!(%query, "Running confirmed statement.");

        run(&self.db, query).await
    }

    fn confirmation_prompt(&self, _name: &str, arguments: &Map<String, Value>) -> String {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default();

        format!(
            "The following SQL statement will be executed against the database:\n\n{query}\n\n\
             Reply `confirm` to execute it, or `cancel` to reject it."
        )
    }
}

async fn run(db: &Arc<Database>, query: String) -> Result<String, ToolError> {
    let db = Arc::clone(db);
    let output = tokio::task::spawn_blocking(move || db.run(&query))
        .await
        .map_err(|error| ToolError::Execution(format!("Database task failed: {error}")))??;

    Ok(output.to_json_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use warden_conversation::ThreadId;
    use warden_sql::RejectedStatement;

    use super::*;

    fn db() -> Arc<Database> {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE Artist (ArtistId INTEGER PRIMARY KEY, Name TEXT);
             INSERT INTO Artist (Name) VALUES ('A'), ('B'), ('C'), ('D'), ('E'), ('F');",
        )
        .unwrap();
        Arc::new(db)
    }

    fn ctx() -> ToolContext {
        ToolContext {
            thread: ThreadId::new("sql").unwrap(),
            tool_call_id: "call_1".into(),
            shared: IndexMap::new(),
        }
    }

    fn args(query: &str) -> Map<String, Value> {
        Map::from_iter([("query".to_owned(), json!(query))])
    }

    #[tokio::test]
    async fn test_query_tool_applies_limit() {
        let tool = QueryTool::new(db(), 5).into_descriptor();

        let out = tool
            .invoke(&args("SELECT Name FROM Artist ORDER BY ArtistId"), &ctx())
            .await
            .unwrap();
        let rows: Vec<Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0], json!({ "Name": "A" }));
    }

    #[tokio::test]
    async fn test_query_tool_rejects_writes() {
        let db = db();
        let tool = QueryTool::new(Arc::clone(&db), 5).into_descriptor();

        let result = tool
            .invoke(&args("INSERT INTO Artist (Name) VALUES ('X')"), &ctx())
            .await;
        assert_matches!(result, Err(ToolError::Rejected(RejectedStatement::NotSelect)));

        let result = tool
            .invoke(&args("SELECT 1; DELETE FROM Artist"), &ctx())
            .await;
        assert_matches!(
            result,
            Err(ToolError::Rejected(RejectedStatement::MultipleStatements))
        );

        assert_eq!(
            db.run("SELECT count(*) AS n FROM Artist").unwrap().to_json_string(),
            r#"[{"n":6}]"#
        );
    }

    #[tokio::test]
    async fn test_query_tool_reports_engine_errors() {
        let tool = QueryTool::new(db(), 5).into_descriptor();
        let result = tool.invoke(&args("SELECT missing FROM Artist"), &ctx()).await;

        assert_matches!(result, Err(ToolError::Database(_)));
    }

    #[tokio::test]
    async fn test_write_tool_executes_without_guard() {
        let db = db();
        let tool = WriteTool::new(Arc::clone(&db)).into_descriptor();
        assert!(tool.is_sensitive());

        let out = tool
            .invoke(&args("INSERT INTO Artist (Name) VALUES ('蔡徐坤')"), &ctx())
            .await
            .unwrap();
        assert_eq!(out, r#"{"rows_affected":1}"#);

        assert_eq!(
            db.run("SELECT Name FROM Artist WHERE Name = '蔡徐坤'")
                .unwrap()
                .to_json_string(),
            r#"[{"Name":"蔡徐坤"}]"#
        );
    }

    #[test]
    fn test_write_tool_prompt_contains_statement() {
        let tool = WriteTool::new(db()).into_descriptor();
        let prompt = tool.confirmation_prompt(&args("INSERT INTO Artist (Name) VALUES ('x')"));

        assert!(prompt.contains("INSERT INTO Artist (Name) VALUES ('x')"));
        assert!(prompt.contains("`confirm`"));
    }
}
