//! The system message sent ahead of the conversation history.

use indexmap::IndexMap;
use serde_json::Value;

use crate::host::HostContext;

const PREAMBLE: &str = "You are a helpful assistant. Use the provided context when relevant.";

const SQL_RULES: &str = "\
Rules:
- Think step-by-step.
- When you need data, call the tool `handleSql` with ONE SELECT query.
- `handleSql` is read-only; no INSERT/UPDATE/DELETE/ALTER/DROP/CREATE/REPLACE/TRUNCATE.
- To change data, call `createSql`. The user has to confirm the statement before it runs.
- If the tool returns 'Error:', revise the SQL and try again.
- If you are not successful after 5 attempts, return a note to the user.
- Prefer explicit column lists; avoid SELECT *.";

/// Render the system message.
///
/// The host context entries become `description: value` lines, every shared
/// field is rendered as JSON under its capitalized name. The SQL section is
/// only present when a database `schema` is known.
pub fn system_prompt(
    host: &HostContext,
    shared: &IndexMap<String, Value>,
    schema: Option<&str>,
) -> String {
    let context = host
        .context
        .iter()
        .map(|entry| format!("{}: {}", entry.description, entry.value))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!("{PREAMBLE}\n\nContext:\n{context}");

    for (key, value) in shared {
        prompt.push_str(&format!("\n\n{}: {value}", capitalize(key)));
    }

    if let Some(schema) = schema.filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!(
            "\n\nYou are also a careful SQLite analyst.\n\nAuthoritative schema (do not invent \
             columns/tables):\n{schema}\n\n{SQL_RULES}"
        ));
    }

    prompt
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_system_prompt_renders_context_and_shared_fields() {
        let host = HostContext::new()
            .with_context("The current theme color", "#6366f1")
            .with_context("The user's name", "Ada");

        let shared = IndexMap::from_iter([("proverbs".to_owned(), json!(["CopilotKit may be new"]))]);

        assert_eq!(
            system_prompt(&host, &shared, None),
            "You are a helpful assistant. Use the provided context when relevant.\n\nContext:\nThe \
             current theme color: #6366f1\nThe user's name: Ada\n\nProverbs: [\"CopilotKit may be \
             new\"]"
        );
    }

    #[test]
    fn test_system_prompt_without_context() {
        let prompt = system_prompt(&HostContext::new(), &IndexMap::new(), Some("  "));
        assert_eq!(prompt, format!("{PREAMBLE}\n\nContext:\n"));
    }

    #[test]
    fn test_system_prompt_includes_schema() {
        let schema = "CREATE TABLE Artist (ArtistId INTEGER PRIMARY KEY, Name TEXT)";
        let prompt = system_prompt(&HostContext::new(), &IndexMap::new(), Some(schema));

        assert!(prompt.contains(&format!("(do not invent columns/tables):\n{schema}\n\nRules:")));
        assert!(prompt.ends_with("avoid SELECT *."));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("proverbs"), "Proverbs");
        assert_eq!(capitalize("ärger"), "Ärger");
        assert_eq!(capitalize(""), "");
    }
}
