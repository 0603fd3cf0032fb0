//! Validation of free-text SQL before it reaches the database through the
//! read-only query tool.
//!
//! Accepted statements are a single `SELECT` with no data-modifying keyword
//! anywhere in the text. A row limit is appended when the statement does not
//! already end with one. Statements that modify data go through the
//! confirmation-gated tool instead.

use std::sync::LazyLock;

use fancy_regex::Regex;
use tracing::warn;

/// The row limit appended to queries that do not specify one.
pub const DEFAULT_LIMIT: u32 = 5;

static FORBIDDEN_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"(?i)\b(INSERT|UPDATE|DELETE|ALTER|DROP|CREATE|REPLACE|TRUNCATE)\b")
});

static LIMIT_TAIL: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"(?i)\blimit\b\s+\d+(\s*,\s*\d+)?\s*$"));

/// The reason a statement was refused by [`sanitize`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectedStatement {
    #[error("multiple statements are not allowed.")]
    MultipleStatements,

    #[error("Only SELECT statements are allowed")]
    NotSelect,

    #[error("DML/DDL detected ({0}). Only read-only queries are permitted.")]
    ForbiddenKeyword(String),

    #[error("The statement could not be verified as read-only.")]
    Unverifiable,
}

/// Validate a read-only query, appending ` LIMIT 5` if it has no limit.
///
/// See [`sanitize_with_limit`].
pub fn sanitize(raw: &str) -> Result<String, RejectedStatement> {
    sanitize_with_limit(raw, DEFAULT_LIMIT)
}

/// Validate a read-only query and normalize it for execution.
///
/// The statement is trimmed and at most one trailing semicolon is removed. It
/// is rejected if it still contains a semicolon, does not start with
/// `SELECT`, or contains a data-modifying keyword as a whole word (all
/// case-insensitive). Unless the statement already ends with `LIMIT n` or
/// `LIMIT n, m`, ` LIMIT {limit}` is appended.
pub fn sanitize_with_limit(raw: &str, limit: u32) -> Result<String, RejectedStatement> {
    let query = raw.trim();
    let query = query.strip_suffix(';').unwrap_or(query).trim_end();

    if query.contains(';') {
        return Err(RejectedStatement::MultipleStatements);
    }

    if !query
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"))
    {
        return Err(RejectedStatement::NotSelect);
    }

    match FORBIDDEN_KEYWORD.captures(query) {
        Ok(None) => {}
        Ok(Some(captures)) => {
            let keyword = captures
                .get(1)
                .map(|m| m.as_str().to_ascii_uppercase())
                .unwrap_or_default();

            return Err(RejectedStatement::ForbiddenKeyword(keyword));
        }
        Err(error) => {
            warn!(%error, "Unable to scan statement for forbidden keywords.");
            return Err(RejectedStatement::Unverifiable);
        }
    }

    let has_limit = LIMIT_TAIL.is_match(query).unwrap_or_else(|error| {
        warn!(%error, "Unable to scan statement for a LIMIT clause.");
        false
    });

    if has_limit {
        Ok(query.to_owned())
    } else {
        Ok(format!("{query} LIMIT {limit}"))
    }
}

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        // Both patterns are covered by `test_patterns_compile`.
        Err(error) => panic!("invalid regex pattern `{pattern}`: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_patterns_compile() {
        LazyLock::force(&FORBIDDEN_KEYWORD);
        LazyLock::force(&LIMIT_TAIL);
    }

    #[test]
    fn test_sanitize_appends_limit() {
        assert_eq!(sanitize("SELECT * FROM t").unwrap(), "SELECT * FROM t LIMIT 5");
        assert_eq!(
            sanitize("  select Name from Artist;  ").unwrap(),
            "select Name from Artist LIMIT 5"
        );
        assert_eq!(
            sanitize_with_limit("SELECT 1", 20).unwrap(),
            "SELECT 1 LIMIT 20"
        );
    }

    #[test]
    fn test_sanitize_keeps_existing_limit() {
        let cases = [
            ("SELECT * FROM t LIMIT 10", "SELECT * FROM t LIMIT 10"),
            ("SELECT * FROM t limit 10, 20;", "SELECT * FROM t limit 10, 20"),
            ("SELECT * FROM t LIMIT 3 ;", "SELECT * FROM t LIMIT 3"),
        ];

        for (input, expected) in cases {
            assert_eq!(sanitize(input).unwrap(), expected, "{input}");
        }

        // A LIMIT in a subquery does not count.
        assert_eq!(
            sanitize("SELECT * FROM (SELECT * FROM t LIMIT 2) x").unwrap(),
            "SELECT * FROM (SELECT * FROM t LIMIT 2) x LIMIT 5"
        );
    }

    #[test]
    fn test_sanitize_rejects_multiple_statements() {
        for input in [
            "SELECT 1; DROP TABLE t",
            "SELECT 1; SELECT 2;",
            "SELECT 1;;",
            "SELECT 1; select 2",
        ] {
            assert_eq!(
                sanitize(input),
                Err(RejectedStatement::MultipleStatements),
                "{input}"
            );
        }
    }

    #[test]
    fn test_sanitize_rejects_non_select() {
        for input in [
            "",
            "   ",
            ";",
            "INSERT INTO t VALUES (1)",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "sel",
            "  -- comment\nSELECT 1",
            "ＳＥＬＥＣＴ 1",
        ] {
            assert_eq!(sanitize(input), Err(RejectedStatement::NotSelect), "{input:?}");
        }
    }

    #[test]
    fn test_sanitize_rejects_forbidden_keywords() {
        assert_eq!(
            sanitize("SELECT * FROM t WHERE x = 'a' OR 1=1 UNION SELECT * FROM t2 delete"),
            Err(RejectedStatement::ForbiddenKeyword("DELETE".into()))
        );

        for keyword in [
            "insert", "UPDATE", "Delete", "alter", "DROP", "create", "replace", "TRUNCATE",
        ] {
            assert_matches!(
                sanitize(&format!("SELECT {keyword} FROM t")),
                Err(RejectedStatement::ForbiddenKeyword(k)) if k == keyword.to_ascii_uppercase()
            );
        }
    }

    #[test]
    fn test_sanitize_matches_whole_words_only() {
        assert_eq!(
            sanitize("SELECT created_at, updated FROM t").unwrap(),
            "SELECT created_at, updated FROM t LIMIT 5"
        );
        assert_eq!(
            sanitize("SELECT dropped FROM t").unwrap(),
            "SELECT dropped FROM t LIMIT 5"
        );
    }

    #[test]
    fn test_sanitize_output_never_contains_semicolon() {
        let inputs = [
            "SELECT 1;",
            "SELECT ';'",
            "SELECT 1 ; ",
            "SELECT a FROM b LIMIT 1;",
            "select x;\n",
        ];

        for input in inputs {
            if let Ok(output) = sanitize(input) {
                assert!(!output.contains(';'), "{input:?} -> {output:?}");
            }
        }
    }
}
