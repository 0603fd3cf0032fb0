//! Document retrieval used by the operation advice tool.

use std::{collections::HashSet, fmt, fs};

use async_trait::async_trait;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{Error, Result, ToolError};

/// A retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The text of the document.
    #[serde(alias = "pageContent")]
    pub content: String,

    /// Arbitrary metadata. The `source` key names where the document came
    /// from.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    #[must_use]
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("source".to_owned(), Value::String(source.into()));

        Self {
            content: content.into(),
            metadata,
        }
    }

    /// The `source` metadata field, if it is a string.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// A ranked document search backend.
#[async_trait]
pub trait Retriever: fmt::Debug + Send + Sync {
    /// Return at most `k` documents most similar to `query`, best first.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<Document>, ToolError>;
}

/// A local corpus ranked by term overlap with the query.
///
/// ASCII words are matched case-insensitively as whole terms; every other
/// alphanumeric character (e.g. CJK ideographs) is a term of its own.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRetriever {
    documents: Vec<(Document, HashSet<String>)>,
}

impl InMemoryRetriever {
    #[must_use]
    pub fn new(documents: impl IntoIterator<Item = Document>) -> Self {
        Self {
            documents: documents
                .into_iter()
                .map(|doc| {
                    let terms = terms(&doc.content);
                    (doc, terms)
                })
                .collect(),
        }
    }

    /// Load a JSON array of documents.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|error| Error::Corpus {
            path: path.to_string(),
            error: Box::new(error),
        })?;

        let documents: Vec<Document> =
            serde_json::from_str(&contents).map_err(|error| Error::Corpus {
                path: path.to_string(),
                error: Box::new(error),
            })?;

        trace!(%path, documents = documents.len(), "Loaded retrieval corpus.");
        Ok(Self::new(documents))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn search(&self, query: &str, k: usize) -> Vec<Document> {
        let query = terms(query);
        if query.is_empty() {
            return vec![];
        }

        let mut scored = self
            .documents
            .iter()
            .map(|(doc, terms)| (query.intersection(terms).count(), doc))
            .filter(|(score, _)| *score > 0)
            .collect::<Vec<_>>();

        // Stable, so equal scores keep corpus order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(k).map(|(_, doc)| doc.clone()).collect()
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<Document>, ToolError> {
        Ok(self.search(query, k))
    }
}

fn terms(text: &str) -> HashSet<String> {
    let mut terms = HashSet::new();
    let mut word = String::new();

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            word.push(c.to_ascii_lowercase());
            continue;
        }

        if !word.is_empty() {
            terms.insert(std::mem::take(&mut word));
        }

        if !c.is_ascii() && c.is_alphanumeric() {
            terms.insert(c.to_string());
        }
    }

    if !word.is_empty() {
        terms.insert(word);
    }

    terms
}
