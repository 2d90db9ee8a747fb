//! Retrieved fragments and their canonical text form.
//!
//! Search providers hand back text in different shapes: a document with a
//! `page_content` field and a metadata map, a record whose text only lives
//! in its metadata, or an arbitrary JSON value. [`Fragment`] captures those
//! shapes and [`Fragment::canonical`] translates any of them into a single
//! [`FragmentText`] so the coverage engine never inspects fields itself.
//!
//! # Display-text policy
//!
//! 1. The primary content (`page_content`) when non-empty.
//! 2. Otherwise metadata `"text"`, then metadata `"page_content"`.
//! 3. Otherwise, for a document-shaped fragment, the empty string.
//! 4. Any other shape renders as its JSON text.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::models::PolicyChunk;

/// A unit of retrieved text as returned by a search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fragment {
    /// Document-shaped fragment with a primary content field.
    Document {
        page_content: String,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    /// Anything else a provider may return.
    Raw(Value),
}

/// Canonical `{text, metadata}` pair consumed by the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FragmentText {
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl Fragment {
    /// Fragment carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Fragment::Document {
            page_content: text.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(text: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Fragment::Document {
            page_content: text.into(),
            metadata,
        }
    }

    /// Display text for quoting; see the module docs for the fallback order.
    pub fn display_text(&self) -> String {
        let (primary, metadata) = match self {
            Fragment::Document {
                page_content,
                metadata,
            } => (Some(page_content.clone()), Some(metadata)),
            Fragment::Raw(Value::String(s)) => return s.clone(),
            Fragment::Raw(Value::Object(obj)) => (
                obj.get("page_content").map(value_to_text),
                obj.get("metadata").and_then(Value::as_object),
            ),
            Fragment::Raw(_) => (None, None),
        };

        if let Some(text) = primary.filter(|t| !t.is_empty()) {
            return text;
        }

        if let Some(meta) = metadata {
            for key in ["text", "page_content"] {
                if let Some(text) = meta.get(key).map(value_to_text) {
                    if !text.is_empty() {
                        return text;
                    }
                }
            }
        }

        if self.is_document() {
            return String::new();
        }
        self.to_json().to_string()
    }

    fn is_document(&self) -> bool {
        match self {
            Fragment::Document { .. } => true,
            Fragment::Raw(Value::Object(obj)) => {
                obj.contains_key("page_content") || obj.contains_key("metadata")
            }
            Fragment::Raw(_) => false,
        }
    }

    /// Attached metadata, or an empty map when the fragment has none.
    pub fn metadata(&self) -> Map<String, Value> {
        match self {
            Fragment::Document { metadata, .. } => metadata.clone(),
            Fragment::Raw(Value::Object(obj)) => obj
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            Fragment::Raw(_) => Map::new(),
        }
    }

    pub fn canonical(&self) -> FragmentText {
        FragmentText {
            text: self.display_text(),
            metadata: self.metadata(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Fragment::Document {
                page_content,
                metadata,
            } => json!({ "page_content": page_content, "metadata": metadata }),
            Fragment::Raw(v) => v.clone(),
        }
    }
}

impl From<&PolicyChunk> for Fragment {
    fn from(chunk: &PolicyChunk) -> Self {
        Fragment::with_metadata(chunk.text.clone(), chunk.metadata.clone())
    }
}

fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
