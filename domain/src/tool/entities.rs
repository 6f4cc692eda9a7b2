//! Tool domain entities - descriptors and the aggregated catalog
//!
//! A [`ToolDescriptor`] is one tool as advertised by one server. The
//! [`ToolCatalog`] is an immutable snapshot over every server's list that
//! decides which name each tool is exposed under and resolves incoming
//! names back to `(server, tool)`.
//!
//! # Exposure rules
//!
//! | Situation | Exposed as | Accepted names |
//! |-----------|-----------|----------------|
//! | Bare name unique across servers | `echo` | `echo`, `A__echo` |
//! | Bare name on several servers | `A__echo`, `B__echo` | namespaced only |

use super::naming::{nearest_names, qualify};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Suggestions offered for an unknown name.
const MAX_SUGGESTIONS: usize = 3;

/// A tool advertised by a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Name unique within the owning server
    pub name: String,
    /// `<server>__<tool>`, unique process-wide
    pub namespaced_name: String,
    pub owner_server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
    /// Name shown to the model: bare when unique, namespaced otherwise
    pub exposed_name: String,
}

impl ToolDescriptor {
    pub fn new(server: impl Into<String>, name: impl Into<String>) -> Self {
        let server = server.into();
        let name = name.into();
        let namespaced_name = qualify(&server, &name);
        Self {
            exposed_name: namespaced_name.clone(),
            namespaced_name,
            owner_server: server,
            name,
            description: None,
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Build from one entry of a `tools/list` result.
    ///
    /// Returns `None` when the entry has no name.
    pub fn from_listing(server: &str, entry: &Value) -> Option<Self> {
        let name = entry.get("name").and_then(Value::as_str)?;
        if name.is_empty() {
            return None;
        }
        let mut descriptor = Self::new(server, name);
        descriptor.description = entry
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(schema) = entry.get("inputSchema") {
            descriptor.input_schema = schema.clone();
        }
        Some(descriptor)
    }
}

/// Outcome of resolving a requested tool name.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Found(&'a ToolDescriptor),
    /// Bare name exposed by several servers; candidates are namespaced
    Ambiguous(Vec<String>),
    /// No match; nearest exposed names, best first
    NotFound(Vec<String>),
}

/// Immutable snapshot of every server's tools.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    descriptors: Vec<ToolDescriptor>,
    by_namespaced: HashMap<String, usize>,
    by_bare: HashMap<String, Vec<usize>>,
}

impl ToolCatalog {
    /// Build a catalog from per-server tool lists.
    ///
    /// Duplicate names within one server keep the first entry. Exposed
    /// names are unique across the catalog.
    pub fn from_servers<I>(servers: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<ToolDescriptor>)>,
    {
        let mut catalog = Self::default();
        for (server, tools) in servers {
            for mut tool in tools {
                tool.owner_server = server.clone();
                tool.namespaced_name = qualify(&server, &tool.name);
                if catalog.by_namespaced.contains_key(&tool.namespaced_name) {
                    continue;
                }
                let index = catalog.descriptors.len();
                catalog
                    .by_namespaced
                    .insert(tool.namespaced_name.clone(), index);
                catalog
                    .by_bare
                    .entry(tool.name.clone())
                    .or_default()
                    .push(index);
                catalog.descriptors.push(tool);
            }
        }

        for indices in catalog.by_bare.values() {
            let unique = indices.len() == 1;
            for &index in indices {
                let tool = &mut catalog.descriptors[index];
                // a bare name spelled like another server's namespaced name
                // would resolve to that other tool
                let shadowed = catalog.by_namespaced.contains_key(&tool.name);
                tool.exposed_name = if unique && !shadowed {
                    tool.name.clone()
                } else {
                    tool.namespaced_name.clone()
                };
            }
        }
        catalog
    }

    /// All descriptors in server order.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Resolve a requested name.
    ///
    /// Namespaced names take precedence over bare names.
    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        if let Some(&index) = self.by_namespaced.get(name) {
            return Resolution::Found(&self.descriptors[index]);
        }
        match self.by_bare.get(name).map(Vec::as_slice) {
            Some([index]) => Resolution::Found(&self.descriptors[*index]),
            Some(indices) if !indices.is_empty() => Resolution::Ambiguous(
                indices
                    .iter()
                    .map(|&i| self.descriptors[i].namespaced_name.clone())
                    .collect(),
            ),
            _ => Resolution::NotFound(nearest_names(
                name,
                self.descriptors.iter().map(|t| t.exposed_name.as_str()),
                MAX_SUGGESTIONS,
            )),
        }
    }
}
