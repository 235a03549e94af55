//! Required configuration fields per node type.

use std::collections::HashMap;

use crate::definition::NodeType;

/// Table mapping a node type to the configuration fields it requires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredFields {
    fields: HashMap<NodeType, Vec<String>>,
}

impl RequiredFields {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds required fields for a node type, keeping existing entries.
    pub fn require(
        &mut self,
        node_type: impl Into<NodeType>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) {
        let entry = self.fields.entry(node_type.into()).or_default();
        for field in fields {
            let field = field.into();
            if !entry.contains(&field) {
                entry.push(field);
            }
        }
    }

    /// Adds required fields and returns the table, for chaining.
    pub fn with(
        mut self,
        node_type: impl Into<NodeType>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.require(node_type, fields);
        self
    }

    /// Merges another table into this one.
    pub fn extend(&mut self, other: RequiredFields) {
        for (node_type, fields) in other.fields {
            self.require(node_type, fields);
        }
    }

    /// Returns the required fields for a node type.
    pub fn fields_for(&self, node_type: &str) -> &[String] {
        self.fields.get(node_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
