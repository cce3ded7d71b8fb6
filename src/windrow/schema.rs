//! Column schema and type layout
//!
//! The schema (ordered header names) and the column→type map are created once
//! when a file is opened and live for the whole scan; every later read of the
//! same file reuses the same mapping. `TypeLayout` is the cached regrouping of
//! that map into per-type column position lists, which is what matrix
//! projection actually consumes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{ScanError, ScanResult};

/// Predicted (or manually assigned) type of one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// UTF-8 text
    Text,
    /// 64-bit signed integer
    Integer,
    /// 64-bit floating point
    Float,
    /// Bracketed numeric vector literal, e.g. `[1.0,2.5,3]`
    Vector,
    /// No type reached the prediction threshold
    Undetermined,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "int"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Vector => write!(f, "vector"),
            ColumnType::Undetermined => write!(f, "undetermined"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "string" => Ok(ColumnType::Text),
            "int" | "integer" => Ok(ColumnType::Integer),
            "float" | "double" => Ok(ColumnType::Float),
            "vector" => Ok(ColumnType::Vector),
            "undetermined" | "undef" => Ok(ColumnType::Undetermined),
            _ => Err(format!("unknown column type: {}", s)),
        }
    }
}

/// Ordered column names from the file's header row; immutable after load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    names: Vec<String>,
}

impl ColumnSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, position: usize) -> Option<&str> {
        self.names.get(position).map(String::as_str)
    }

    /// Position of a column by name, or `None` when absent
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Labels for a list of column positions, in the given order
    pub fn labels(&self, positions: &[usize]) -> Vec<String> {
        positions
            .iter()
            .filter_map(|&p| self.names.get(p).cloned())
            .collect()
    }
}

/// Column position → type, assigned once per file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMap {
    types: HashMap<usize, ColumnType>,
}

impl TypeMap {
    pub fn new(types: HashMap<usize, ColumnType>) -> Self {
        Self { types }
    }

    /// Build from a name-keyed map supplied by the caller.
    ///
    /// Every column of the schema must appear in the map; a missing name
    /// fails with [`ScanError::MissingTypeMapping`] since no meaningful
    /// inference could patch the hole afterwards.
    pub fn from_manual(
        schema: &ColumnSchema,
        by_name: &HashMap<String, ColumnType>,
    ) -> ScanResult<Self> {
        let mut types = HashMap::with_capacity(schema.len());
        for (position, name) in schema.names().iter().enumerate() {
            match by_name.get(name) {
                Some(t) => {
                    types.insert(position, *t);
                }
                None => {
                    return Err(ScanError::MissingTypeMapping {
                        column: name.clone(),
                    })
                }
            }
        }
        Ok(Self { types })
    }

    pub fn get(&self, position: usize) -> ColumnType {
        self.types
            .get(&position)
            .copied()
            .unwrap_or(ColumnType::Undetermined)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Per-type column grouping derived from a [`TypeMap`]
///
/// Positions within each group are sorted ascending so container column order
/// is deterministic. Undetermined columns are routed into the vector group,
/// which acts as the raw-text catch-all during projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeLayout {
    pub float_cols: Vec<usize>,
    pub float_labels: Vec<String>,
    pub int_cols: Vec<usize>,
    pub int_labels: Vec<String>,
    pub text_cols: Vec<usize>,
    pub text_labels: Vec<String>,
    pub vector_cols: Vec<usize>,
    pub vector_labels: Vec<String>,
}

impl TypeLayout {
    pub fn build(schema: &ColumnSchema, types: &TypeMap) -> Self {
        let mut float_cols = Vec::new();
        let mut int_cols = Vec::new();
        let mut text_cols = Vec::new();
        let mut vector_cols = Vec::new();

        for position in 0..schema.len() {
            match types.get(position) {
                ColumnType::Float => float_cols.push(position),
                ColumnType::Integer => int_cols.push(position),
                ColumnType::Text => text_cols.push(position),
                ColumnType::Vector | ColumnType::Undetermined => vector_cols.push(position),
            }
        }

        // 0..len iteration already yields ascending positions
        let float_labels = schema.labels(&float_cols);
        let int_labels = schema.labels(&int_cols);
        let text_labels = schema.labels(&text_cols);
        let vector_labels = schema.labels(&vector_cols);

        Self {
            float_cols,
            float_labels,
            int_cols,
            int_labels,
            text_cols,
            text_labels,
            vector_cols,
            vector_labels,
        }
    }
}
