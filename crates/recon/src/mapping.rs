use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::table::Table;

/// Store key the CLI caches the active mapping under.
pub const DEFAULT_MAPPING_KEY: &str = "map_df";

// ---------------------------------------------------------------------------
// Mapping table
// ---------------------------------------------------------------------------

/// Which side of the reconciliation a source table comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    Declaration,
    Benchmark,
}

impl std::fmt::Display for SourceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declaration => write!(f, "declaration"),
            Self::Benchmark => write!(f, "benchmark"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRow {
    pub canonical: String,
    #[serde(default)]
    pub declaration: Option<String>,
    #[serde(default)]
    pub benchmark: Option<String>,
}

impl MappingRow {
    pub fn source_for(&self, role: SourceRole) -> Option<&str> {
        match role {
            SourceRole::Declaration => self.declaration.as_deref(),
            SourceRole::Benchmark => self.benchmark.as_deref(),
        }
    }
}

/// Canonical field list with the source field name for each role.
///
/// Canonical names are unique. Rows with a blank canonical name, or with
/// neither source field, are dropped at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MappingRow>", into = "Vec<MappingRow>")]
pub struct MappingTable {
    rows: Vec<MappingRow>,
}

impl MappingTable {
    pub fn new(rows: Vec<MappingRow>) -> Result<Self, ReconError> {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let canonical = row.canonical.trim().to_string();
            let declaration = non_blank(row.declaration);
            let benchmark = non_blank(row.benchmark);
            if canonical.is_empty() || (declaration.is_none() && benchmark.is_none()) {
                continue;
            }
            if !seen.insert(canonical.clone()) {
                return Err(ReconError::Mapping(format!(
                    "canonical field '{canonical}' appears more than once"
                )));
            }
            kept.push(MappingRow {
                canonical,
                declaration,
                benchmark,
            });
        }
        Ok(Self { rows: kept })
    }

    /// Build from any table with at least three columns, read by position:
    /// canonical, declaration source, benchmark source. Header names are ignored.
    pub fn from_table(table: &Table) -> Result<Self, ReconError> {
        if table.width() < 3 {
            return Err(ReconError::Mapping(format!(
                "mapping table needs 3 columns (canonical, declaration, benchmark), got {}",
                table.width()
            )));
        }
        let rows = table
            .rows()
            .iter()
            .map(|row| MappingRow {
                canonical: row.cells[0].key_text().unwrap_or_default(),
                declaration: row.cells[1].key_text(),
                benchmark: row.cells[2].key_text(),
            })
            .collect();
        Self::new(rows)
    }

    pub fn rows(&self) -> &[MappingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn canonical_fields(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.canonical.as_str())
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl TryFrom<Vec<MappingRow>> for MappingTable {
    type Error = ReconError;

    fn try_from(rows: Vec<MappingRow>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl From<MappingTable> for Vec<MappingRow> {
    fn from(table: MappingTable) -> Self {
        table.rows
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Keyed cache for mapping tables. Unreadable entries load as `None`.
pub trait MappingStore {
    fn load(&self, key: &str) -> Option<MappingTable>;
    fn save(&self, key: &str, mapping: &MappingTable) -> Result<(), ReconError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MappingTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MappingStore for MemoryStore {
    fn load(&self, key: &str) -> Option<MappingTable> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).cloned()
    }

    fn save(&self, key: &str, mapping: &MappingTable) -> Result<(), ReconError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ReconError::Io("mapping store lock poisoned".into()))?;
        entries.insert(key.to_string(), mapping.clone());
        Ok(())
    }
}
