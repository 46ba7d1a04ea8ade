use serde::{Deserialize, Serialize};

use crate::mapping::MappingTable;
use crate::table::Table;

// ---------------------------------------------------------------------------
// Purchase mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseMode {
    Centralized,
    Local,
}

impl std::fmt::Display for PurchaseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Centralized => write!(f, "centralized"),
            Self::Local => write!(f, "local"),
        }
    }
}

// ---------------------------------------------------------------------------
// Benchmark query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeFilter {
    /// Only group-scope benchmark records.
    CentralizedOnly,
    /// Group-scope records plus those of the listed territories.
    Local,
}

/// Filter handed to the benchmark source. All lists are distinct, in
/// first-seen order, with nulls and blanks dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    pub scope: ScopeFilter,
    pub common_names: Vec<String>,
    pub strategy_categories: Vec<String>,
    pub territories: Vec<String>,
}

impl FilterSpec {
    pub fn has_name_filter(&self) -> bool {
        !self.common_names.is_empty() || !self.strategy_categories.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: Direction,
}

impl SortKey {
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Descending,
        }
    }
}

// ---------------------------------------------------------------------------
// Report layout
// ---------------------------------------------------------------------------

/// Inclusive 1-based worksheet column range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpan {
    pub first: u16,
    pub last: u16,
}

impl ColumnSpan {
    pub const fn new(first: u16, last: u16) -> Self {
        Self { first, last }
    }
}

/// Mode-specific layout consumed by the report renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportConfig {
    pub mode_name: String,
    pub separators: bool,
    pub merge_regions: [ColumnSpan; 2],
    /// Formula text with a `{row}` placeholder for the declaration's worksheet row.
    pub formula_templates: [String; 2],
}

impl ReportConfig {
    /// Fill template `index` with a 1-based worksheet row number.
    pub fn formula(&self, index: usize, row: u32) -> String {
        self.formula_templates[index].replace("{row}", &row.to_string())
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Non-fatal conditions. The run continues and reports them on the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Warning {
    /// A lookup join was skipped or only partly applied.
    Enrichment(String),
    /// The benchmark source returned no rows.
    QueryResultEmpty,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enrichment(msg) => write!(f, "enrichment: {msg}"),
            Self::QueryResultEmpty => write!(f, "benchmark query returned no rows"),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Optional lookup tables used to enrich declarations before querying.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    /// National reference data, joined on the product code.
    pub national: Option<Table>,
    /// Organization -> reporting territory (local mode only).
    pub territory: Option<Table>,
}

pub struct RunInput {
    pub mapping: MappingTable,
    pub declarations: Table,
    pub lookups: Lookups,
}

/// What a benchmark source returns: the rows and, when there is one, the
/// query text that produced them.
#[derive(Debug, Clone, Default)]
pub struct FetchedBenchmarks {
    pub table: Table,
    pub query: Option<String>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub meta: RunMeta,
    pub mode: PurchaseMode,
    pub filter_spec: FilterSpec,
    pub executed_query: Option<String>,
    pub declaration_count: usize,
    pub benchmark_count: usize,
    pub separator_indices: Vec<usize>,
    pub declaration_indices: Vec<usize>,
    pub warnings: Vec<Warning>,
    pub report: ReportConfig,
    pub table: Table,
}
