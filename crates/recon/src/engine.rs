use tracing::{debug, info, warn};

use crate::assemble::insert_separators;
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::mapper::map_fields;
use crate::mapping::SourceRole;
use crate::merger::merge;
use crate::model::{FetchedBenchmarks, FilterSpec, RunInput, RunMeta, RunOutput, ScopeFilter, Warning};
use crate::normalize::normalize;
use crate::strategy::Strategy;
use crate::table::{Table, Value};

// ---------------------------------------------------------------------------
// Benchmark sources
// ---------------------------------------------------------------------------

/// Executes the benchmark query for a filter.
pub trait BenchmarkSource {
    fn fetch(&self, filter: &FilterSpec) -> Result<FetchedBenchmarks, ReconError>;
}

/// Benchmark rows already in memory, filtered with the same rules the
/// relational source applies in SQL.
#[derive(Debug, Clone)]
pub struct TableSource {
    table: Table,
    common_name: String,
    strategy_category: String,
    scope: String,
    global_scope: String,
}

impl TableSource {
    /// Column names come from `[source]`, the group scope value from `[fields]`.
    pub fn new(table: Table, config: &ReconConfig) -> Self {
        Self {
            table,
            common_name: config.source.common_name_column.clone(),
            strategy_category: config.source.strategy_category_column.clone(),
            scope: config.source.scope_column.clone(),
            global_scope: config.fields.global_scope.clone(),
        }
    }
}

fn listed(value: &Value, list: &[String]) -> bool {
    value.key_text().is_some_and(|k| list.contains(&k))
}

impl BenchmarkSource for TableSource {
    fn fetch(&self, filter: &FilterSpec) -> Result<FetchedBenchmarks, ReconError> {
        let global = Value::text(self.global_scope.as_str());
        let table = self.table.filter(|r| {
            let names_ok = !filter.has_name_filter()
                || listed(r.value_or_null(&self.common_name), &filter.common_names)
                || listed(r.value_or_null(&self.strategy_category), &filter.strategy_categories);
            let scope = r.value_or_null(&self.scope);
            let scope_ok = match filter.scope {
                ScopeFilter::CentralizedOnly => scope.matches(&global),
                // No territories means no scope clause at all
                ScopeFilter::Local if filter.territories.is_empty() => true,
                ScopeFilter::Local => scope.matches(&global) || listed(scope, &filter.territories),
            };
            names_ok && scope_ok
        });
        debug!(rows = table.len(), of = self.table.len(), "in-memory benchmarks filtered");
        Ok(FetchedBenchmarks { table, query: None })
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// One reconciliation run: select strategy, enrich, fetch benchmarks, map,
/// merge, insert separators, normalize.
pub fn run(
    config: &ReconConfig,
    input: &RunInput,
    source: &dyn BenchmarkSource,
) -> Result<RunOutput, ReconError> {
    let strategy = Strategy::select(config, &input.declarations)?;
    let mut warnings = Vec::new();

    let enriched = strategy.enrich(&input.declarations, &input.lookups);
    warnings.extend(enriched.warnings);
    let declarations = enriched.table;

    let filter_spec = strategy.query_params(&declarations);
    debug!(
        common_names = filter_spec.common_names.len(),
        strategy_categories = filter_spec.strategy_categories.len(),
        territories = filter_spec.territories.len(),
        "benchmark filter built"
    );

    let fetched = source.fetch(&filter_spec)?;
    if fetched.table.is_empty() {
        warn!("benchmark query returned no rows");
        warnings.push(Warning::QueryResultEmpty);
    }

    let mapped_declarations = map_fields(&input.mapping, &declarations, SourceRole::Declaration)?;
    let mapped_benchmarks = if fetched.table.is_empty() {
        Table::new(mapped_declarations.columns().to_vec())
    } else {
        map_fields(&input.mapping, &fetched.table, SourceRole::Benchmark)?
    };

    let merged = merge(&mapped_declarations, &mapped_benchmarks, &strategy);
    let report = strategy.report_config().clone();
    let mut assembled = insert_separators(merged, report.separators);
    if !assembled.table.is_tagged() {
        // Merge short-circuited: every row is a standalone declaration
        assembled.declaration_indices = (0..assembled.table.len()).collect();
    }

    let table = normalize(&assembled.table, &config.normalize);

    info!(
        mode = %strategy.mode(),
        declarations = assembled.declaration_indices.len(),
        benchmarks = fetched.table.len(),
        rows = table.len(),
        warnings = warnings.len(),
        "reconciliation complete"
    );

    Ok(RunOutput {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        mode: strategy.mode(),
        filter_spec,
        executed_query: fetched.query,
        declaration_count: assembled.declaration_indices.len(),
        benchmark_count: fetched.table.len(),
        separator_indices: assembled.separator_indices,
        declaration_indices: assembled.declaration_indices,
        warnings,
        report,
        table,
    })
}
