// SQLite benchmark source

use std::path::Path;

use benchgrid_recon::model::ScopeFilter;
use benchgrid_recon::{BenchmarkSource, FetchedBenchmarks, FilterSpec, ReconConfig, ReconError, Table, Value};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

/// Runs the configured base query against a SQLite database, narrowed by
/// the filter the strategy derived from the declarations.
pub struct SqliteBenchmarkSource {
    conn: Connection,
    base_query: String,
    common_name: String,
    strategy_category: String,
    scope: String,
    global_scope: String,
}

impl SqliteBenchmarkSource {
    pub fn new(conn: Connection, base_query: impl Into<String>, config: &ReconConfig) -> Self {
        Self {
            conn,
            base_query: base_query.into(),
            common_name: config.source.common_name_column.clone(),
            strategy_category: config.source.strategy_category_column.clone(),
            scope: config.source.scope_column.clone(),
            global_scope: config.fields.global_scope.clone(),
        }
    }

    /// Open `[source].database` read-only and resolve the base query from
    /// `[source].query` or `[source].query_file`. Relative paths resolve
    /// against `base_dir`. A missing database is an error, never created.
    pub fn from_config(config: &ReconConfig, base_dir: &Path) -> Result<Self, ReconError> {
        let db = config
            .source
            .database
            .as_deref()
            .ok_or_else(|| ReconError::Io("[source].database is not set".to_string()))?;
        let db_path = base_dir.join(db);
        if !db_path.is_file() {
            return Err(ReconError::Io(format!(
                "benchmark database not found: {}",
                db_path.display()
            )));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)
            .map_err(|e| ReconError::Io(format!("{}: {}", db_path.display(), e)))?;

        let base_query = match (&config.source.query, &config.source.query_file) {
            (Some(q), _) => q.clone(),
            (None, Some(file)) => {
                let path = base_dir.join(file);
                std::fs::read_to_string(&path)
                    .map_err(|e| ReconError::Io(format!("{}: {}", path.display(), e)))?
            }
            (None, None) => {
                return Err(ReconError::Io(
                    "[source] needs either query or query_file".to_string(),
                ))
            }
        };

        Ok(Self::new(conn, base_query, config))
    }

    /// Run a statement verbatim and collect every row.
    pub fn query_table(&self, sql: &str) -> Result<Table, ReconError> {
        self.collect(sql, &[])
    }

    /// Build the filtered statement. Returns the SQL with `?` placeholders and
    /// the bound values in order.
    pub fn build_query(&self, filter: &FilterSpec) -> (String, Vec<String>) {
        let base = self.base_query.trim().trim_end_matches(';');
        let mut sql = format!("SELECT * FROM ({}) AS benchmark WHERE 1=1", base);
        let mut params: Vec<String> = Vec::new();

        let mut name_clauses = Vec::new();
        if !filter.common_names.is_empty() {
            name_clauses.push(in_clause(&self.common_name, &filter.common_names, &mut params));
        }
        if !filter.strategy_categories.is_empty() {
            name_clauses.push(in_clause(&self.strategy_category, &filter.strategy_categories, &mut params));
        }
        if !name_clauses.is_empty() {
            sql.push_str(&format!(" AND ({})", name_clauses.join(" OR ")));
        }

        let scope = quote_ident(&self.scope);
        match filter.scope {
            ScopeFilter::CentralizedOnly => {
                params.push(self.global_scope.clone());
                sql.push_str(&format!(" AND ({} = ?)", scope));
            }
            // No territories: only the name clause applies
            ScopeFilter::Local if filter.territories.is_empty() => {}
            ScopeFilter::Local => {
                params.push(self.global_scope.clone());
                let territories = in_clause(&self.scope, &filter.territories, &mut params);
                sql.push_str(&format!(" AND ({} = ? OR {})", scope, territories));
            }
        }

        (sql, params)
    }

    fn collect(&self, sql: &str, params: &[String]) -> Result<Table, ReconError> {
        let query_err = |e: rusqlite::Error| ReconError::Query(e.to_string());

        let mut stmt = self.conn.prepare(sql).map_err(query_err)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut table = Table::new(columns);
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(query_err)?;
        while let Some(row) = rows.next().map_err(query_err)? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(sql_value(row.get_ref(i).map_err(query_err)?));
            }
            table.push(cells);
        }
        Ok(table)
    }
}

impl BenchmarkSource for SqliteBenchmarkSource {
    fn fetch(&self, filter: &FilterSpec) -> Result<FetchedBenchmarks, ReconError> {
        let (sql, params) = self.build_query(filter);
        debug!(params = params.len(), "executing benchmark query");
        let table = self.collect(&sql, &params)?;
        info!(rows = table.len(), "benchmark query finished");
        Ok(FetchedBenchmarks {
            table,
            query: Some(render_sql(&sql, &params)),
        })
    }
}

fn sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Number(n as f64),
        ValueRef::Real(n) => Value::Number(n),
        ValueRef::Text(bytes) => {
            let s = String::from_utf8_lossy(bytes);
            if s.is_empty() {
                Value::Null
            } else {
                Value::Text(s.into_owned())
            }
        }
        ValueRef::Blob(_) => Value::Null,
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn in_clause(column: &str, values: &[String], params: &mut Vec<String>) -> String {
    params.extend(values.iter().cloned());
    let marks = vec!["?"; values.len()].join(", ");
    format!("{} IN ({})", quote_ident(column), marks)
}

/// Inline the bound values for display. Never executed.
fn render_sql(sql: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut values = params.iter().peekable();
    for ch in sql.chars() {
        match (ch, values.next_if(|_| ch == '?')) {
            (_, Some(v)) => out.push_str(&format!("'{}'", v.replace('\'', "''"))),
            (ch, None) => out.push(ch),
        }
    }
    out
}
