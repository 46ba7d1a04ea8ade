//! `bgrid run` and `bgrid validate`.

use std::path::{Path, PathBuf};

use benchgrid_config::FileMappingStore;
use benchgrid_io::{load_table, report_file_name, write_report, SqliteBenchmarkSource};
use benchgrid_recon::{
    run, BenchmarkSource, Lookups, MappingStore, MappingTable, ReconConfig, RunInput, TableSource,
    DEFAULT_MAPPING_KEY,
};
use tracing::warn;

use crate::exit_codes::{EXIT_CONFIG_PARSE, EXIT_RUN_NO_MAPPING};
use crate::CliError;

pub struct RunArgs {
    pub config: PathBuf,
    pub declarations: PathBuf,
    pub mapping: Option<PathBuf>,
    pub benchmarks: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub show_query: bool,
}

fn load_config(path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_CONFIG_PARSE, format!("cannot read config {}: {e}", path.display())))?;
    Ok(ReconConfig::from_toml(&config_str)?)
}

/// The given mapping file (cached for later runs), else the cached one.
fn resolve_mapping(store: &FileMappingStore, mapping: Option<&Path>) -> Result<MappingTable, CliError> {
    match mapping {
        Some(path) => {
            let mapping = MappingTable::from_table(&load_table(path)?)?;
            if let Err(e) = store.save(DEFAULT_MAPPING_KEY, &mapping) {
                warn!(error = %e, "mapping not cached");
            }
            Ok(mapping)
        }
        None => store.load(DEFAULT_MAPPING_KEY).ok_or_else(|| {
            CliError::new(EXIT_RUN_NO_MAPPING, "no field mapping given and none cached")
                .with_hint("pass --mapping <file> once; it is reused by later runs")
        }),
    }
}

fn load_lookups(
    config: &ReconConfig,
    base_dir: &Path,
    database: Option<&SqliteBenchmarkSource>,
) -> Result<Lookups, CliError> {
    let national = match (&config.lookups.national_file, &config.lookups.national_query, database) {
        (Some(file), _, _) => Some(load_table(&base_dir.join(file))?),
        (None, Some(sql), Some(db)) => Some(db.query_table(sql)?),
        _ => None,
    };
    let territory = match &config.lookups.territory_file {
        Some(file) => Some(load_table(&base_dir.join(file))?),
        None => None,
    };
    Ok(Lookups { national, territory })
}

pub fn cmd_run(store: &FileMappingStore, args: RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;

    // Resolve file paths relative to config file's directory
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));

    let declarations = load_table(&args.declarations)?;
    let mapping = resolve_mapping(store, args.mapping.as_deref())?;

    let database = match &args.benchmarks {
        Some(_) => None,
        None => Some(SqliteBenchmarkSource::from_config(&config, base_dir).map_err(|e| {
            CliError::from(e).with_hint("set [source] in the config or pass --benchmarks <file>")
        })?),
    };
    let lookups = load_lookups(&config, base_dir, database.as_ref())?;

    let file_source;
    let source: &dyn BenchmarkSource = match (&database, &args.benchmarks) {
        (Some(db), _) => db,
        (None, Some(path)) => {
            file_source = TableSource::new(load_table(path)?, &config);
            &file_source
        }
        (None, None) => return Err(CliError::args("no benchmark source")),
    };

    let input = RunInput {
        mapping,
        declarations,
        lookups,
    };
    let output = run(&config, &input, source)?;

    let report_path = args.output.unwrap_or_else(|| {
        PathBuf::from(report_file_name(
            &config.report.file_prefix,
            chrono::Local::now().naive_local(),
        ))
    });
    let summary = write_report(&output, &config, &report_path)?;

    if args.show_query {
        match &output.executed_query {
            Some(sql) => eprintln!("query: {sql}"),
            None => eprintln!("query: (benchmarks read from file)"),
        }
    }

    if args.json {
        let doc = serde_json::json!({ "run": &output, "report": &summary });
        let json_str = serde_json::to_string_pretty(&doc)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    // Human summary to stderr
    eprintln!(
        "{} ({}): {} declarations, {} benchmarks, {} rows",
        config.name,
        output.report.mode_name,
        output.declaration_count,
        output.benchmark_count,
        output.table.len(),
    );
    for warning in &output.warnings {
        eprintln!("warning: {warning}");
    }
    eprintln!("wrote {}", summary.path.display());

    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let source = match (&config.source.database, &config.source.query_file, &config.source.query) {
        (Some(db), Some(file), _) => format!("{db} via {file}"),
        (Some(db), None, Some(_)) => format!("{db} via inline query"),
        (Some(db), None, None) => format!("{db} (no query)"),
        (None, _, _) => "none (use --benchmarks)".to_string(),
    };
    eprintln!(
        "valid: '{}' modes {}/{} on '{}', strict_mode = {}, benchmarks: {}",
        config.name,
        config.modes.centralized,
        config.modes.local,
        config.modes.field,
        config.strict_mode,
        source,
    );
    Ok(())
}
