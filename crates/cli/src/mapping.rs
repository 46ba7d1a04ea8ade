//! `bgrid mapping` - the cached field mapping.

use std::path::PathBuf;

use benchgrid_config::FileMappingStore;
use benchgrid_io::load_table;
use benchgrid_recon::{MappingStore, MappingTable, DEFAULT_MAPPING_KEY};
use clap::Subcommand;

use crate::exit_codes::EXIT_RUN_NO_MAPPING;
use crate::CliError;

#[derive(Subcommand)]
pub enum MappingCommands {
    /// Print the cached mapping
    Show {
        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Cache a mapping file (target, declaration, benchmark columns)
    #[command(after_help = "\
Examples:
  bgrid mapping import 映射.xlsx
  bgrid mapping import mapping.csv")]
    Import {
        file: PathBuf,
    },

    /// Remove the cached mapping
    Clear,
}

pub fn cmd_mapping(store: &FileMappingStore, cmd: MappingCommands) -> Result<(), CliError> {
    match cmd {
        MappingCommands::Show { json } => cmd_show(store, json),
        MappingCommands::Import { file } => cmd_import(store, file),
        MappingCommands::Clear => cmd_clear(store),
    }
}

fn cmd_show(store: &FileMappingStore, json: bool) -> Result<(), CliError> {
    let mapping = store.load(DEFAULT_MAPPING_KEY).ok_or_else(|| {
        CliError::new(EXIT_RUN_NO_MAPPING, "no cached mapping")
            .with_hint("bgrid mapping import <file>")
    })?;

    if json {
        let json_str = serde_json::to_string_pretty(&mapping)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    println!("target\tdeclaration\tbenchmark");
    for row in mapping.rows() {
        println!(
            "{}\t{}\t{}",
            row.canonical,
            row.declaration.as_deref().unwrap_or("-"),
            row.benchmark.as_deref().unwrap_or("-"),
        );
    }
    eprintln!("{} field(s) in {}", mapping.len(), store.path_for(DEFAULT_MAPPING_KEY).display());
    Ok(())
}

fn cmd_import(store: &FileMappingStore, file: PathBuf) -> Result<(), CliError> {
    let mapping = MappingTable::from_table(&load_table(&file)?)?;
    store.save(DEFAULT_MAPPING_KEY, &mapping)?;
    eprintln!("cached {} field(s) from {}", mapping.len(), file.display());
    Ok(())
}

fn cmd_clear(store: &FileMappingStore) -> Result<(), CliError> {
    if store.remove(DEFAULT_MAPPING_KEY)? {
        eprintln!("cleared cached mapping");
    } else {
        eprintln!("no cached mapping");
    }
    Ok(())
}
