//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | config           | Config file problems                     |
//! | 10-19   | run              | Reconciliation run failures              |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use benchgrid_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Config (3-9)
// =============================================================================

/// Config file unreadable or not valid TOML for the schema.
pub const EXIT_CONFIG_PARSE: u8 = 3;

/// Config parsed but failed validation (blank names, equal mode values, ...).
pub const EXIT_CONFIG_INVALID: u8 = 4;

// =============================================================================
// Run (10-19)
// =============================================================================

/// Field mapping missing, malformed or empty.
pub const EXIT_RUN_MAPPING: u8 = 10;

/// Purchase mode could not be determined from the declarations.
pub const EXIT_RUN_MODE: u8 = 11;

/// Benchmark query failed.
pub const EXIT_RUN_QUERY: u8 = 12;

/// Input file, database or report file could not be read or written.
pub const EXIT_RUN_IO: u8 = 13;

/// No `--mapping` given and nothing cached.
pub const EXIT_RUN_NO_MAPPING: u8 = 14;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) => EXIT_CONFIG_PARSE,
        ReconError::ConfigValidation(_) => EXIT_CONFIG_INVALID,
        ReconError::Mapping(_) => EXIT_RUN_MAPPING,
        ReconError::ModeDetermination(_) => EXIT_RUN_MODE,
        ReconError::Query(_) => EXIT_RUN_QUERY,
        ReconError::Io(_) => EXIT_RUN_IO,
    }
}
