use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (blank field name, bad merge region, etc.).
    ConfigValidation(String),
    /// Empty or invalid mapping table, or an empty source table handed to the mapper.
    Mapping(String),
    /// No single purchase mode could be read from the declaration set.
    ModeDetermination(String),
    /// Benchmark query failed upstream.
    Query(String),
    /// IO error (file read, CSV decode, etc.).
    Io(String),
}

impl ReconError {
    /// Stable snake_case name for JSON error output.
    ///
    /// Every variant aborts the run; non-fatal conditions are reported as
    /// [`crate::model::Warning`] instead.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "config_parse",
            Self::ConfigValidation(_) => "config_validation",
            Self::Mapping(_) => "mapping",
            Self::ModeDetermination(_) => "mode_determination",
            Self::Query(_) => "query",
            Self::Io(_) => "io",
        }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Mapping(msg) => write!(f, "mapping error: {msg}"),
            Self::ModeDetermination(msg) => write!(f, "cannot determine purchase mode: {msg}"),
            Self::Query(msg) => write!(f, "benchmark query failed: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
