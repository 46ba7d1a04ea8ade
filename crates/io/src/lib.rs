// File I/O operations

pub mod report;
pub mod sqlite;
pub mod tabular;

pub use report::{render, report_file_name, write_report, ReportSummary};
pub use sqlite::SqliteBenchmarkSource;
pub use tabular::load_table;
