use tracing::debug;

use crate::error::ReconError;
use crate::mapping::{MappingTable, SourceRole};
use crate::table::{Row, Table, Value};

/// Project `source` onto the mapping's canonical fields for `role`.
///
/// Every canonical field is present in the output, in mapping order. Fields
/// the role has no source for, or whose source column is missing, hold the
/// empty-string placeholder.
pub fn map_fields(
    mapping: &MappingTable,
    source: &Table,
    role: SourceRole,
) -> Result<Table, ReconError> {
    if mapping.is_empty() {
        return Err(ReconError::Mapping("mapping table is empty".into()));
    }
    if source.is_empty() {
        return Err(ReconError::Mapping(format!("{role} table is empty")));
    }

    let positions: Vec<Option<usize>> = mapping
        .rows()
        .iter()
        .map(|row| row.source_for(role).and_then(|field| source.column_index(field)))
        .collect();

    let missing = positions.iter().filter(|p| p.is_none()).count();
    debug!(
        %role,
        fields = positions.len(),
        placeholders = missing,
        "mapping fields"
    );

    let mut out = Table::new(mapping.canonical_fields());
    for row in source.rows() {
        let cells = positions
            .iter()
            .map(|p| match p {
                Some(i) => row.cells[*i].clone(),
                None => Value::text(""),
            })
            .collect();
        out.push_row(Row {
            cells,
            source: row.source,
        });
    }
    Ok(out)
}
