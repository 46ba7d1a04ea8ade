use tracing::debug;

use crate::table::{Row, RowSource, Table, Value};

/// Merged table with its separator and declaration row positions.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub table: Table,
    pub separator_indices: Vec<usize>,
    pub declaration_indices: Vec<usize>,
}

/// Put a separator row in front of every declaration row, in one pass.
///
/// Declarations are found by their source tag. An untagged table comes back
/// unchanged with no indices. With `separators` off only the declaration
/// indices are collected.
pub fn insert_separators(table: Table, separators: bool) -> Assembled {
    if !table.is_tagged() {
        return Assembled {
            table,
            separator_indices: Vec::new(),
            declaration_indices: Vec::new(),
        };
    }

    let width = table.width();
    let declarations = table
        .rows()
        .iter()
        .filter(|r| r.source == Some(RowSource::Declaration))
        .count();

    let mut out = Table::new(table.columns().to_vec());
    let mut separator_indices = Vec::with_capacity(if separators { declarations } else { 0 });
    let mut declaration_indices = Vec::with_capacity(declarations);

    for row in table.rows() {
        if row.source == Some(RowSource::Declaration) {
            if separators {
                separator_indices.push(out.len());
                out.push_row(Row {
                    cells: vec![Value::Separator; width],
                    source: Some(RowSource::Separator),
                });
            }
            declaration_indices.push(out.len());
        }
        out.push_row(row.clone());
    }

    debug!(
        separators = separator_indices.len(),
        declarations = declaration_indices.len(),
        rows = out.len(),
        "groups assembled"
    );

    Assembled {
        table: out,
        separator_indices,
        declaration_indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(sources: &[RowSource]) -> Table {
        let mut t = Table::new(["名称", "类别"]);
        for (i, s) in sources.iter().enumerate() {
            t.push_row(Row {
                cells: vec![Value::text(format!("r{i}")), Value::text("C1")],
                source: Some(*s),
            });
        }
        t
    }

    #[test]
    fn separator_precedes_each_declaration() {
        use RowSource::*;
        let a = insert_separators(tagged(&[Declaration, Benchmark, Benchmark, Declaration]), true);
        assert_eq!(a.separator_indices, vec![0, 4]);
        assert_eq!(a.declaration_indices, vec![1, 5]);
        assert_eq!(a.table.len(), 6);
        assert!(a.table.rows()[0].cells.iter().all(Value::is_separator));
        assert_eq!(a.table.rows()[0].source, Some(Separator));
        assert_eq!(a.table.value(3, "名称"), Some(&Value::text("r2")));
    }

    #[test]
    fn without_separators_only_indices_are_collected() {
        use RowSource::*;
        let input = tagged(&[Declaration, Benchmark, Declaration]);
        let a = insert_separators(input.clone(), false);
        assert!(a.separator_indices.is_empty());
        assert_eq!(a.declaration_indices, vec![0, 2]);
        assert_eq!(a.table, input);
    }

    #[test]
    fn untagged_table_is_returned_unchanged() {
        let t = Table::from_rows(["名称"], vec![vec!["x".into()]]);
        let a = insert_separators(t.clone(), true);
        assert_eq!(a.table, t);
        assert!(a.separator_indices.is_empty());
        assert!(a.declaration_indices.is_empty());
    }
}
