use std::collections::HashMap;

use crate::table::{Table, Value};

/// Result of a left join: the widened table and how many base rows found a
/// lookup row.
#[derive(Debug, Clone)]
pub struct Joined {
    pub table: Table,
    pub matched: usize,
}

/// Left-join `lookup` onto `base` on the canonical text of the key columns.
///
/// With `only = Some((column, output))` a single lookup column is brought in
/// under the name `output` and replaces any base column of that name;
/// unmatched base rows get nulls there.
///
/// Otherwise every lookup column except the key is brought in. A lookup
/// column the base already has only fills in: the base value is kept for
/// unmatched rows and where the lookup cell is null. The first lookup row
/// per key wins.
///
/// Returns a human-readable reason when a required column is missing.
pub fn left_join(
    base: &Table,
    lookup: &Table,
    base_key: &str,
    lookup_key: &str,
    only: Option<(&str, &str)>,
) -> Result<Joined, String> {
    let base_col = base
        .column_index(base_key)
        .ok_or_else(|| format!("declarations have no '{base_key}' column"))?;
    let lookup_col = lookup
        .column_index(lookup_key)
        .ok_or_else(|| format!("lookup table has no '{lookup_key}' column"))?;

    let replace = only.is_some();
    let picked: Vec<(usize, String)> = match only {
        Some((column, output)) => {
            let idx = lookup
                .column_index(column)
                .ok_or_else(|| format!("lookup table has no '{column}' column"))?;
            vec![(idx, output.to_string())]
        }
        None => lookup
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != lookup_col)
            .map(|(i, name)| (i, name.clone()))
            .collect(),
    };

    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, row) in lookup.rows().iter().enumerate() {
        if let Some(key) = row.cells[lookup_col].key_text() {
            index.entry(key).or_insert(i);
        }
    }

    let hits: Vec<Option<usize>> = base
        .rows()
        .iter()
        .map(|row| {
            row.cells[base_col]
                .key_text()
                .and_then(|key| index.get(&key).copied())
        })
        .collect();
    let matched = hits.iter().filter(|h| h.is_some()).count();

    let mut table = base.clone();
    for (lookup_idx, output) in &picked {
        let existing = base.column_index(output).filter(|_| !replace);
        let values = hits
            .iter()
            .zip(base.rows())
            .map(|(hit, row)| {
                let found = hit
                    .map(|r| &lookup.rows()[r].cells[*lookup_idx])
                    .filter(|v| !v.is_null());
                match (found, existing) {
                    (Some(v), _) => v.clone(),
                    (None, Some(col)) => row.cells[col].clone(),
                    (None, None) => Value::Null,
                }
            })
            .collect();
        table.set_column(output, values);
    }

    Ok(Joined { table, matched })
}
