use tracing::debug;

use crate::config::ColumnClasses;
use crate::table::{format_number, Table, Value};

/// Text written in place of every missing value.
pub const MISSING: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    ForceText,
    Percent,
    Decimal(i32),
}

impl ColumnClasses {
    fn class_of(&self, column: &str) -> Option<Class> {
        let has = |list: &[String]| list.iter().any(|c| c == column);
        if has(&self.force_text) {
            Some(Class::ForceText)
        } else if has(&self.percent) {
            Some(Class::Percent)
        } else if has(&self.decimal_2) {
            Some(Class::Decimal(2))
        } else if has(&self.decimal_1) {
            Some(Class::Decimal(1))
        } else if has(&self.integer) {
            Some(Class::Decimal(0))
        } else {
            None
        }
    }
}

/// Coerce values per column class and fill missing values with [`MISSING`].
///
/// Empty strings count as missing. Columns that are entirely missing are
/// left alone until the fill. Numeric classes round half-to-even and turn
/// unparseable values into missing. Separator cells are never touched. The
/// source tags are dropped last.
///
/// Every class except percent is stable under a second pass over its own
/// output. Percent divides by 100 each time, so the output carries a
/// normalized marker and a marked table is returned as is. A table rebuilt
/// from the cells alone has lost the marker and must not be normalized again.
pub fn normalize(table: &Table, classes: &ColumnClasses) -> Table {
    if table.is_normalized() {
        return table.clone();
    }
    let mut out = table.clone();

    for row in out.rows_mut() {
        for cell in &mut row.cells {
            if matches!(cell, Value::Text(s) if s.is_empty()) {
                *cell = Value::Null;
            }
        }
    }

    let columns = out.columns().to_vec();
    let mut coerced = 0usize;
    for column in &columns {
        let Some(class) = classes.class_of(column) else {
            continue;
        };
        let all_missing = out.column(column).map_or(true, |mut v| v.all(Value::is_null));
        if all_missing {
            continue;
        }
        out.map_column(column, |v| coerce(v, class));
        coerced += 1;
    }

    for row in out.rows_mut() {
        for cell in &mut row.cells {
            if cell.is_null() {
                *cell = Value::text(MISSING);
            }
        }
    }

    out.clear_tags();
    out.set_normalized(true);
    debug!(rows = out.len(), coerced_columns = coerced, "values normalized");
    out
}

fn coerce(value: &Value, class: Class) -> Value {
    match value {
        Value::Null | Value::Separator => value.clone(),
        _ => match class {
            Class::ForceText => match value {
                Value::Number(n) => Value::Text(format_number(*n)),
                other => other.clone(),
            },
            Class::Percent => value
                .as_number()
                .map(|n| Value::Number(n / 100.0))
                .unwrap_or(Value::Null),
            Class::Decimal(places) => value
                .as_number()
                .map(|n| Value::Number(round_half_even(n, places)))
                .unwrap_or(Value::Null),
        },
    }
}

fn round_half_even(n: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (n * scale).round_ties_even() / scale
}
