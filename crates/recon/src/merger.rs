use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::model::{Direction, SortKey};
use crate::strategy::Strategy;
use crate::table::{union_columns, Row, RowSource, Table, Value};

/// Interleave benchmarks after the declaration they belong to.
///
/// Declarations keep their input order. Each one is followed by the
/// benchmarks sharing its category key that pass the strategy's filter,
/// sorted by the strategy's sort order. If either input is empty the other
/// is returned unchanged and untagged.
pub fn merge(declarations: &Table, benchmarks: &Table, strategy: &Strategy) -> Table {
    if declarations.is_empty() {
        return benchmarks.clone();
    }
    if benchmarks.is_empty() {
        return declarations.clone();
    }

    let fields = strategy.fields();
    let columns = union_columns([declarations.columns(), benchmarks.columns()]);

    let mut decls = declarations.aligned_to(&columns);
    decls.tag(RowSource::Declaration);
    let mut bench = benchmarks.aligned_to(&columns);
    bench.tag(RowSource::Benchmark);
    bench.map_column(&fields.sales_volume, |v| Value::Number(v.as_number().unwrap_or(0.0)));

    // Category key -> benchmark row indices, input order
    let mut by_category: HashMap<String, Vec<usize>> = HashMap::new();
    if let Some(values) = bench.column(&fields.category) {
        for (i, value) in values.enumerate() {
            if let Some(key) = value.key_text() {
                by_category.entry(key).or_default().push(i);
            }
        }
    }

    let mut out = Table::new(columns);
    for record in decls.records() {
        out.push_row(decls.rows()[record.index()].clone());

        let category = record.value_or_null(&fields.category);
        if category.is_blank() {
            continue;
        }
        let Some(indices) = category.key_text().and_then(|k| by_category.get(&k)) else {
            continue;
        };

        let candidates = bench.take(indices);
        let mut block = strategy.filter_benchmarks(&record, &candidates);
        if block.is_empty() {
            continue;
        }
        sort_block(&mut block, strategy.sort_order());
        debug!(
            declaration = record.index(),
            candidates = candidates.len(),
            kept = block.len(),
            "benchmark block"
        );
        for row in block.rows() {
            out.push_row(row.clone());
        }
    }
    out
}

/// Sort rows by `keys`, then by every cell in column order so the result
/// never depends on input order. Keys naming absent columns are skipped.
pub fn sort_block(table: &mut Table, keys: &[SortKey]) {
    let resolved: Vec<(usize, Direction)> = keys
        .iter()
        .filter_map(|k| table.column_index(&k.field).map(|i| (i, k.direction)))
        .collect();
    table.rows_mut().sort_by(|a, b| compare_rows(a, b, &resolved));
}

fn compare_rows(a: &Row, b: &Row, keys: &[(usize, Direction)]) -> Ordering {
    keys.iter()
        .map(|&(i, dir)| compare_values(&a.cells[i], &b.cells[i], dir))
        .chain(
            a.cells
                .iter()
                .zip(&b.cells)
                .map(|(x, y)| compare_values(x, y, Direction::Ascending)),
        )
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Nulls sort last in either direction. Ascending puts numbers before text;
/// descending reverses every non-null comparison, so text comes first.
pub fn compare_values(a: &Value, b: &Value, direction: Direction) -> Ordering {
    let a_missing = a.is_null() || a.is_separator();
    let b_missing = b.is_null() || b.is_separator();
    match (a_missing, b_missing) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    let ord = match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    };
    match direction {
        Direction::Ascending => ord,
        Direction::Descending => ord.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;
    use crate::model::PurchaseMode;

    const COLUMNS: [&str; 5] = ["商品名称", "三级大类", "取数维度（战区/集团）", "提报战区", "近90天月均销售数量"];

    fn row(name: &str, category: &str, scope: &str, territory: &str, volume: &str) -> Vec<Value> {
        [name, category, scope, territory, volume]
            .iter()
            .map(|s| if s.is_empty() { Value::Null } else { Value::text(*s) })
            .collect()
    }

    fn names(t: &Table) -> Vec<String> {
        t.column("商品名称").unwrap().map(|v| v.to_string()).collect()
    }

    fn strategy(mode: PurchaseMode) -> Strategy {
        Strategy::for_mode(&ReconConfig::default(), mode)
    }

    #[test]
    fn empty_inputs_short_circuit() {
        let decls = Table::from_rows(COLUMNS, vec![row("D1", "C1", "", "华南", "")]);
        let empty = Table::new(COLUMNS);
        let s = strategy(PurchaseMode::Local);

        let out = merge(&decls, &empty, &s);
        assert_eq!(out, decls);
        assert!(!out.is_tagged());

        let out = merge(&empty, &decls, &s);
        assert_eq!(out, decls);
    }

    #[test]
    fn blocks_follow_their_declaration() {
        let decls = Table::from_rows(
            COLUMNS,
            vec![
                row("D1", "C1", "", "华南", ""),
                row("D2", "", "", "华南", ""),
                row("D3", "C2", "", "华南", ""),
                row("D4", "C9", "", "华南", ""),
            ],
        );
        let bench = Table::from_rows(
            COLUMNS,
            vec![
                row("B1", "C1", "华南", "", "5"),
                row("B2", "C2", "集团", "", "7"),
                row("B3", "C1", "集团", "", "oops"),
                row("B4", "C1", "集团", "", "9"),
            ],
        );
        let out = merge(&decls, &bench, &strategy(PurchaseMode::Centralized));
        assert_eq!(names(&out), vec!["D1", "B4", "B3", "B1", "D2", "D3", "B2", "D4"]);

        let sources: Vec<_> = out.rows().iter().map(|r| r.source).collect();
        assert_eq!(sources[0], Some(RowSource::Declaration));
        assert_eq!(sources[1], Some(RowSource::Benchmark));
        // Non-numeric volume coerced to zero
        assert_eq!(out.value(2, "近90天月均销售数量"), Some(&Value::Number(0.0)));
    }

    #[test]
    fn local_filter_drops_other_territories() {
        let decls = Table::from_rows(COLUMNS, vec![row("D1", "C1", "", "华南", "")]);
        let bench = Table::from_rows(
            COLUMNS,
            vec![
                row("B1", "C1", "华北", "", "50"),
                row("B2", "C1", "华南", "", "5"),
                row("B3", "C1", "集团", "", "1"),
            ],
        );
        let out = merge(&decls, &bench, &strategy(PurchaseMode::Local));
        assert_eq!(names(&out), vec!["D1", "B3", "B2"]);

        let out = merge(&decls, &bench, &strategy(PurchaseMode::Centralized));
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn local_sort_uses_display_name_before_volume() {
        let decls = Table::from_rows(COLUMNS, vec![row("D1", "C1", "", "华南", "")]);
        let bench = Table::from_rows(
            COLUMNS,
            vec![
                row("甲", "C1", "集团", "", "1"),
                row("乙", "C1", "集团", "", "100"),
                row("乙", "C1", "集团", "", "300"),
            ],
        );
        let out = merge(&decls, &bench, &strategy(PurchaseMode::Local));
        // 甲 (U+7532) sorts after 乙 (U+4E59), descending puts 甲 first
        assert_eq!(names(&out), vec!["D1", "甲", "乙", "乙"]);
        assert_eq!(out.value(2, "近90天月均销售数量"), Some(&Value::Number(300.0)));
    }

    #[test]
    fn union_of_columns() {
        let decls = Table::from_rows(["商品名称", "三级大类", "申报专有"], vec![vec!["D1".into(), "C1".into(), "x".into()]]);
        let bench = Table::from_rows(["三级大类", "商品名称"], vec![vec!["C1".into(), "B1".into()]]);
        let out = merge(&decls, &bench, &strategy(PurchaseMode::Centralized));
        assert_eq!(out.columns(), &["商品名称", "三级大类", "申报专有"]);
        assert_eq!(out.value(1, "申报专有"), Some(&Value::Null));
        assert_eq!(out.value(1, "商品名称"), Some(&Value::text("B1")));
    }

    #[test]
    fn nulls_sort_last_both_ways() {
        let n = Value::Number(1.0);
        assert_eq!(compare_values(&Value::Null, &n, Direction::Ascending), Ordering::Greater);
        assert_eq!(compare_values(&Value::Null, &n, Direction::Descending), Ordering::Greater);
        assert_eq!(compare_values(&n, &Value::text("a"), Direction::Ascending), Ordering::Less);
        assert_eq!(
            compare_values(&Value::Number(2.0), &n, Direction::Descending),
            Ordering::Less
        );
    }

    #[test]
    fn descending_puts_text_before_numbers() {
        let n = Value::Number(1.0);
        let t = Value::text("a");
        assert_eq!(compare_values(&n, &t, Direction::Descending), Ordering::Greater);
        assert_eq!(compare_values(&t, &Value::Null, Direction::Descending), Ordering::Less);

        let mut block = Table::from_rows(
            ["销量"],
            vec![vec![Value::Null], vec![Value::Number(5.0)], vec!["暂无".into()], vec![Value::Number(9.0)]],
        );
        sort_block(&mut block, &[SortKey::desc("销量")]);
        let got: Vec<&Value> = block.column("销量").unwrap().collect();
        assert_eq!(
            got,
            vec![&Value::text("暂无"), &Value::Number(9.0), &Value::Number(5.0), &Value::Null]
        );
    }

    #[test]
    fn sort_ignores_absent_key_columns() {
        let mut t = Table::from_rows(["a"], vec![vec!["2".into()], vec!["1".into()]]);
        sort_block(&mut t, &[SortKey::desc("missing")]);
        let values: Vec<_> = t.column("a").unwrap().map(|v| v.to_string()).collect();
        assert_eq!(values, vec!["1", "2"]);
    }
}
