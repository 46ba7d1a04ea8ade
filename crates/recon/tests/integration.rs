use std::path::PathBuf;

use benchgrid_recon::mapping::MappingRow;
use benchgrid_recon::{
    run, BenchmarkSource, FetchedBenchmarks, FilterSpec, Lookups, MappingTable, PurchaseMode, ReconConfig,
    ReconError, RunInput, RunOutput, Table, TableSource, Value, Warning,
};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load(name: &str) -> Table {
    let path = fixtures_dir().join(name);
    let data = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    Table::from_csv_str(&data).unwrap()
}

fn load_and_run(config: &ReconConfig, declarations: &str, lookups: Lookups) -> RunOutput {
    let input = RunInput {
        mapping: MappingTable::from_table(&load("mapping.csv")).unwrap(),
        declarations: load(declarations),
        lookups,
    };
    let source = TableSource::new(load("benchmarks.csv"), config);
    run(config, &input, &source).unwrap()
}

fn names(out: &RunOutput) -> Vec<String> {
    out.table
        .rows()
        .iter()
        .map(|r| match &r.cells[0] {
            Value::Separator => "|".to_string(),
            v => v.to_string(),
        })
        .collect()
}

// -------------------------------------------------------------------------
// Local mode
// -------------------------------------------------------------------------

#[test]
fn local_fixture_groups_and_filters() {
    let toml = std::fs::read_to_string(fixtures_dir().join("local.recon.toml")).unwrap();
    let config = ReconConfig::from_toml(&toml).unwrap();
    let lookups = Lookups {
        national: Some(load(config.lookups.national_file.as_deref().unwrap())),
        territory: Some(load(config.lookups.territory_file.as_deref().unwrap())),
    };
    let out = load_and_run(&config, "declarations_local.csv", lookups);

    assert_eq!(out.meta.config_name, "Local fixture");
    assert_eq!(out.mode, PurchaseMode::Local);
    assert!(out.warnings.is_empty(), "unexpected warnings: {:?}", out.warnings);
    assert_eq!(out.filter_spec.territories, vec!["华南战区", "西南战区"]);
    // 1003 (华北战区) is outside every declaration's territory
    assert_eq!(out.benchmark_count, 5);

    assert_eq!(
        names(&out),
        vec!["|", "新品甲", "芬必得", "美林", "|", "新品乙", "头孢克肟", "阿莫仙", "|", "新品丙"]
    );
    assert_eq!(out.separator_indices, vec![0, 4, 8]);
    assert_eq!(out.declaration_indices, vec![1, 5, 9]);
    assert_eq!(out.declaration_count, 3);

    let t = &out.table;
    // Territory and national joins reached the mapped declaration
    assert_eq!(t.value(1, "提报战区"), Some(&Value::text("华南战区")));
    assert_eq!(t.value(1, "医保类型"), Some(&Value::text("甲类")));
    assert_eq!(t.value(5, "医保类型"), Some(&Value::text("-")));
    // Codes stay text
    assert_eq!(t.value(1, "商品编码"), Some(&Value::text("0012345")));
    // Percent and integer classes
    assert_eq!(t.value(1, "返利率(%)"), Some(&Value::Number(0.125)));
    assert_eq!(t.value(2, "返利率(%)"), Some(&Value::Number(0.1)));
    assert_eq!(t.value(3, "近90天月均销售数量"), Some(&Value::Number(300.0)));
    assert_eq!(t.value(7, "近90天月均销售数量"), Some(&Value::Number(0.0)));
    assert_eq!(t.value(1, "近90天月均销售数量"), Some(&Value::text("-")));
    // Separator rows stay separators
    assert!(t.rows()[4].cells.iter().all(Value::is_separator));

    assert!(out.report.separators);
    assert_eq!(out.report.mode_name, "地采");
}

#[test]
fn local_without_lookups_warns_and_continues() {
    let out = load_and_run(&ReconConfig::default(), "declarations_local.csv", Lookups::default());
    assert_eq!(out.warnings.len(), 2);
    assert!(out.warnings.iter().all(|w| matches!(w, Warning::Enrichment(_))));
    // No territories: group-scope benchmarks only in each block
    assert_eq!(
        names(&out),
        vec!["|", "新品甲", "芬必得", "|", "新品乙", "头孢克肟", "|", "新品丙"]
    );
}

// -------------------------------------------------------------------------
// Centralized mode
// -------------------------------------------------------------------------

#[test]
fn centralized_fixture_has_no_separators() {
    let config = ReconConfig::default();
    let lookups = Lookups {
        national: Some(load("national.csv")),
        territory: Some(load("territories.csv")),
    };
    let out = load_and_run(&config, "declarations_centralized.csv", lookups);

    assert_eq!(out.mode, PurchaseMode::Centralized);
    assert!(out.filter_spec.territories.is_empty());
    assert_eq!(out.benchmark_count, 2);
    assert_eq!(names(&out), vec!["新品甲", "芬必得", "新品乙", "头孢克肟"]);
    assert!(out.separator_indices.is_empty());
    assert_eq!(out.declaration_indices, vec![0, 2]);
    // Territory join is local-only
    assert_eq!(out.table.value(0, "提报战区"), Some(&Value::text("-")));
    assert!(!out.report.separators);
}

// -------------------------------------------------------------------------
// Worked examples
// -------------------------------------------------------------------------

fn example_mapping() -> MappingTable {
    let row = |c: &str, d: &str, b: &str| MappingRow {
        canonical: c.into(),
        declaration: Some(d.into()),
        benchmark: Some(b.into()),
    };
    MappingTable::new(vec![row("名称", "名A", "名B"), row("类别", "类A", "类B"), row("采购模式", "模式", "模式")]).unwrap()
}

fn example_config() -> ReconConfig {
    ReconConfig::from_toml(
        r#"
[modes]
field = "模式"

[fields]
category = "类别"
display_name = "名称"

[source]
common_name_column = "名B"
strategy_category_column = "类B"
scope_column = "类B"
"#,
    )
    .unwrap()
}

/// Hands back every row regardless of the filter.
struct AllRows(Table);

impl BenchmarkSource for AllRows {
    fn fetch(&self, _filter: &FilterSpec) -> Result<FetchedBenchmarks, ReconError> {
        Ok(FetchedBenchmarks {
            table: self.0.clone(),
            query: None,
        })
    }
}

fn example_input(category: &str, mode: &str) -> RunInput {
    RunInput {
        mapping: example_mapping(),
        declarations: Table::from_rows(
            ["名A", "类A", "模式"],
            vec![vec!["X".into(), category.into(), mode.into()]],
        ),
        lookups: Lookups::default(),
    }
}

#[test]
fn round_trip_example() {
    let source = AllRows(Table::from_rows(["名B", "类B"], vec![vec!["Y".into(), "C1".into()]]));
    let out = run(&example_config(), &example_input("C1", "统采"), &source).unwrap();

    assert_eq!(out.mode, PurchaseMode::Centralized);
    assert_eq!(out.table.columns(), &["名称", "类别", "采购模式"]);
    assert_eq!(out.table.len(), 2);
    assert_eq!(out.table.value(0, "名称"), Some(&Value::text("X")));
    assert_eq!(out.table.value(0, "类别"), Some(&Value::text("C1")));
    assert_eq!(out.table.value(1, "名称"), Some(&Value::text("Y")));
    assert_eq!(out.table.value(1, "类别"), Some(&Value::text("C1")));
    assert_eq!(out.declaration_indices, vec![0]);
}

#[test]
fn unmatched_category_leaves_declaration_alone() {
    let source = AllRows(Table::from_rows(["名B", "类B"], vec![vec!["Y".into(), "C1".into()]]));
    let out = run(&example_config(), &example_input("C9", "统采"), &source).unwrap();

    assert_eq!(out.table.len(), 1);
    assert_eq!(out.table.value(0, "名称"), Some(&Value::text("X")));
    assert!(out.separator_indices.is_empty());
    assert_eq!(out.declaration_indices, vec![0]);
}

#[test]
fn empty_benchmark_set_gets_no_separator_in_local_mode() {
    let source = AllRows(Table::new(["名B", "类B"]));
    let out = run(&example_config(), &example_input("C1", "地采"), &source).unwrap();

    assert_eq!(out.mode, PurchaseMode::Local);
    assert!(out.report.separators);
    assert_eq!(out.table.len(), 1);
    assert!(out.separator_indices.is_empty());
    assert_eq!(out.declaration_indices, vec![0]);
    assert!(out.warnings.contains(&Warning::QueryResultEmpty));
}

#[test]
fn missing_mode_field_fails_at_selection() {
    let config = example_config();
    let input = RunInput {
        mapping: example_mapping(),
        declarations: Table::from_rows(["名A", "类A"], vec![vec!["X".into(), "C1".into()]]),
        lookups: Lookups::default(),
    };
    let source = TableSource::new(Table::new(["名B", "类B"]), &config);
    let err = run(&config, &input, &source).unwrap_err();
    assert!(matches!(err, ReconError::ModeDetermination(_)));
    assert!(err.to_string().contains("模式"));
}

#[test]
fn empty_mapping_is_fatal() {
    let config = ReconConfig::default();
    let input = RunInput {
        mapping: MappingTable::new(Vec::new()).unwrap(),
        declarations: load("declarations_centralized.csv"),
        lookups: Lookups::default(),
    };
    let source = TableSource::new(load("benchmarks.csv"), &config);
    let err = run(&config, &input, &source).unwrap_err();
    assert!(matches!(err, ReconError::Mapping(_)));
}

#[test]
fn output_serializes_to_json() {
    let out = load_and_run(&ReconConfig::default(), "declarations_centralized.csv", Lookups::default());
    let json: serde_json::Value = serde_json::to_value(&out).unwrap();
    assert_eq!(json["mode"], "centralized");
    assert_eq!(json["warnings"][0]["kind"], "enrichment");
    assert_eq!(json["table"][0]["商品名称"], "新品甲");
    assert_eq!(json["report"]["merge_regions"][0]["first"], 26);
}
