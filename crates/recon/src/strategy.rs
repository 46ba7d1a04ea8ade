//! Purchase-mode strategies.
//!
//! The purchase mode is read once per run from the declaration set and fixes
//! everything mode-specific: which lookups enrich the declarations, how the
//! benchmark query is scoped, which benchmarks stay in a declaration's block,
//! how a block is sorted, and the report layout.

use tracing::{info, warn};

use crate::config::{CanonicalFields, DeclarationFields, LookupConfig, ModeReportOverride, ReconConfig};
use crate::enrich::left_join;
use crate::error::ReconError;
use crate::model::{ColumnSpan, FilterSpec, Lookups, PurchaseMode, ReportConfig, ScopeFilter, SortKey, Warning};
use crate::table::{Record, Table, Value};

/// Review narrative written into the first merged region of a local-mode
/// separator row. `{row}` is the declaration's worksheet row.
pub const LOCAL_REVIEW_TEMPLATE: &str = concat!(
    r#"=C{row}&"-"&D{row}&CHAR(10)&I{row}&"-"&J{row}&"-"&K{row}&CHAR(10)"#,
    r#"&"新品组压测意见："&CHAR(10)&"1.顾客："&CHAR(10)&"2.员工："&CHAR(10)"#,
    r#"&"3.公司："&DN{row}&DO{row}&CHAR(10)"#,
    r#"&"4.市场情况：该通用名中康月销"&CR{row}&CHAR(10)"#,
    r#"&"5.通用名结构："&CHAR(10)"#,
    r#"&"6.供应商条件："&DC{row}&"、"&DF{row}&"；"&DJ{row}&CHAR(10)"#,
    r#"&"7.医保："&CK{row}&"；"&"挂网价："&CM{row}&CHAR(10)"#,
    r#"&"8.铺货："&"标准："&CU{row}&"通"&"（新品费："&CV{row}&"元）；买手洽谈："&CW{row}&"（新品费："&CZ{row}&"元）""#,
);

/// Product summary written into the second merged region.
pub const LOCAL_SUMMARY_TEMPLATE: &str = concat!(
    r#"="【引进理由】"&L{row}&CHAR(10)&"【成份】"&EO{row}&CHAR(10)"#,
    r#"&"【适应症】"&EQ{row}&CHAR(10)&"【采购总结卖点】"&CHAR(10)&ET{row}&CHAR(10)"#,
    r#"&"【搜索关键词】"&EU{row}"#,
);

const LOCAL_MERGE_REGIONS: [ColumnSpan; 2] = [ColumnSpan::new(27, 38), ColumnSpan::new(44, 59)];

// The centralized sheet has no territory column, so everything after the
// first column sits one to the left.
const CENTRALIZED_MERGE_REGIONS: [ColumnSpan; 2] = [ColumnSpan::new(26, 37), ColumnSpan::new(43, 58)];

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Strategy {
    Centralized(Centralized),
    Local(Local),
}

#[derive(Debug, Clone)]
pub struct Centralized(Settings);

#[derive(Debug, Clone)]
pub struct Local(Settings);

#[derive(Debug, Clone)]
struct Settings {
    declaration: DeclarationFields,
    fields: CanonicalFields,
    lookups: LookupConfig,
    sort: Vec<SortKey>,
    report: ReportConfig,
}

/// Declarations after lookup joins.
#[derive(Debug, Clone)]
pub struct Enriched {
    pub table: Table,
    pub warnings: Vec<Warning>,
}

impl Strategy {
    /// Read the purchase mode from the declaration set and build its strategy.
    pub fn select(config: &ReconConfig, declarations: &Table) -> Result<Self, ReconError> {
        let mode = determine_mode(config, declarations)?;
        info!(%mode, "purchase mode determined");
        Ok(Self::for_mode(config, mode))
    }

    pub fn for_mode(config: &ReconConfig, mode: PurchaseMode) -> Self {
        let f = &config.fields;
        match mode {
            PurchaseMode::Centralized => {
                let defaults = ReportConfig {
                    mode_name: config.modes.centralized.clone(),
                    separators: false,
                    merge_regions: CENTRALIZED_MERGE_REGIONS,
                    formula_templates: [
                        shift_columns(LOCAL_REVIEW_TEMPLATE, 1),
                        shift_columns(LOCAL_SUMMARY_TEMPLATE, 1),
                    ],
                };
                Self::Centralized(Centralized(Settings {
                    declaration: config.declaration.clone(),
                    fields: f.clone(),
                    lookups: config.lookups.clone(),
                    sort: vec![SortKey::desc(&f.scope), SortKey::desc(&f.sales_volume)],
                    report: apply_override(defaults, &config.report.centralized),
                }))
            }
            PurchaseMode::Local => {
                let defaults = ReportConfig {
                    mode_name: config.modes.local.clone(),
                    separators: true,
                    merge_regions: LOCAL_MERGE_REGIONS,
                    formula_templates: [LOCAL_REVIEW_TEMPLATE.to_string(), LOCAL_SUMMARY_TEMPLATE.to_string()],
                };
                Self::Local(Local(Settings {
                    declaration: config.declaration.clone(),
                    fields: f.clone(),
                    lookups: config.lookups.clone(),
                    sort: vec![
                        SortKey::desc(&f.scope),
                        SortKey::desc(&f.display_name),
                        SortKey::desc(&f.sales_volume),
                    ],
                    report: apply_override(defaults, &config.report.local),
                }))
            }
        }
    }

    pub fn mode(&self) -> PurchaseMode {
        match self {
            Self::Centralized(_) => PurchaseMode::Centralized,
            Self::Local(_) => PurchaseMode::Local,
        }
    }

    fn settings(&self) -> &Settings {
        match self {
            Self::Centralized(Centralized(s)) | Self::Local(Local(s)) => s,
        }
    }

    /// Canonical field names the merger works with.
    pub fn fields(&self) -> &CanonicalFields {
        &self.settings().fields
    }

    /// Join lookup data onto the raw declarations. A missing lookup or key
    /// column skips that join with a warning.
    pub fn enrich(&self, declarations: &Table, lookups: &Lookups) -> Enriched {
        let s = self.settings();
        let mut table = declarations.clone();
        let mut warnings = Vec::new();

        match &lookups.national {
            None => warnings.push(Warning::Enrichment(
                "national reference table not provided, join skipped".into(),
            )),
            Some(national) => match left_join(
                &table,
                national,
                &s.declaration.product_code,
                &s.lookups.national_key,
                None,
            ) {
                Ok(joined) => {
                    info!(matched = joined.matched, rows = table.len(), "national reference joined");
                    table = joined.table;
                }
                Err(reason) => warnings.push(Warning::Enrichment(format!("national reference: {reason}"))),
            },
        }

        if let Self::Local(_) = self {
            match &lookups.territory {
                None => warnings.push(Warning::Enrichment(
                    "territory lookup table not provided, existing territories kept".into(),
                )),
                Some(territory) => match left_join(
                    &table,
                    territory,
                    &s.declaration.organization,
                    &s.lookups.territory_key,
                    Some((s.lookups.territory_target.as_str(), s.declaration.territory.as_str())),
                ) {
                    Ok(joined) => {
                        info!(matched = joined.matched, rows = table.len(), "territories joined");
                        table = joined.table;
                    }
                    Err(reason) => warnings.push(Warning::Enrichment(format!("territory: {reason}"))),
                },
            }
        }

        for w in &warnings {
            warn!("{w}");
        }
        Enriched { table, warnings }
    }

    /// Parameters for the benchmark query, read from enriched raw declarations.
    pub fn query_params(&self, declarations: &Table) -> FilterSpec {
        let d = &self.settings().declaration;
        let common_names = distinct_values(declarations, &d.common_name);
        let strategy_categories = distinct_values(declarations, &d.strategy_category);
        match self {
            Self::Centralized(_) => FilterSpec {
                scope: ScopeFilter::CentralizedOnly,
                common_names,
                strategy_categories,
                territories: Vec::new(),
            },
            Self::Local(_) => FilterSpec {
                scope: ScopeFilter::Local,
                common_names,
                strategy_categories,
                territories: distinct_values(declarations, &d.territory),
            },
        }
    }

    /// Keep the candidates that belong in `declaration`'s block.
    pub fn filter_benchmarks(&self, declaration: &Record<'_>, candidates: &Table) -> Table {
        match self {
            Self::Centralized(_) => candidates.clone(),
            Self::Local(Local(s)) => {
                let global = Value::text(s.fields.global_scope.as_str());
                let territory = declaration.value_or_null(&s.fields.territory);
                candidates.filter(|r| {
                    let scope = r.value_or_null(&s.fields.scope);
                    scope.matches(&global) || scope.matches(territory)
                })
            }
        }
    }

    /// Block sort keys, most significant first.
    pub fn sort_order(&self) -> &[SortKey] {
        &self.settings().sort
    }

    pub fn report_config(&self) -> &ReportConfig {
        &self.settings().report
    }
}

fn determine_mode(config: &ReconConfig, declarations: &Table) -> Result<PurchaseMode, ReconError> {
    let modes = &config.modes;
    let values = declarations.column(&modes.field).ok_or_else(|| {
        ReconError::ModeDetermination(format!("declarations have no '{}' column", modes.field))
    })?;

    let mut first: Option<String> = None;
    for value in values {
        if value.is_blank() || value.is_separator() {
            continue;
        }
        let text = value.key_text().unwrap_or_default().trim().to_string();
        match &first {
            None => first = Some(text),
            Some(seen) if *seen != text => {
                if config.strict_mode {
                    return Err(ReconError::ModeDetermination(format!(
                        "declarations mix purchase modes '{seen}' and '{text}'"
                    )));
                }
                warn!(first = %seen, other = %text, "mixed purchase modes, using the first");
                break;
            }
            Some(_) => {}
        }
    }

    let Some(value) = first else {
        return Err(ReconError::ModeDetermination(format!(
            "'{}' is empty in every declaration",
            modes.field
        )));
    };

    if value == modes.centralized {
        Ok(PurchaseMode::Centralized)
    } else if value == modes.local {
        Ok(PurchaseMode::Local)
    } else if config.strict_mode {
        Err(ReconError::ModeDetermination(format!(
            "unknown purchase mode '{value}' (expected '{}' or '{}')",
            modes.centralized, modes.local
        )))
    } else {
        Ok(PurchaseMode::Local)
    }
}

/// Distinct non-blank values of a column in first-seen order. A missing
/// column yields nothing.
fn distinct_values(table: &Table, field: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    if let Some(values) = table.column(field) {
        for value in values {
            if value.is_blank() {
                continue;
            }
            if let Some(text) = value.key_text() {
                if !out.contains(&text) {
                    out.push(text);
                }
            }
        }
    }
    out
}

fn apply_override(mut report: ReportConfig, over: &ModeReportOverride) -> ReportConfig {
    if let Some(separators) = over.separators {
        report.separators = separators;
    }
    if let Some(regions) = over.merge_regions {
        report.merge_regions = regions;
    }
    if let Some(templates) = &over.formula_templates {
        report.formula_templates = templates.clone();
    }
    report
}

// ---------------------------------------------------------------------------
// Formula column shifting
// ---------------------------------------------------------------------------

/// Move every `<COL>{row}` reference in a template `by` columns to the left.
pub fn shift_columns(template: &str, by: u32) -> String {
    const PLACEHOLDER: &str = "{row}";
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(PLACEHOLDER) {
        let head = &rest[..pos];
        let letters_start = head
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_uppercase())
            .last()
            .map(|(i, _)| i)
            .unwrap_or(pos);
        out.push_str(&head[..letters_start]);
        let letters = &head[letters_start..];
        match column_number(letters) {
            Some(n) if n > by => out.push_str(&column_letters(n - by)),
            _ => out.push_str(letters),
        }
        out.push_str(PLACEHOLDER);
        rest = &rest[pos + PLACEHOLDER.len()..];
    }
    out.push_str(rest);
    out
}

/// `A` -> 1, `AA` -> 27.
fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters
        .bytes()
        .try_fold(0u32, |acc, b| acc.checked_mul(26)?.checked_add(u32::from(b - b'A') + 1))
}

/// 1 -> `A`, 27 -> `AA`.
fn column_letters(mut n: u32) -> String {
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decls(modes: &[&str]) -> Table {
        Table::from_rows(
            ["采购模式", "通用名"],
            modes.iter().map(|m| vec![Value::text(*m), "布洛芬".into()]).collect(),
        )
    }

    fn strict() -> ReconConfig {
        ReconConfig::default()
    }

    fn lenient() -> ReconConfig {
        ReconConfig {
            strict_mode: false,
            ..ReconConfig::default()
        }
    }

    #[test]
    fn selects_by_first_non_blank_value() {
        let s = Strategy::select(&strict(), &decls(&["", "统采", "统采"])).unwrap();
        assert_eq!(s.mode(), PurchaseMode::Centralized);
        let s = Strategy::select(&strict(), &decls(&["地采"])).unwrap();
        assert_eq!(s.mode(), PurchaseMode::Local);
    }

    #[test]
    fn missing_or_empty_mode_fails() {
        let no_column = Table::from_rows(["通用名"], vec![vec!["X".into()]]);
        let err = Strategy::select(&strict(), &no_column).unwrap_err();
        assert!(matches!(err, ReconError::ModeDetermination(_)));

        let mut all_null = decls(&["统采"]);
        all_null.set_column("采购模式", vec![Value::Null]);
        let err = Strategy::select(&strict(), &all_null).unwrap_err();
        assert!(matches!(err, ReconError::ModeDetermination(_)));
    }

    #[test]
    fn mixed_modes_fail_when_strict() {
        let err = Strategy::select(&strict(), &decls(&["统采", "地采"])).unwrap_err();
        assert!(err.to_string().contains("mix"));

        let s = Strategy::select(&lenient(), &decls(&["统采", "地采"])).unwrap();
        assert_eq!(s.mode(), PurchaseMode::Centralized);
    }

    #[test]
    fn unknown_mode_value() {
        let err = Strategy::select(&strict(), &decls(&["直采"])).unwrap_err();
        assert!(err.to_string().contains("直采"));

        let s = Strategy::select(&lenient(), &decls(&["直采"])).unwrap();
        assert_eq!(s.mode(), PurchaseMode::Local);
    }

    #[test]
    fn query_params_are_distinct_and_mode_scoped() {
        let t = Table::from_rows(
            ["通用名", "策略分类", "提报战区"],
            vec![
                vec!["布洛芬".into(), "A".into(), "华南".into()],
                vec!["布洛芬".into(), Value::Null, "华北".into()],
                vec!["".into(), "B".into(), "华南".into()],
                vec!["阿莫西林".into(), "A".into(), Value::Null],
            ],
        );
        let c = Strategy::for_mode(&strict(), PurchaseMode::Centralized).query_params(&t);
        assert_eq!(c.scope, ScopeFilter::CentralizedOnly);
        assert_eq!(c.common_names, vec!["布洛芬", "阿莫西林"]);
        assert_eq!(c.strategy_categories, vec!["A", "B"]);
        assert!(c.territories.is_empty());

        let l = Strategy::for_mode(&strict(), PurchaseMode::Local).query_params(&t);
        assert_eq!(l.scope, ScopeFilter::Local);
        assert_eq!(l.territories, vec!["华南", "华北"]);
    }

    #[test]
    fn local_filter_keeps_group_and_own_territory() {
        let decl = Table::from_rows(["提报战区"], vec![vec!["华南".into()], vec![Value::Null]]);
        let candidates = Table::from_rows(
            ["取数维度（战区/集团）", "商品名称"],
            vec![
                vec!["集团".into(), "a".into()],
                vec!["华南".into(), "b".into()],
                vec!["华北".into(), "c".into()],
                vec![Value::Null, "d".into()],
            ],
        );
        let local = Strategy::for_mode(&strict(), PurchaseMode::Local);
        let kept = local.filter_benchmarks(&decl.record(0).unwrap(), &candidates);
        let names: Vec<_> = kept.column("商品名称").unwrap().map(|v| v.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let kept = local.filter_benchmarks(&decl.record(1).unwrap(), &candidates);
        assert_eq!(kept.len(), 1);

        let central = Strategy::for_mode(&strict(), PurchaseMode::Centralized);
        assert_eq!(central.filter_benchmarks(&decl.record(0).unwrap(), &candidates).len(), 4);
    }

    #[test]
    fn sort_orders_per_mode() {
        let fields: Vec<_> = Strategy::for_mode(&strict(), PurchaseMode::Local)
            .sort_order()
            .iter()
            .map(|k| k.field.clone())
            .collect();
        assert_eq!(fields, vec!["取数维度（战区/集团）", "商品名称", "近90天月均销售数量"]);

        let keys = Strategy::for_mode(&strict(), PurchaseMode::Centralized).sort_order().to_vec();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1], SortKey::desc("近90天月均销售数量"));
    }

    #[test]
    fn report_configs() {
        let local = Strategy::for_mode(&strict(), PurchaseMode::Local);
        let r = local.report_config();
        assert!(r.separators);
        assert_eq!(r.mode_name, "地采");
        assert_eq!(r.merge_regions, [ColumnSpan::new(27, 38), ColumnSpan::new(44, 59)]);
        assert!(r.formula(0, 5).starts_with(r#"=C5&"-"&D5&CHAR(10)&I5"#));

        let central = Strategy::for_mode(&strict(), PurchaseMode::Centralized);
        let r = central.report_config();
        assert!(!r.separators);
        assert_eq!(r.merge_regions[0], ColumnSpan::new(26, 37));
        assert!(r.formula_templates[0].starts_with(r#"=B{row}&"-"&C{row}&CHAR(10)&H{row}"#));
        assert!(r.formula_templates[0].contains("DM{row}&DN{row}"));
        assert!(r.formula_templates[0].ends_with(r#"CY{row}&"元）""#));
        assert!(r.formula_templates[1].contains("&K{row}&"));
        assert!(r.formula_templates[1].ends_with("ET{row}"));
    }

    #[test]
    fn report_override_applies() {
        let config = ReconConfig::from_toml(
            "[report.centralized]\nseparators = true\nformula_templates = [\"=A{row}\", \"=B{row}\"]\n",
        )
        .unwrap();
        let s = Strategy::for_mode(&config, PurchaseMode::Centralized);
        assert!(s.report_config().separators);
        assert_eq!(s.report_config().formula(1, 9), "=B9");
        assert_eq!(s.report_config().merge_regions[1], ColumnSpan::new(43, 58));
    }

    #[test]
    fn column_letter_conversions() {
        assert_eq!(column_number("A"), Some(1));
        assert_eq!(column_number("AA"), Some(27));
        assert_eq!(column_number("EU"), Some(151));
        assert_eq!(column_letters(151), "EU");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(shift_columns("=AA{row}&\"x\"&B{row}", 1), "=Z{row}&\"x\"&A{row}");
    }

    #[test]
    fn enrich_warns_on_missing_lookups() {
        let local = Strategy::for_mode(&strict(), PurchaseMode::Local);
        let enriched = local.enrich(&decls(&["地采"]), &Lookups::default());
        assert_eq!(enriched.warnings.len(), 2);
        assert_eq!(enriched.table, decls(&["地采"]));

        let central = Strategy::for_mode(&strict(), PurchaseMode::Centralized);
        let enriched = central.enrich(&decls(&["统采"]), &Lookups::default());
        assert_eq!(enriched.warnings.len(), 1);
    }

    #[test]
    fn local_enrich_joins_territory() {
        let decls = Table::from_rows(
            ["采购模式", "采购公司", "提报战区"],
            vec![vec!["地采".into(), "广州公司".into(), "旧".into()]],
        );
        let lookups = Lookups {
            national: None,
            territory: Some(Table::from_rows(
                ["采购公司", "提报战区"],
                vec![vec!["广州公司".into(), "华南战区".into()]],
            )),
        };
        let local = Strategy::for_mode(&strict(), PurchaseMode::Local);
        let enriched = local.enrich(&decls, &lookups);
        assert_eq!(enriched.table.value(0, "提报战区"), Some(&Value::text("华南战区")));
        assert_eq!(enriched.warnings.len(), 1);
    }

    #[test]
    fn national_join_keeps_unmatched_common_names() {
        let decls = Table::from_rows(
            ["采购模式", "商品编码", "通用名"],
            vec![
                vec!["统采".into(), "1001".into(), "布洛芬".into()],
                vec!["统采".into(), "9999".into(), "阿莫西林".into()],
            ],
        );
        let lookups = Lookups {
            national: Some(Table::from_rows(
                ["商品编码", "通用名", "医保类型"],
                vec![vec!["1001".into(), "布洛芬".into(), "甲类".into()]],
            )),
            territory: None,
        };
        let central = Strategy::for_mode(&strict(), PurchaseMode::Centralized);
        let enriched = central.enrich(&decls, &lookups);
        assert_eq!(enriched.table.value(1, "通用名"), Some(&Value::text("阿莫西林")));
        assert_eq!(enriched.table.value(1, "医保类型"), Some(&Value::Null));
        assert_eq!(
            central.query_params(&enriched.table).common_names,
            vec!["布洛芬", "阿莫西林"]
        );
    }

    #[test]
    fn strategies_are_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<Strategy>();
    }
}
