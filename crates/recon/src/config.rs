use serde::Deserialize;

use crate::error::ReconError;
use crate::model::ColumnSpan;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Run configuration. Every table has defaults, so an empty file is valid.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Reject declaration sets that mix purchase modes.
    #[serde(default = "default_true")]
    pub strict_mode: bool,
    #[serde(default)]
    pub modes: ModesConfig,
    #[serde(default)]
    pub declaration: DeclarationFields,
    #[serde(default)]
    pub fields: CanonicalFields,
    #[serde(default)]
    pub lookups: LookupConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub normalize: ColumnClasses,
    #[serde(default)]
    pub report: ReportSettings,
}

fn default_name() -> String {
    "benchgrid".into()
}

fn default_true() -> bool {
    true
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            strict_mode: true,
            modes: ModesConfig::default(),
            declaration: DeclarationFields::default(),
            fields: CanonicalFields::default(),
            lookups: LookupConfig::default(),
            source: SourceConfig::default(),
            normalize: ColumnClasses::default(),
            report: ReportSettings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Purchase modes
// ---------------------------------------------------------------------------

/// Where the purchase mode is read from and its wire values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModesConfig {
    pub field: String,
    pub centralized: String,
    pub local: String,
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            field: "采购模式".into(),
            centralized: "统采".into(),
            local: "地采".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Raw declaration fields read before mapping (query parameters, joins).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeclarationFields {
    pub common_name: String,
    pub strategy_category: String,
    pub product_code: String,
    pub organization: String,
    pub territory: String,
}

impl Default for DeclarationFields {
    fn default() -> Self {
        Self {
            common_name: "通用名".into(),
            strategy_category: "策略分类".into(),
            product_code: "商品编码".into(),
            organization: "采购公司".into(),
            territory: "提报战区".into(),
        }
    }
}

/// Canonical fields the merger works on, after mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CanonicalFields {
    pub category: String,
    pub scope: String,
    pub sales_volume: String,
    pub display_name: String,
    pub territory: String,
    /// Scope value meaning "group-wide".
    pub global_scope: String,
}

impl Default for CanonicalFields {
    fn default() -> Self {
        Self {
            category: "三级大类".into(),
            scope: "取数维度（战区/集团）".into(),
            sales_volume: "近90天月均销售数量".into(),
            display_name: "商品名称".into(),
            territory: "提报战区".into(),
            global_scope: "集团".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lookups + Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Key column of the national reference table.
    pub national_key: String,
    pub national_file: Option<String>,
    /// Query run against the benchmark database when no national file is set.
    pub national_query: Option<String>,
    /// Key column of the territory table (organization name).
    pub territory_key: String,
    /// Column of the territory table holding the reporting territory.
    pub territory_target: String,
    pub territory_file: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            national_key: "商品编码".into(),
            national_file: None,
            national_query: None,
            territory_key: "采购公司".into(),
            territory_target: "提报战区".into(),
            territory_file: None,
        }
    }
}

/// Relational benchmark store. Column names are those of the base query's
/// result set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub database: Option<String>,
    pub query_file: Option<String>,
    /// Inline base query, used when `query_file` is not set.
    pub query: Option<String>,
    pub common_name_column: String,
    pub strategy_category_column: String,
    pub scope_column: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database: None,
            query_file: None,
            query: None,
            common_name_column: "goods_common_name".into(),
            strategy_category_column: "strategy_classify_name".into(),
            scope_column: "lev3_org_name".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Column classes
// ---------------------------------------------------------------------------

/// Canonical columns grouped by how the normalizer coerces them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnClasses {
    pub force_text: Vec<String>,
    pub percent: Vec<String>,
    pub decimal_2: Vec<String>,
    pub decimal_1: Vec<String>,
    pub integer: Vec<String>,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnClasses {
    fn default() -> Self {
        Self {
            force_text: names(&["过会编码", "新品编码", "商品编码", "国际条码", "填报日期"]),
            percent: names(&["返利率(%)"]),
            decimal_2: names(&[
                "日服/使用成交价（顾客）",
                "日服/使用底价",
                "标准单位进价",
                "标准单位底价",
                "标准单位成交价",
                "标准单位综合毛利额",
                "标准单位零售定价",
                "进价",
                "新品底价/对标品最低底价",
                "底价 *(返利后)",
            ]),
            decimal_1: names(&["预估/实际成交价", "建议零售价"]),
            integer: names(&[
                "动销战区数",
                "效期（天）",
                "近90天月均销售数量",
                "近90天月均销售金额",
                "近90天月均前台含税毛利额",
                "近90天月均补偿后含税毛利额",
                "超级旗舰店铺货商品数量",
                "旗舰店铺货商品数量",
                "大店铺货商品数量",
                "中店铺货商品数量",
                "小店铺货商品数量",
                "成长店铺货商品数量",
                "通用名月均销量",
                "通用名月均销售额",
                "通用名月均前台毛利额",
                "通用名月均补偿后毛利额",
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub sheet_name: String,
    pub file_prefix: String,
    pub font_name: String,
    pub font_size: f64,
    pub separator_row_height: f64,
    pub red_font_columns: Vec<String>,
    /// Columns shown as percentages in addition to the percent class.
    pub extra_percent_columns: Vec<String>,
    pub local: ModeReportOverride,
    pub centralized: ModeReportOverride,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            sheet_name: "目标表".into(),
            file_prefix: "新品过会分析表".into(),
            font_name: "微软雅黑".into(),
            font_size: 9.0,
            separator_row_height: 150.0,
            red_font_columns: names(&["新品底价/对标品最低底价", "底价 *(返利后)"]),
            extra_percent_columns: names(&["通用名补偿后毛利率"]),
            local: ModeReportOverride::default(),
            centralized: ModeReportOverride::default(),
        }
    }
}

/// Per-mode layout overrides. Unset fields keep the mode's built-in layout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModeReportOverride {
    pub separators: Option<bool>,
    pub merge_regions: Option<[ColumnSpan; 2]>,
    pub formula_templates: Option<[String; 2]>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let named = [
            ("name", &self.name),
            ("modes.field", &self.modes.field),
            ("modes.centralized", &self.modes.centralized),
            ("modes.local", &self.modes.local),
            ("declaration.common_name", &self.declaration.common_name),
            ("declaration.strategy_category", &self.declaration.strategy_category),
            ("declaration.product_code", &self.declaration.product_code),
            ("declaration.organization", &self.declaration.organization),
            ("declaration.territory", &self.declaration.territory),
            ("fields.category", &self.fields.category),
            ("fields.scope", &self.fields.scope),
            ("fields.sales_volume", &self.fields.sales_volume),
            ("fields.display_name", &self.fields.display_name),
            ("fields.territory", &self.fields.territory),
            ("fields.global_scope", &self.fields.global_scope),
            ("lookups.national_key", &self.lookups.national_key),
            ("lookups.territory_key", &self.lookups.territory_key),
            ("lookups.territory_target", &self.lookups.territory_target),
            ("source.common_name_column", &self.source.common_name_column),
            ("source.strategy_category_column", &self.source.strategy_category_column),
            ("source.scope_column", &self.source.scope_column),
            ("report.sheet_name", &self.report.sheet_name),
            ("report.file_prefix", &self.report.file_prefix),
        ];
        for (key, value) in named {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!("{key} must not be empty")));
            }
        }

        if self.modes.centralized == self.modes.local {
            return Err(ReconError::ConfigValidation(format!(
                "modes.centralized and modes.local are both '{}'",
                self.modes.local
            )));
        }

        // Worksheet names are capped at 31 characters
        if self.report.sheet_name.chars().count() > 31 {
            return Err(ReconError::ConfigValidation(
                "report.sheet_name is longer than 31 characters".into(),
            ));
        }

        for (mode, over) in [
            ("local", &self.report.local),
            ("centralized", &self.report.centralized),
        ] {
            if let Some(regions) = &over.merge_regions {
                for span in regions {
                    if span.first == 0 || span.first > span.last {
                        return Err(ReconError::ConfigValidation(format!(
                            "report.{mode}: merge region {}..{} is invalid (1-based, first <= last)",
                            span.first, span.last
                        )));
                    }
                }
            }
            if let Some(templates) = &over.formula_templates {
                if let Some(t) = templates.iter().find(|t| !t.contains("{row}")) {
                    return Err(ReconError::ConfigValidation(format!(
                        "report.{mode}: formula template has no {{row}} placeholder: {t}"
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
