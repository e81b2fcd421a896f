// ==========================================
// 包装 ERP - 导入变体字段规则表
// ==========================================
// 每个变体一张固定的 {列名, 规则} 表；列顺序即模板列顺序
// 未列出的列一律忽略
// ==========================================

use crate::domain::reference::columns as col;
use crate::domain::{ImportVariant, Severity};

// ==========================================
// Rule - 单条字段规则
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    /// 必须存在且 TRIM 后非空（error）
    Required,
    /// 若存在，必须解析为有限数值（error）
    Numeric,
    /// 若存在且非空，必须属于允许集合；级别按字段声明
    Enum {
        allowed: &'static [&'static str],
        case_insensitive: bool,
        severity: Severity,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub field: &'static str,
    pub rules: &'static [Rule],
}

impl FieldRule {
    pub fn is_required(&self) -> bool {
        self.rules.contains(&Rule::Required)
    }

    pub fn is_numeric(&self) -> bool {
        self.rules.contains(&Rule::Numeric)
    }
}

// ==========================================
// VariantSchema - 变体列契约
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct VariantSchema {
    pub variant: ImportVariant,
    pub fields: &'static [FieldRule],
    /// 自然键列（错误报告展示用）
    pub key_columns: &'static [&'static str],
}

impl VariantSchema {
    /// 模板表头
    pub fn template_headers(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.field).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.field == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.is_required()).map(|f| f.field)
    }
}

/// 获取变体列契约
pub fn schema_for(variant: ImportVariant) -> &'static VariantSchema {
    match variant {
        ImportVariant::Clients => &CLIENT_SCHEMA,
        ImportVariant::Dielines => &DIELINE_SCHEMA,
        ImportVariant::Quotations => &QUOTATION_SCHEMA,
    }
}

// ===== 枚举允许集合 =====

pub const CLIENT_TYPES: &[&str] = &["mayorista", "minorista", "distribuidor", "corporativo"];
pub const MATERIALS: &[&str] = &["sulfatada", "kraft", "corrugado", "couche", "polipropileno"];
pub const CURRENCIES: &[&str] = &["MXN", "USD", "EUR"];
pub const PACKAGING_TYPES: &[&str] = &[
    "caja_plegadiza",
    "caja_rigida",
    "exhibidor",
    "etiqueta",
    "bolsa",
];

const NONE: &[Rule] = &[];
const REQUIRED: &[Rule] = &[Rule::Required];
const NUMERIC: &[Rule] = &[Rule::Numeric];
const REQUIRED_NUMERIC: &[Rule] = &[Rule::Required, Rule::Numeric];

// ===== 客户 =====

static CLIENT_SCHEMA: VariantSchema = VariantSchema {
    variant: ImportVariant::Clients,
    fields: &[
        FieldRule { field: col::NAME, rules: REQUIRED },
        FieldRule { field: col::RFC, rules: NONE },
        FieldRule { field: col::EMAIL, rules: NONE },
        FieldRule { field: col::PHONE, rules: NONE },
        FieldRule { field: col::CITY, rules: NONE },
        FieldRule {
            field: col::CLIENT_TYPE,
            rules: &[Rule::Enum {
                allowed: CLIENT_TYPES,
                case_insensitive: false,
                severity: Severity::Error,
            }],
        },
        FieldRule { field: col::CREDIT_DAYS, rules: NUMERIC },
        FieldRule { field: col::CREDIT_LIMIT, rules: NUMERIC },
    ],
    key_columns: &[col::NAME, col::RFC],
};

// ===== 刀模 =====

static DIELINE_SCHEMA: VariantSchema = VariantSchema {
    variant: ImportVariant::Dielines,
    fields: &[
        FieldRule { field: col::SKU, rules: REQUIRED },
        FieldRule { field: col::PRODUCT_NAME, rules: REQUIRED },
        FieldRule { field: col::HEIGHT_MM, rules: REQUIRED_NUMERIC },
        FieldRule { field: col::WIDTH_MM, rules: REQUIRED_NUMERIC },
        FieldRule { field: col::DEPTH_MM, rules: REQUIRED_NUMERIC },
        FieldRule { field: col::DIE_ID, rules: NONE },
        FieldRule {
            field: col::MATERIAL,
            rules: &[Rule::Enum {
                allowed: MATERIALS,
                case_insensitive: true,
                severity: Severity::Warning,
            }],
        },
        FieldRule { field: col::LAYOUT, rules: NONE },
        FieldRule { field: col::CLIENT_NAME, rules: NONE },
    ],
    key_columns: &[col::SKU, col::PRODUCT_NAME],
};

// ===== 报价 =====

static QUOTATION_SCHEMA: VariantSchema = VariantSchema {
    variant: ImportVariant::Quotations,
    fields: &[
        FieldRule { field: col::CLIENT_NAME, rules: REQUIRED },
        FieldRule { field: col::CLIENT_RFC, rules: NONE },
        FieldRule { field: col::PRODUCT_NAME, rules: REQUIRED },
        FieldRule { field: col::SKU, rules: NONE },
        FieldRule { field: col::QUANTITY, rules: REQUIRED_NUMERIC },
        FieldRule { field: col::UNIT_PRICE, rules: REQUIRED_NUMERIC },
        FieldRule {
            field: col::CURRENCY,
            rules: &[Rule::Enum {
                allowed: CURRENCIES,
                case_insensitive: true,
                severity: Severity::Warning,
            }],
        },
        FieldRule {
            field: col::PACKAGING_TYPE,
            rules: &[Rule::Enum {
                allowed: PACKAGING_TYPES,
                case_insensitive: true,
                severity: Severity::Warning,
            }],
        },
        FieldRule { field: col::HEIGHT_MM, rules: NUMERIC },
        FieldRule { field: col::WIDTH_MM, rules: NUMERIC },
        FieldRule { field: col::DEPTH_MM, rules: NUMERIC },
        FieldRule { field: col::DIE_ID, rules: NONE },
        FieldRule { field: col::MATERIAL, rules: NONE },
        FieldRule { field: col::LAYOUT, rules: NONE },
        FieldRule { field: col::FINISH, rules: NONE },
        FieldRule { field: col::VALIDITY_DAYS, rules: NUMERIC },
        FieldRule { field: col::NOTES, rules: NONE },
    ],
    key_columns: &[col::CLIENT_NAME, col::PRODUCT_NAME, col::SKU],
};
